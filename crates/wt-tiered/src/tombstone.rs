//! Tombstone marker encoding for a single tier's stored values (§4.4,
//! GLOSSARY: "Tombstone marker").
//!
//! A tiered cursor's merge has to tell a tier's genuine deletion of a key
//! apart from a tier that simply never held that key at all, without adding
//! a side channel to the `TierCursor` trait. WiredTiger's tiered cursor
//! solves this by reserving a two-byte value as the deletion sentinel and
//! escaping any application value that would otherwise collide with it
//! (`tiered_cursor.c`'s `__curtiered_deleted_encode`/`_decode`).

use wt_core::Value;

/// The reserved two-byte tombstone sentinel.
pub const MARKER: &[u8] = &[0x14, 0x14];

/// True if `stored` is exactly the tombstone sentinel (not a collision-
/// escaped application value, which is always longer than the marker).
pub fn is_tombstone(stored: &Value) -> bool {
    stored.as_bytes() == MARKER
}

/// Encode an application value for storage on a tier. Values that happen to
/// start with the marker are escaped by appending a single trailing marker
/// byte, which keeps the two-byte exact-marker value unambiguous (P4: "the
/// encoded form of a non-tombstone value never equals the tombstone
/// marker").
pub fn encode(value: &Value) -> Value {
    let bytes = value.as_bytes();
    if bytes.len() >= MARKER.len() && bytes.starts_with(MARKER) {
        let mut out = Vec::with_capacity(bytes.len() + 1);
        out.extend_from_slice(bytes);
        out.push(0x14);
        Value(out)
    } else {
        value.clone()
    }
}

/// Reverse of [`encode`]: strip one trailing marker byte from an escaped
/// value whose size exceeds the marker's and whose prefix matches it. The
/// exact two-byte tombstone sentinel is left alone — callers check
/// [`is_tombstone`] before decoding.
pub fn decode(stored: &Value) -> Value {
    let bytes = stored.as_bytes();
    if bytes.len() > MARKER.len() && bytes.starts_with(MARKER) {
        Value(bytes[..bytes.len() - 1].to_vec())
    } else {
        stored.clone()
    }
}

/// The value to write when deleting a key on a tier (R1: "a tier's deletion
/// of a key is recorded, not merely absent").
pub fn tombstone_value() -> Value {
    Value(MARKER.to_vec())
}
