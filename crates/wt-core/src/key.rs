//! Key shapes used by the transaction core and tiered cursor.
//!
//! The transaction core's update-chain entries distinguish row-store keys
//! (raw byte strings) from column-store keys (record numbers) — §3: "Row
//! variants carry a key copy; column variants carry a record number." The
//! tiered cursor, however, always compares raw encoded bytes via a collator
//! (§4.4 "Children are always raw; key comparison uses the tiered handle's
//! collator directly"), so `RowKey` doubles as the tiered cursor's key type.

use std::cmp::Ordering;
use std::fmt;

/// A row-store key: an opaque, collator-ordered byte string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RowKey(pub Vec<u8>);

impl RowKey {
    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// True if `self` starts with `prefix`'s bytes.
    pub fn starts_with(&self, prefix: &RowKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl From<Vec<u8>> for RowKey {
    fn from(v: Vec<u8>) -> Self {
        RowKey(v)
    }
}

impl From<&[u8]> for RowKey {
    fn from(v: &[u8]) -> Self {
        RowKey(v.to_vec())
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

/// Default byte-lexicographic ordering. Collators that need a different
/// order (case-insensitive, locale-aware, reverse) implement
/// [`crate::traits::Collator`] instead of relying on this `Ord` impl; the
/// tiered cursor always goes through the collator, never this impl, so
/// custom orderings don't require a different `RowKey`.
impl PartialOrd for RowKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RowKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

/// A column-store key: a record number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u64);

/// The key of a single modification (§3: `mod[]` entries carry either a row
/// key copy or a column-store record number, never both).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Row-store key.
    Row(RowKey),
    /// Column-store record number.
    Column(RecordId),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Row(k) => write!(f, "row:{}", k),
            Key::Column(r) => write!(f, "col:{}", r.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_key_ordering_is_byte_lexicographic() {
        let a = RowKey::from(b"aaa".as_slice());
        let b = RowKey::from(b"aab".as_slice());
        assert!(a < b);
    }

    #[test]
    fn row_key_starts_with() {
        let k = RowKey::from(b"user:alice".as_slice());
        let prefix = RowKey::from(b"user:".as_slice());
        assert!(k.starts_with(&prefix));
        assert!(!prefix.starts_with(&k));
    }
}
