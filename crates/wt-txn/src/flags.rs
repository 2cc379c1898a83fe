//! Per-session transaction flags (§3, §9: "keep as a typed bitflag to
//! preserve atomicity of flag tests that are currently single-word reads").
//!
//! Hand-rolled rather than pulled from a crate: the whole point is a single
//! `u32` whose bit tests are a single load, matching the C bitset this was
//! translated from. `ignore_prepare` is deliberately NOT one of these bits —
//! see [`crate::session::IgnorePrepare`] — because it is three-valued
//! (`false`/`true`/`"force"`), not a flag.

use std::fmt;

/// A transaction's boolean flags, packed into one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxnFlags(u32);

macro_rules! flag_bits {
    ($($name:ident = $bit:expr;)*) => {
        impl TxnFlags {
            $(
                #[allow(missing_docs)]
                pub const $name: TxnFlags = TxnFlags(1 << $bit);
            )*
        }
    };
}

flag_bits! {
    RUNNING = 0;
    HAS_SNAPSHOT = 1;
    HAS_ID = 2;
    PREPARE = 3;
    READONLY = 4;
    ERROR = 5;
    SYNC_SET = 6;
    TS_NOT_SET = 7;
    TS_ROUND_PREPARED = 8;
    TS_ROUND_READ = 9;
    HAS_TS_COMMIT = 10;
    HAS_TS_DURABLE = 11;
    HAS_TS_PREPARE = 12;
    IS_CHECKPOINT = 13;
    // Not in §3's enumerated flag list, but named by §4.2's configuration
    // table ("read_timestamp | sets read_ts; flag has-ts-read") — added to
    // reconcile the two.
    HAS_TS_READ = 14;
}

impl TxnFlags {
    /// The empty flag set.
    pub const NONE: TxnFlags = TxnFlags(0);

    /// Set `other` in this flag set, returning the union.
    pub fn with(self, other: TxnFlags) -> TxnFlags {
        TxnFlags(self.0 | other.0)
    }

    /// Set `other`'s bits in place.
    pub fn insert(&mut self, other: TxnFlags) {
        self.0 |= other.0;
    }

    /// Clear `other`'s bits in place.
    pub fn remove(&mut self, other: TxnFlags) {
        self.0 &= !other.0;
    }

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: TxnFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any bit is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TxnFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#014b}", self.0)
    }
}
