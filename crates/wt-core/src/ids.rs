//! Transaction IDs and timestamps (§3: Data Model).
//!
//! Both are monotonically-assigned 64-bit counters, but they compare
//! differently: `Txid` uses wrap-safe signed-difference ordering so the
//! registry keeps working across a `u64` wraparound (§3, "Ordered comparison
//! uses wrap-safe arithmetic"), while `Timestamp` is a plain numeric order
//! since timestamps are assigned by the application, not a wrapping counter.

use std::cmp::Ordering;
use std::fmt;

/// A transaction identifier. `0` means "none"; `1` is the first usable id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Txid(pub u64);

impl Txid {
    /// The sentinel meaning "no transaction".
    pub const NONE: Txid = Txid(0);
    /// The first transaction id ever allocated.
    pub const FIRST: Txid = Txid(1);
    /// Sentinel used for updates rolled back by a prepared-transaction resolve.
    pub const ABORTED: Txid = Txid(u64::MAX);

    /// True if this id is the "none" sentinel.
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// True if this id denotes an aborted update.
    pub fn is_aborted(self) -> bool {
        self == Self::ABORTED
    }

    /// Wrap-safe "happens strictly before" comparison (§3: "Ordered comparison
    /// uses wrap-safe arithmetic (signed difference)").
    ///
    /// Plain numeric comparison breaks once `current` wraps around `u64::MAX`;
    /// computing the signed difference keeps the registry correct as long as
    /// no two compared ids are more than `i64::MAX` apart, which holds because
    /// the snapshot window is bounded by live transactions.
    pub fn precedes(self, other: Txid) -> bool {
        (self.0.wrapping_sub(other.0) as i64) < 0
    }

    /// `self <= other` under the same wrap-safe ordering as [`Self::precedes`].
    pub fn precedes_or_eq(self, other: Txid) -> bool {
        self == other || self.precedes(other)
    }

    /// Next id after this one (used by the allocator's fetch-and-increment).
    pub fn next(self) -> Txid {
        Txid(self.0 + 1)
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A commit/durable/prepare/read/stable/oldest/pinned timestamp.
///
/// `0` means "none" for most fields; a handful of call sites (documented at
/// the call site) treat `0` as "unbounded maximum" instead (§3: "`0` =
/// none/max depending on field").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The sentinel meaning "not set".
    pub const NONE: Timestamp = Timestamp(0);
    /// The sentinel used where `0` means "unbounded maximum" (e.g. history
    /// store time-window lookups that want "as of now").
    pub const MAX: Timestamp = Timestamp(u64::MAX);

    /// True if this timestamp has not been set.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 6-tuple bracketing a stored value's validity in the history store
/// (GLOSSARY: "Time window").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Transaction that created this version.
    pub start_txn: Txid,
    /// Commit timestamp of the creating transaction.
    pub start_ts: Timestamp,
    /// Durable timestamp of the creating transaction.
    pub durable_start_ts: Timestamp,
    /// Transaction that superseded (deleted/overwrote) this version, if any.
    pub stop_txn: Txid,
    /// Commit timestamp of the superseding transaction, `Timestamp::MAX` if
    /// this version is still the newest.
    pub stop_ts: Timestamp,
    /// Durable timestamp of the superseding transaction.
    pub durable_stop_ts: Timestamp,
}

impl TimeWindow {
    /// A window for a value with no superseding transaction yet.
    pub fn open(start_txn: Txid, start_ts: Timestamp, durable_start_ts: Timestamp) -> Self {
        TimeWindow {
            start_txn,
            start_ts,
            durable_start_ts,
            stop_txn: Txid::NONE,
            stop_ts: Timestamp::MAX,
            durable_stop_ts: Timestamp::NONE,
        }
    }

    /// Whether this window has been closed by a later transaction.
    pub fn is_closed(&self) -> bool {
        self.stop_ts != Timestamp::MAX
    }
}

/// Ordering helper for the wrap-safe `Txid` comparisons used by the registry
/// scan and the snapshot binary search (kept separate from `Ord` because
/// `Txid` intentionally does not implement `Ord`/`PartialOrd` — plain numeric
/// ordering would be silently wrong after a wraparound).
pub fn txid_cmp(a: Txid, b: Txid) -> Ordering {
    if a == b {
        Ordering::Equal
    } else if a.precedes(b) {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}
