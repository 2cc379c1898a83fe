//! External interfaces consumed by the transaction core and tiered cursor
//! (§6: External Interfaces).
//!
//! These traits stand in for the collaborators §1 deliberately excludes —
//! physical B-tree pages, block/file I/O, the history store's on-disk
//! layout, and logging/recovery. The core only ever calls through these
//! trait objects, so it can be exercised in tests against in-memory fakes
//! (grounded on the teacher's `Storage`/`SnapshotView` trait-object tests in
//! `crates/core/src/traits.rs`, which check the traits stay object-safe).

use crate::error::Result;
use crate::ids::{TimeWindow, Timestamp, Txid};
use crate::key::{Key, RowKey};
use crate::value::Value;
use std::cmp::Ordering;

/// Orders row-store keys for the tiered cursor's merge (GLOSSARY, §4.4).
///
/// A plain byte-lexicographic order is the default in [`crate::key::RowKey`];
/// a real B-tree handle may install a custom collator (locale-aware,
/// reversed, etc.) — the tiered cursor always compares through this trait,
/// never `RowKey`'s own `Ord`, so a custom collator only needs to be plugged
/// in here.
pub trait Collator: Send + Sync {
    /// Compare two row keys.
    fn compare(&self, a: &RowKey, b: &RowKey) -> Ordering;
}

/// The default collator: byte-lexicographic order.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteLexCollator;

impl Collator for ByteLexCollator {
    fn compare(&self, a: &RowKey, b: &RowKey) -> Ordering {
        a.as_bytes().cmp(b.as_bytes())
    }
}

/// Data handle interface consumed by the transaction core (§6).
pub trait DataHandle: Send + Sync {
    /// Resolve a URI to a data handle, optionally acquiring it exclusively.
    fn get_dhandle(&self, uri: &str, exclusive: bool) -> Result<()>;
    /// Release a previously acquired data handle.
    fn release_dhandle(&self, uri: &str);
}

/// The tier cursor protocol (§6: "A tier cursor must provide ..."). Object
/// safe so the tiered cursor can hold `Box<dyn TierCursor>` per child tier.
pub trait TierCursor: Send {
    /// Position exactly at `key`. Returns `Error::NotFound` if absent.
    fn search(&mut self, key: &RowKey) -> Result<()>;
    /// Position at the smallest key `>= key`, reporting how the match landed:
    /// `Ordering::Equal` for an exact hit, `Ordering::Greater` if the cursor
    /// landed after `key` (no exact match), `Ordering::Less` if the cursor
    /// fell back to the largest key `< key` (table exhausted upward).
    fn search_near(&mut self, key: &RowKey) -> Result<Ordering>;
    /// Advance to the next key in collator order.
    fn next(&mut self) -> Result<()>;
    /// Step back to the previous key in collator order.
    fn prev(&mut self) -> Result<()>;
    /// Insert (or overwrite, in `overwrite` mode) `key` -> `value`.
    fn insert(&mut self, key: &RowKey, value: &Value) -> Result<()>;
    /// Overwrite the value at the current position.
    fn update(&mut self, key: &RowKey, value: &Value) -> Result<()>;
    /// Remove the value at `key`.
    fn remove(&mut self, key: &RowKey) -> Result<()>;
    /// Write a reserve (placeholder) update at `key`.
    fn reserve(&mut self, key: &RowKey) -> Result<()>;
    /// Return to the unpositioned state.
    fn reset(&mut self) -> Result<()>;
    /// Release any resources held by the cursor.
    fn close(&mut self) -> Result<()>;
    /// The key at the current position, if positioned.
    fn get_key(&self) -> Option<RowKey>;
    /// The value at the current position, if positioned.
    fn get_value(&self) -> Option<Value>;
    /// Position a random key (bulk-free tiers only); used by `next_random`.
    fn next_random(&mut self) -> Result<()>;
}

/// History-store coupling consumed by the prepared-transaction resolver
/// (§4.3 step 3, §6: "curhs_open, curhs_search_near_before").
pub trait HistoryStore: Send + Sync {
    /// Search for the newest entry at or before `(btree_id, key, ts, txn)`,
    /// per the key format `(btree_id, key_or_recno, ts, txn_id)`.
    fn search_near_before(
        &self,
        btree_id: u32,
        key: &Key,
        ts: Timestamp,
        txn: Txid,
    ) -> Result<Option<(TimeWindow, Value)>>;

    /// Close out an entry's time window (used when a prepared commit's
    /// value was already reconciled to the on-disk image, §4.3 step 3).
    fn close_window(
        &self,
        btree_id: u32,
        key: &Key,
        window: TimeWindow,
        stop_txn: Txid,
        stop_ts: Timestamp,
        durable_stop_ts: Timestamp,
    ) -> Result<()>;

    /// Mark an entry for removal by a later cleanup sweep (§4.3 step 6).
    fn mark_for_deletion(&self, btree_id: u32, key: &Key, window: TimeWindow) -> Result<()>;
}

/// Logging interface consumed at commit (§6: "txn_log_commit").
pub trait CommitLogger: Send + Sync {
    /// Write a commit record. The core decides whether to force a sync
    /// based on session flags; `force_sync` reflects that decision.
    fn log_commit(&self, txn_id: Txid, force_sync: bool) -> Result<()>;
}
