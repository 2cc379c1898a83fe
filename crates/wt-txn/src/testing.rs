//! Test-only in-memory reference collaborators (§6's `HistoryStore`/
//! `CommitLogger` traits), shared by this crate's module tests so each one
//! doesn't hand-roll its own no-op fake.
//!
//! Grounded on `crates/storage/src/testing/reference_model.rs`'s pattern of
//! a minimal, obviously-correct reference store kept behind `#[cfg(test)]`
//! rather than shipped in the library surface.

#![cfg(test)]

use parking_lot::Mutex;
use std::collections::HashMap;
use wt_core::{HistoryStore, Key, Result, TimeWindow, Timestamp, Txid, Value};

/// A `HistoryStore` that never has anything parked (the common case: most
/// tests don't exercise the prepared-resolver's HS coupling at all).
pub struct NullHistoryStore;

impl HistoryStore for NullHistoryStore {
    fn search_near_before(
        &self,
        _btree_id: u32,
        _key: &Key,
        _ts: Timestamp,
        _txn: Txid,
    ) -> Result<Option<(TimeWindow, Value)>> {
        Ok(None)
    }

    fn close_window(
        &self,
        _btree_id: u32,
        _key: &Key,
        _window: TimeWindow,
        _stop_txn: Txid,
        _stop_ts: Timestamp,
        _durable_stop_ts: Timestamp,
    ) -> Result<()> {
        Ok(())
    }

    fn mark_for_deletion(&self, _btree_id: u32, _key: &Key, _window: TimeWindow) -> Result<()> {
        Ok(())
    }
}

/// A minimal in-memory history store keyed by `(btree_id, key)`, holding at
/// most one prior version per key — enough to exercise the resolver's
/// commit/rollback coupling without a real on-disk layout.
#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<HashMap<(u32, Key), (TimeWindow, Value)>>,
}

impl MemoryHistoryStore {
    /// An empty store.
    pub fn new() -> Self {
        MemoryHistoryStore::default()
    }

    /// Seed a prior version directly, as if an earlier reconciliation had
    /// already moved it out of the in-memory chain.
    pub fn seed(&self, btree_id: u32, key: Key, window: TimeWindow, value: Value) {
        self.entries.lock().insert((btree_id, key), (window, value));
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn search_near_before(
        &self,
        btree_id: u32,
        key: &Key,
        _ts: Timestamp,
        _txn: Txid,
    ) -> Result<Option<(TimeWindow, Value)>> {
        Ok(self.entries.lock().get(&(btree_id, key.clone())).cloned())
    }

    fn close_window(
        &self,
        btree_id: u32,
        key: &Key,
        _window: TimeWindow,
        stop_txn: Txid,
        stop_ts: Timestamp,
        durable_stop_ts: Timestamp,
    ) -> Result<()> {
        let mut entries = self.entries.lock();
        if let Some((window, _)) = entries.get_mut(&(btree_id, key.clone())) {
            window.stop_txn = stop_txn;
            window.stop_ts = stop_ts;
            window.durable_stop_ts = durable_stop_ts;
        }
        Ok(())
    }

    fn mark_for_deletion(&self, _btree_id: u32, _key: &Key, _window: TimeWindow) -> Result<()> {
        Ok(())
    }
}

/// A `CommitLogger` that records nothing and never fails.
pub struct NullLogger;

impl wt_core::CommitLogger for NullLogger {
    fn log_commit(&self, _txn_id: Txid, _force_sync: bool) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_history_store_round_trips_a_seeded_window() {
        let store = MemoryHistoryStore::new();
        let key = Key::Row(wt_core::RowKey::from(b"k".as_slice()));
        let window = TimeWindow::open(Txid(1), Timestamp(1), Timestamp(1));
        store.seed(1, key.clone(), window, Value::from(b"v".as_slice()));
        let (found, value) = store.search_near_before(1, &key, Timestamp::MAX, Txid(u64::MAX)).unwrap().unwrap();
        assert_eq!(found.start_txn, Txid(1));
        assert_eq!(value.as_bytes(), b"v");
    }

    #[test]
    fn close_window_updates_the_stop_fields() {
        let store = MemoryHistoryStore::new();
        let key = Key::Row(wt_core::RowKey::from(b"k".as_slice()));
        let window = TimeWindow::open(Txid(1), Timestamp(1), Timestamp(1));
        store.seed(1, key.clone(), window, Value::from(b"v".as_slice()));
        store.close_window(1, &key, window, Txid(5), Timestamp(10), Timestamp(11)).unwrap();
        let (found, _) = store.search_near_before(1, &key, Timestamp::MAX, Txid(u64::MAX)).unwrap().unwrap();
        assert_eq!(found.stop_txn, Txid(5));
        assert_eq!(found.stop_ts, Timestamp(10));
    }
}
