//! The prepared-transaction resolver (§4.3): the hardest algorithm in the
//! transaction core. Resolves one `mod[]` entry of a prepared transaction on
//! commit or rollback, including the history-store coupling required when a
//! prepared update was already reconciled to the on-disk image.
//!
//! Grounded on `crates/concurrency/src/transaction.rs`'s `CommitError`-style
//! boundary between "this failure just rolls the transaction back" and "this
//! failure is unrecoverable", generalized to the chain-walk this spec
//! describes. §9 allows an iterative two-pass reimplementation of the
//! recursive tail-first walk; we keep the recursion (bounded by chain length,
//! itself bounded by the number of times a single key has been written)
//! because it reads closer to the spec's own description.

use crate::chain::{PrepareState, UpdateFlags, UpdateNode, UpdateType};
use std::sync::Arc;
use wt_core::{HistoryStore, Key, Result, Timestamp, Txid, Value};

/// External collaborators the resolver needs beyond the update chain itself
/// (§4.3 step 3's history-store coupling, step 8's "mark the page dirty").
///
/// There is no `chain_head` lookup here: unlike the C original, which
/// reopens a cursor to relocate the head of a key's chain (because eviction
/// may have rewritten the page since the operation ran), our `Arc<UpdateNode>`
/// is the same allocation for the node's whole lifetime — the `ModEntry` that
/// recorded the operation already holds the right node to resolve.
pub struct ResolveDeps<'a> {
    /// Consulted when a prepared update's key has (or may have) a prior
    /// version parked in the history store (§4.3 step 3).
    pub history_store: &'a dyn HistoryStore,
    /// Called once resolution completes for a key, so the tree eventually
    /// reconciles the resolved state (§4.3 step 8).
    pub mark_page_dirty: &'a dyn Fn(u32, &Key),
}

/// Resolve one `mod[]` entry of a prepared transaction (§4.3).
///
/// `commit` selects commit (`true`) or rollback (`false`) resolution.
/// `session_id` is the resolving transaction's own id, used to recognise the
/// boundary where the chain passes to an older transaction's updates (§4.3
/// step 5: "else if `txid != session.id`: stop").
#[allow(clippy::too_many_arguments)]
pub fn resolve_prepared_op(
    update: &Arc<UpdateNode>,
    btree_id: u32,
    key: &Key,
    session_id: Txid,
    commit: bool,
    commit_ts: Timestamp,
    durable_ts: Timestamp,
    deps: &ResolveDeps<'_>,
) -> Result<()> {
    if update.view().prepare_state != PrepareState::InProgress {
        // An older preparation on this same key already resolved the whole
        // chain (§4.3 step 1: "the chain has already been resolved - skip").
        return Ok(());
    }

    let first_committed = first_committed_below(update);
    let hs_seen = first_committed
        .as_ref()
        .map(|n| n.view().flags.contains(UpdateFlags::HS_SEEN))
        .unwrap_or(false);

    if hs_seen || update.view().flags.contains(UpdateFlags::RESTORED_FROM_HS) {
        couple_with_history_store(update, btree_id, key, session_id, commit, commit_ts, durable_ts, deps)?;
    }

    resolve_chain_tail_first(update, session_id, commit, commit_ts, durable_ts);

    if !commit {
        if let Some(first) = &first_committed {
            if first.view().flags.contains(UpdateFlags::HS_SEEN) {
                first.add_flags(UpdateFlags::TO_DELETE_FROM_HS);
            }
        }
    }

    (deps.mark_page_dirty)(btree_id, key);
    Ok(())
}

/// §4.3 step 2: "Find the first committed update below the prepared
/// updates (skip aborted and in-progress)."
fn first_committed_below(update: &Arc<UpdateNode>) -> Option<Arc<UpdateNode>> {
    let mut node = update.next();
    while let Some(n) = node {
        let view = n.view();
        if view.txid.is_aborted() || view.prepare_state == PrepareState::InProgress {
            node = n.next();
            continue;
        }
        return Some(n);
    }
    None
}

/// §4.3 step 4-5: "Walk the chain resolving recursively tail-first ... This
/// ordering guarantees older preparations are resolved before newer ones."
fn resolve_chain_tail_first(
    update: &Arc<UpdateNode>,
    session_id: Txid,
    commit: bool,
    commit_ts: Timestamp,
    durable_ts: Timestamp,
) {
    if let Some(next) = update.next() {
        resolve_chain_tail_first(&next, session_id, commit, commit_ts, durable_ts);
    }

    let view = update.view();
    if view.txid.is_aborted() {
        return;
    }
    if view.txid != session_id {
        // Reached the boundary: an older transaction's already-settled
        // update (§4.3 step 5: "stop").
        return;
    }
    if commit {
        update.resolve_commit(commit_ts, durable_ts);
    } else {
        update.resolve_rollback();
    }
}

/// §4.3 step 3: history-store coupling.
#[allow(clippy::too_many_arguments)]
fn couple_with_history_store(
    update: &Arc<UpdateNode>,
    btree_id: u32,
    key: &Key,
    session_id: Txid,
    commit: bool,
    commit_ts: Timestamp,
    durable_ts: Timestamp,
    deps: &ResolveDeps<'_>,
) -> Result<()> {
    let found = deps
        .history_store
        .search_near_before(btree_id, key, Timestamp::MAX, Txid(u64::MAX))?;

    if commit {
        // "On commit of a prepared update (not tombstone): if the HS record
        // still has stop_ts == MAX, update it to close with this
        // transaction's commit/durable timestamps."
        if update.update_type() != UpdateType::Tombstone {
            if let Some((window, _value)) = found {
                if window.stop_ts == Timestamp::MAX {
                    deps.history_store
                        .close_window(btree_id, key, window, session_id, commit_ts, durable_ts)?;
                }
            }
        }
        return Ok(());
    }

    match found {
        Some((window, value)) => {
            let restored = UpdateNode::from_history(
                window.start_txn,
                window.start_ts,
                window.durable_start_ts,
                window.durable_start_ts,
                UpdateType::Standard,
                value,
            );
            restored.add_flags(UpdateFlags::RESTORED_FROM_HS.with(UpdateFlags::TO_DELETE_FROM_HS));

            if window.is_closed() {
                // "If the HS record has a valid stop, also fabricate a
                // tombstone node in front of it with the stop window."
                let tombstone = UpdateNode::from_history(
                    window.stop_txn,
                    window.stop_ts,
                    window.durable_stop_ts,
                    window.durable_start_ts,
                    UpdateType::Tombstone,
                    Value::default(),
                );
                tombstone.set_next(restored);
                append_to_tail(update, tombstone);
            } else {
                append_to_tail(update, restored);
            }
        }
        None => {
            // "If the HS search returns not-found and the prepared update
            // was on-disk, rolling back must append a fresh tombstone so
            // that a later reconciler does not mistake the on-disk prepared
            // cell for a live commit."
            let tombstone = UpdateNode::new(Txid::ABORTED, UpdateType::Tombstone, Value::default());
            append_to_tail(update, tombstone);
        }
    }
    Ok(())
}

/// Append `new_tail` behind `head`'s chain, under the same append-at-tail
/// publish discipline as ordinary chain construction (§5: "a resolver
/// extending the tail uses the same [publish] barrier").
fn append_to_tail(head: &Arc<UpdateNode>, new_tail: Arc<UpdateNode>) {
    let mut node = head.clone();
    loop {
        match node.next() {
            Some(next) => node = next,
            None => {
                node.set_next(new_tail);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::UpdateType;
    use crate::testing::NullHistoryStore;
    use wt_core::{Key, RowKey, TimeWindow};

    struct OneEntryHistoryStore {
        window: TimeWindow,
        value: Value,
    }
    impl HistoryStore for OneEntryHistoryStore {
        fn search_near_before(
            &self,
            _btree_id: u32,
            _key: &Key,
            _ts: Timestamp,
            _txn: Txid,
        ) -> Result<Option<(TimeWindow, Value)>> {
            Ok(Some((self.window, self.value.clone())))
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

    fn deps(hs: &dyn HistoryStore) -> ResolveDeps<'_> {
        ResolveDeps {
            history_store: hs,
            mark_page_dirty: &|_btree_id, _key| {},
        }
    }

    fn key() -> Key {
        Key::Row(RowKey::from(b"k".as_slice()))
    }

    #[test]
    fn already_resolved_prepare_is_a_no_op() {
        let node = UpdateNode::new(Txid(5), UpdateType::Standard, Value::from(b"v".as_slice()));
        node.resolve_commit(Timestamp(10), Timestamp(10));
        let hs = NullHistoryStore;
        resolve_prepared_op(&node, 1, &key(), Txid(5), true, Timestamp(10), Timestamp(10), &deps(&hs)).unwrap();
        assert_eq!(node.view().start_ts, Timestamp(10));
    }

    #[test]
    fn commit_resolves_in_progress_node() {
        let node = UpdateNode::new(Txid(5), UpdateType::Standard, Value::from(b"v".as_slice()));
        node.mark_prepared(Timestamp(5));
        let hs = NullHistoryStore;
        resolve_prepared_op(&node, 1, &key(), Txid(5), true, Timestamp(10), Timestamp(12), &deps(&hs)).unwrap();
        let view = node.view();
        assert_eq!(view.prepare_state, PrepareState::Resolved);
        assert_eq!(view.start_ts, Timestamp(10));
        assert_eq!(view.durable_ts, Timestamp(12));
    }

    #[test]
    fn rollback_aborts_in_progress_node() {
        let node = UpdateNode::new(Txid(5), UpdateType::Standard, Value::from(b"v".as_slice()));
        node.mark_prepared(Timestamp(5));
        let hs = NullHistoryStore;
        resolve_prepared_op(&node, 1, &key(), Txid(5), false, Timestamp::NONE, Timestamp::NONE, &deps(&hs)).unwrap();
        assert!(node.view().txid.is_aborted());
    }

    #[test]
    fn rollback_stops_at_older_transactions_update() {
        let old = UpdateNode::new(Txid(3), UpdateType::Standard, Value::from(b"old".as_slice()));
        old.resolve_commit(Timestamp(3), Timestamp(3));
        let node = UpdateNode::new(Txid(5), UpdateType::Standard, Value::from(b"new".as_slice()));
        node.set_next(old.clone());
        node.mark_prepared(Timestamp(5));
        let hs = NullHistoryStore;
        resolve_prepared_op(&node, 1, &key(), Txid(5), false, Timestamp::NONE, Timestamp::NONE, &deps(&hs)).unwrap();
        assert!(node.view().txid.is_aborted());
        assert_eq!(old.view().txid, Txid(3));
        assert_eq!(old.view().start_ts, Timestamp(3));
    }

    #[test]
    fn rollback_restores_from_history_store_when_hs_seen() {
        let node = UpdateNode::new(Txid(5), UpdateType::Standard, Value::from(b"new".as_slice()));
        node.mark_prepared(Timestamp(5));
        node.add_flags(UpdateFlags::HS_SEEN);
        let window = TimeWindow::open(Txid(1), Timestamp(1), Timestamp(1));
        let hs = OneEntryHistoryStore {
            window,
            value: Value::from(b"old".as_slice()),
        };
        resolve_prepared_op(&node, 1, &key(), Txid(5), false, Timestamp::NONE, Timestamp::NONE, &deps(&hs)).unwrap();
        assert!(node.view().txid.is_aborted());
        let restored = node.next().expect("history value restored onto chain tail");
        assert_eq!(restored.payload().as_bytes(), b"old");
        assert!(restored.view().flags.contains(UpdateFlags::RESTORED_FROM_HS));
    }

    #[test]
    fn rollback_with_closed_history_window_fabricates_a_tombstone_first() {
        let node = UpdateNode::new(Txid(5), UpdateType::Standard, Value::from(b"new".as_slice()));
        node.mark_prepared(Timestamp(5));
        node.add_flags(UpdateFlags::HS_SEEN);
        let mut window = TimeWindow::open(Txid(1), Timestamp(1), Timestamp(1));
        window.stop_txn = Txid(4);
        window.stop_ts = Timestamp(4);
        window.durable_stop_ts = Timestamp(4);
        let hs = OneEntryHistoryStore {
            window,
            value: Value::from(b"old".as_slice()),
        };
        resolve_prepared_op(&node, 1, &key(), Txid(5), false, Timestamp::NONE, Timestamp::NONE, &deps(&hs)).unwrap();
        let tombstone = node.next().expect("tombstone appended");
        assert_eq!(tombstone.update_type(), UpdateType::Tombstone);
        let restored = tombstone.next().expect("restored value behind the tombstone");
        assert_eq!(restored.payload().as_bytes(), b"old");
    }
}
