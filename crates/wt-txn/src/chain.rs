//! Update-chain nodes (§3: Data Model, "Update chain").
//!
//! A chain is newest-first: each node's `next` points at the version it
//! shadows. Nodes are shared via `Arc` rather than owned by an arena index
//! because the (excluded) B-tree page is what actually anchors the head of a
//! chain; the prepared-transaction resolver and the history-store reconciler
//! both need to hold a node past the point its page has moved on, which an
//! arena handle can't express as cleanly as a strong reference.
//!
//! The fields a running transaction still mutates after the node is first
//! linked in (`txid`, `start_ts`, `durable_ts`, `prepare_state`, flags) live
//! behind one `parking_lot::Mutex`, matching the teacher's habit of wrapping
//! a small mutable record rather than scattering atomics per field.

use parking_lot::Mutex;
use std::sync::Arc;
use wt_core::{Timestamp, Txid, Value};

/// Resolution state of a prepared update (GLOSSARY: "Prepare state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareState {
    /// Not part of a prepared transaction, or already resolved.
    None,
    /// Prepared but not yet committed or rolled back.
    InProgress,
    /// Prepare resolved (rolled back or the commit/durable timestamps have
    /// been published); readers no longer need to special-case this node.
    Resolved,
}

/// What kind of update a node records (§3: "value | tombstone | reserve").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateType {
    /// An ordinary value.
    Standard,
    /// A deletion marker (visible as "absent" to readers that can see it).
    Tombstone,
    /// A placeholder written by `WT_CURSOR::reserve` to claim a key without
    /// making its value visible.
    Reserve,
}

/// Per-node flags set by the prepared-transaction resolver and history-store
/// interaction (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateFlags(u8);

impl UpdateFlags {
    /// No flags set.
    pub const NONE: UpdateFlags = UpdateFlags(0);
    /// This update's prior value was restored from the history store onto
    /// the in-memory chain (§4.3 step 2).
    pub const RESTORED_FROM_HS: UpdateFlags = UpdateFlags(1 << 0);
    /// This update should be moved to the history store by the next
    /// reconciliation rather than left on the in-memory chain.
    pub const TO_DELETE_FROM_HS: UpdateFlags = UpdateFlags(1 << 1);
    /// The resolver has already inspected the history store for this node's
    /// key and should not do so again.
    pub const HS_SEEN: UpdateFlags = UpdateFlags(1 << 2);

    /// Union two flag sets.
    pub fn with(self, other: UpdateFlags) -> UpdateFlags {
        UpdateFlags(self.0 | other.0)
    }

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: UpdateFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

struct Inner {
    txid: Txid,
    start_ts: Timestamp,
    durable_ts: Timestamp,
    prepare_state: PrepareState,
    flags: UpdateFlags,
    next: Option<Arc<UpdateNode>>,
}

/// One version on an update chain.
pub struct UpdateNode {
    update_type: UpdateType,
    payload: Value,
    prev_durable_ts: Timestamp,
    inner: Mutex<Inner>,
}

/// A consistent snapshot of a node's mutable fields, cheap to copy and safe
/// to reason about without holding the node's lock (used by visibility and
/// the prepared-transaction resolver).
#[derive(Debug, Clone, Copy)]
pub struct UpdateNodeView {
    /// Owning transaction id (`Txid::ABORTED` once rolled back).
    pub txid: Txid,
    /// Commit timestamp, or `Timestamp::NONE` if not yet committed.
    pub start_ts: Timestamp,
    /// Durable timestamp, or `Timestamp::NONE` if not yet committed.
    pub durable_ts: Timestamp,
    /// This node's update kind.
    pub update_type: UpdateType,
    /// Current prepare resolution state.
    pub prepare_state: PrepareState,
    /// Per-node flags.
    pub flags: UpdateFlags,
}

impl UpdateNode {
    /// Create a new, as-yet-uncommitted node owned by `txid`.
    pub fn new(txid: Txid, update_type: UpdateType, payload: Value) -> Arc<Self> {
        Arc::new(UpdateNode {
            update_type,
            payload,
            prev_durable_ts: Timestamp::NONE,
            inner: Mutex::new(Inner {
                txid,
                start_ts: Timestamp::NONE,
                durable_ts: Timestamp::NONE,
                prepare_state: PrepareState::None,
                flags: UpdateFlags::NONE,
                next: None,
            }),
        })
    }

    /// Create a node restored from the history store, already resolved and
    /// carrying a `prev_durable_ts` for the prepared-resolver's durability
    /// check (§4.3 step 3).
    pub fn from_history(
        txid: Txid,
        start_ts: Timestamp,
        durable_ts: Timestamp,
        prev_durable_ts: Timestamp,
        update_type: UpdateType,
        payload: Value,
    ) -> Arc<Self> {
        Arc::new(UpdateNode {
            update_type,
            payload,
            prev_durable_ts,
            inner: Mutex::new(Inner {
                txid,
                start_ts,
                durable_ts,
                prepare_state: PrepareState::None,
                flags: UpdateFlags::RESTORED_FROM_HS,
                next: None,
            }),
        })
    }

    /// A cheap, consistent snapshot of this node's mutable state.
    pub fn view(&self) -> UpdateNodeView {
        let inner = self.inner.lock();
        UpdateNodeView {
            txid: inner.txid,
            start_ts: inner.start_ts,
            durable_ts: inner.durable_ts,
            update_type: self.update_type,
            prepare_state: inner.prepare_state,
            flags: inner.flags,
        }
    }

    /// The value or tombstone payload carried by this node.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// This node's kind.
    pub fn update_type(&self) -> UpdateType {
        self.update_type
    }

    /// The durable timestamp of the version this node shadowed, if restored
    /// from the history store.
    pub fn prev_durable_ts(&self) -> Timestamp {
        self.prev_durable_ts
    }

    /// The next (older) node in the chain.
    pub fn next(&self) -> Option<Arc<UpdateNode>> {
        self.inner.lock().next.clone()
    }

    /// Link `next` in as the node this one shadows. Used both by ordinary
    /// prepend-at-head chain construction and by the resolver's tail
    /// extension when restoring a prior value from the history store.
    pub fn set_next(&self, next: Arc<UpdateNode>) {
        self.inner.lock().next = Some(next);
    }

    /// Publish the prepare timestamp and mark this node in-progress
    /// (§4.3 step 1).
    pub fn mark_prepared(&self, prepare_ts: Timestamp) {
        let mut inner = self.inner.lock();
        inner.start_ts = prepare_ts;
        inner.prepare_state = PrepareState::InProgress;
    }

    /// Resolve a commit: publish final commit/durable timestamps and mark
    /// the prepare resolved (§4.3 step 5, and the non-prepared commit path).
    pub fn resolve_commit(&self, commit_ts: Timestamp, durable_ts: Timestamp) {
        let mut inner = self.inner.lock();
        inner.start_ts = commit_ts;
        inner.durable_ts = durable_ts;
        inner.prepare_state = PrepareState::Resolved;
    }

    /// Resolve a rollback: mark the node aborted so visibility always skips
    /// it (§4.2 "rollback walks `mod[]` ... sets the update's transaction id
    /// to the aborted sentinel").
    pub fn resolve_rollback(&self) {
        let mut inner = self.inner.lock();
        inner.txid = Txid::ABORTED;
        inner.prepare_state = PrepareState::Resolved;
    }

    /// Set (union in) additional flags.
    pub fn add_flags(&self, flags: UpdateFlags) {
        let mut inner = self.inner.lock();
        inner.flags = inner.flags.with(flags);
    }
}
