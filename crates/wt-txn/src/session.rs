//! Per-session transaction lifecycle (§4.2).
//!
//! `Session` is the one object an application thread actually touches: it
//! owns the state machine, the snapshot, the timestamp fields, and the
//! ordered `mod[]` list of modifications a running transaction has applied.
//! Grounded on `crates/concurrency/src/transaction.rs`'s per-session struct,
//! generalized from OCC read/write/delete sets to the registry-backed
//! snapshot/visibility model this spec describes.

use crate::chain::{PrepareState, UpdateNode, UpdateType};
use crate::flags::TxnFlags;
use crate::prepare::{self, ResolveDeps};
use crate::registry::TxnRegistry;
use crate::timestamp::{self, TimestampAuthority};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wt_core::{Error, Key, RecordId, Result, RowKey, Txid, Timestamp};

/// Isolation level (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Isolation {
    ReadUncommitted,
    ReadCommitted,
    #[default]
    Snapshot,
}

/// Three-valued `ignore_prepare` configuration (§4.2, §9's open question on
/// `force` semantics: we surface the distinction faithfully but do not
/// invent invalidation-on-rollback behavior the source doesn't document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IgnorePrepare {
    #[default]
    False,
    True,
    Force,
}

/// The transaction lifecycle state machine (§4.2: "`idle -> running ->
/// (prepared ->)? resolving -> idle`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Idle,
    Running,
    Prepared,
    Resolving,
}

/// Fast-truncate state for a page referenced by a `ref-delete` modify entry
/// (§3: "`ref-delete` references a page with fast-truncate state"). The
/// physical page itself is out of scope (§1); this is the minimal slice of
/// state commit/rollback actually touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    NotDeleted,
    Deleted,
}

/// A borrowed reference to a page's fast-truncate state — borrowed, not
/// owned, per §9's "back-edges to pages are borrowed, never owned".
#[derive(Debug)]
pub struct PageRef {
    state: Mutex<PageState>,
}

impl PageRef {
    /// A page whose fast-truncate delete is pending.
    pub fn new_deleted() -> Arc<Self> {
        Arc::new(PageRef {
            state: Mutex::new(PageState::Deleted),
        })
    }

    /// A page whose fast-truncate delete has not (yet) happened.
    pub fn new_not_deleted() -> Arc<Self> {
        Arc::new(PageRef {
            state: Mutex::new(PageState::NotDeleted),
        })
    }

    /// Current state.
    pub fn state(&self) -> PageState {
        *self.state.lock()
    }

    /// Commit a fast-truncate `ref-delete` (§4.2 step 4): if the page is
    /// still `Deleted`, flag the delete as committed (return `true`);
    /// otherwise free the fast-truncate update list (return `false`).
    pub fn commit_fast_truncate(&self) -> bool {
        let mut state = self.state.lock();
        if *state == PageState::Deleted {
            true
        } else {
            *state = PageState::NotDeleted;
            false
        }
    }

    /// Roll back a fast-truncate `ref-delete`: restore to not-deleted.
    pub fn rollback_fast_truncate(&self) {
        *self.state.lock() = PageState::NotDeleted;
    }
}

/// One entry of a transaction's `mod[]` list (§3, §9: "tagged enums for the
/// operation variants in `mod[]` rather than subclassing").
pub enum ModEntry {
    BasicRow {
        btree_id: u32,
        key: RowKey,
        update: Arc<UpdateNode>,
        key_repeated: bool,
    },
    BasicCol {
        btree_id: u32,
        recno: RecordId,
        update: Arc<UpdateNode>,
        key_repeated: bool,
    },
    InMemRow {
        btree_id: u32,
        key: RowKey,
        update: Arc<UpdateNode>,
        key_repeated: bool,
    },
    InMemCol {
        btree_id: u32,
        recno: RecordId,
        update: Arc<UpdateNode>,
        key_repeated: bool,
    },
    RefDelete {
        btree_id: u32,
        page: Arc<PageRef>,
    },
    TruncateRow {
        btree_id: u32,
        start: RowKey,
        stop: RowKey,
    },
    TruncateCol {
        btree_id: u32,
        start: RecordId,
        stop: RecordId,
    },
}

impl ModEntry {
    fn sort_key(&self) -> (u32, Vec<u8>) {
        match self {
            ModEntry::BasicRow { btree_id, key, .. } | ModEntry::InMemRow { btree_id, key, .. } => {
                (*btree_id, key.as_bytes().to_vec())
            }
            ModEntry::BasicCol { btree_id, recno, .. } | ModEntry::InMemCol { btree_id, recno, .. } => {
                (*btree_id, recno.0.to_be_bytes().to_vec())
            }
            ModEntry::RefDelete { btree_id, .. } => (*btree_id, Vec::new()),
            ModEntry::TruncateRow { btree_id, start, .. } => (*btree_id, start.as_bytes().to_vec()),
            ModEntry::TruncateCol { btree_id, start, .. } => (*btree_id, start.0.to_be_bytes().to_vec()),
        }
    }

    fn dedup_key(&self) -> Option<(u32, Vec<u8>)> {
        match self {
            ModEntry::BasicRow { .. } | ModEntry::InMemRow { .. } | ModEntry::BasicCol { .. } | ModEntry::InMemCol { .. } => {
                Some(self.sort_key())
            }
            _ => None,
        }
    }

    fn set_key_repeated(&mut self, value: bool) {
        match self {
            ModEntry::BasicRow { key_repeated, .. }
            | ModEntry::InMemRow { key_repeated, .. }
            | ModEntry::BasicCol { key_repeated, .. }
            | ModEntry::InMemCol { key_repeated, .. } => *key_repeated = value,
            _ => {}
        }
    }
}

/// Configuration accepted at `begin` or via `configure` (§4.2's table).
#[derive(Debug, Clone, Default)]
pub struct TxnConfig {
    pub isolation: Option<Isolation>,
    pub read_timestamp: Option<Timestamp>,
    pub roundup_read: bool,
    pub roundup_prepared: bool,
    pub no_timestamp: bool,
    pub ignore_prepare: Option<IgnorePrepare>,
    pub sync: Option<bool>,
    pub operation_timeout: Option<Duration>,
}

/// Commit/rollback-time configuration (commit/durable timestamps, sync).
#[derive(Debug, Clone, Default)]
pub struct ResolveConfig {
    pub commit_ts: Option<Timestamp>,
    pub durable_ts: Option<Timestamp>,
    pub sync: Option<bool>,
}

/// A single session's transaction state.
pub struct Session {
    slot_index: usize,
    /// Local copy of the transaction id; `Txid::NONE` when not id-bearing
    /// (§3: "`id`: local copy; `none` when not ID-bearing").
    pub id: Txid,
    pub isolation: Isolation,
    pub ignore_prepare: IgnorePrepare,
    flags: TxnFlags,
    state: TxnState,
    in_error: bool,
    pub snapshot: Option<crate::snapshot::Snapshot>,
    pub commit_ts: Timestamp,
    pub durable_ts: Timestamp,
    pub prepare_ts: Timestamp,
    pub first_commit_ts: Option<Timestamp>,
    pub read_ts: Timestamp,
    pub modifications: Vec<ModEntry>,
    pub rollback_reason: Option<String>,
    operation_timeout: Option<Duration>,
    timeout_started: Option<Instant>,
    roundup_read: bool,
    roundup_prepared: bool,
    no_timestamp: bool,
    sync: Option<bool>,
    /// Whether this transaction has touched a logged file (§4.2 `prepare`
    /// step 2: prepared transactions may not touch logged files).
    pub touches_logged_file: AtomicBool,
    snapshot_commit_generation: u64,
}

impl Session {
    /// Create a new, idle session bound to a freshly registered slot.
    pub fn new(slot_index: usize) -> Self {
        Session {
            slot_index,
            id: Txid::NONE,
            isolation: Isolation::default(),
            ignore_prepare: IgnorePrepare::default(),
            flags: TxnFlags::NONE,
            state: TxnState::Idle,
            in_error: false,
            snapshot: None,
            commit_ts: Timestamp::NONE,
            durable_ts: Timestamp::NONE,
            prepare_ts: Timestamp::NONE,
            first_commit_ts: None,
            read_ts: Timestamp::NONE,
            modifications: Vec::new(),
            rollback_reason: None,
            operation_timeout: None,
            timeout_started: None,
            roundup_read: false,
            roundup_prepared: false,
            no_timestamp: false,
            sync: None,
            touches_logged_file: AtomicBool::new(false),
            snapshot_commit_generation: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Whether the sticky error sub-state is active (§4.2: "forbids
    /// everything except rollback (read-only transactions may still commit
    /// from `error`)").
    pub fn in_error(&self) -> bool {
        self.in_error
    }

    /// Apply begin/reconfigure settings (§4.2's configuration table).
    pub fn configure(&mut self, cfg: &TxnConfig) {
        if let Some(isolation) = cfg.isolation {
            self.isolation = isolation;
        }
        if let Some(read_ts) = cfg.read_timestamp {
            self.read_ts = read_ts;
            self.flags.insert(TxnFlags::HAS_TS_READ);
        }
        self.roundup_read = cfg.roundup_read;
        self.roundup_prepared = cfg.roundup_prepared;
        self.no_timestamp = cfg.no_timestamp;
        if let Some(ignore_prepare) = cfg.ignore_prepare {
            self.ignore_prepare = ignore_prepare;
        }
        if let Some(sync) = cfg.sync {
            self.sync = Some(sync);
        }
        if let Some(timeout) = cfg.operation_timeout {
            self.operation_timeout = Some(timeout);
        }
    }

    /// Begin a new transaction: reset transient state, mark running.
    pub fn begin(&mut self, registry: &TxnRegistry, cfg: &TxnConfig) -> Result<()> {
        if self.state != TxnState::Idle {
            return Err(Error::InvalidArgument("transaction already running".into()));
        }
        self.modifications.clear();
        self.commit_ts = Timestamp::NONE;
        self.durable_ts = Timestamp::NONE;
        self.prepare_ts = Timestamp::NONE;
        self.first_commit_ts = None;
        self.rollback_reason = None;
        self.in_error = false;
        self.touches_logged_file.store(false, Ordering::Relaxed);
        self.flags = TxnFlags::RUNNING;
        self.configure(cfg);
        let id = registry.allocate_txid(self.slot_index);
        self.id = id;
        self.flags.insert(TxnFlags::HAS_ID);
        self.state = TxnState::Running;
        self.timeout_started = self.operation_timeout.map(|_| Instant::now());
        Ok(())
    }

    /// Build (or reuse, for read-committed) this session's snapshot (§4.1,
    /// the fast-path reuse when the commit generation hasn't moved).
    pub fn ensure_snapshot(&mut self, registry: &TxnRegistry) {
        if self.isolation == Isolation::ReadCommitted {
            if self.snapshot.is_some() && self.snapshot_commit_generation == registry.commit_generation() {
                return;
            }
        } else if self.snapshot.is_some() {
            return;
        }
        let (ids, snap_min, snap_max) = registry.take_snapshot(self.slot_index);
        let generation = registry.commit_generation();
        self.snapshot = Some(crate::snapshot::Snapshot::owned(ids, snap_min, snap_max, generation));
        self.snapshot_commit_generation = generation;
        self.flags.insert(TxnFlags::HAS_SNAPSHOT);
        registry.publish_pinned(self.slot_index, snap_max);
    }

    /// Record a modification against the running transaction's `mod[]` list.
    pub fn record(&mut self, entry: ModEntry) {
        self.modifications.push(entry);
    }

    fn check_timeout(&self) -> Result<()> {
        if let (Some(timeout), Some(started)) = (self.operation_timeout, self.timeout_started) {
            if started.elapsed() > timeout {
                return Err(Error::Rollback("operation_timeout_ms expired".into()));
            }
        }
        Ok(())
    }

    /// `prepare(session)` (§4.2).
    pub fn prepare(&mut self, registry: &TxnRegistry, prepare_ts: Timestamp, debug_log: bool) -> Result<()> {
        self.check_timeout()?;
        if self.state != TxnState::Running {
            return Err(Error::InvalidArgument("prepare requires a running transaction".into()));
        }
        if self.flags.contains(TxnFlags::HAS_TS_COMMIT) {
            return Err(Error::InvalidArgument(
                "cannot prepare a transaction that already has a commit timestamp".into(),
            ));
        }
        if self.touches_logged_file.load(Ordering::Relaxed) && !debug_log {
            return Err(Error::NotSupported(
                "prepared transactions may not modify logged files".into(),
            ));
        }

        self.prepare_ts = prepare_ts;
        let mut seen: HashSet<(u32, Vec<u8>)> = HashSet::new();
        for entry in self.modifications.iter_mut() {
            match entry {
                ModEntry::BasicRow { update, .. }
                | ModEntry::InMemRow { update, .. }
                | ModEntry::BasicCol { update, .. }
                | ModEntry::InMemCol { update, .. } => {
                    if update.update_type() == UpdateType::Reserve {
                        update.resolve_rollback();
                    } else {
                        update.mark_prepared(prepare_ts);
                    }
                    if let Some(key) = entry.dedup_key() {
                        let repeated = !seen.insert(key);
                        entry.set_key_repeated(repeated);
                    }
                }
                ModEntry::RefDelete { .. } => {
                    // Fast-truncate prepare publishing is a page-state
                    // transition the (excluded) page layer owns; nothing
                    // further to publish on the `ModEntry` itself here.
                }
                ModEntry::TruncateRow { .. } | ModEntry::TruncateCol { .. } => {}
            }
        }

        self.snapshot = None;
        registry.clear_slot(self.slot_index);
        self.flags.insert(TxnFlags::PREPARE);
        self.state = TxnState::Prepared;
        Ok(())
    }

    /// `commit(session, cfg)` (§4.2).
    pub fn commit(
        &mut self,
        registry: &TxnRegistry,
        timestamps: &TimestampAuthority,
        logger: &dyn wt_core::CommitLogger,
        deps: &ResolveDeps<'_>,
        cfg: ResolveConfig,
    ) -> Result<()> {
        if self.state != TxnState::Running && self.state != TxnState::Prepared {
            return Err(Error::InvalidArgument("no transaction to commit".into()));
        }
        let prepared = self.state == TxnState::Prepared;

        let commit_ts = timestamp::assign_commit_ts(
            cfg.commit_ts.unwrap_or(self.commit_ts),
            self.first_commit_ts,
            self.prepare_ts,
            timestamps.stable_ts(),
            prepared,
            self.roundup_prepared,
        )?;
        let durable_ts = timestamp::assign_durable_ts(cfg.durable_ts.or(Some(self.durable_ts)).filter(|t| !t.is_none()), commit_ts)?;
        if prepared && commit_ts < self.prepare_ts {
            return Err(Error::InvalidArgument("prepare_ts must be <= commit_ts".into()));
        }
        self.first_commit_ts.get_or_insert(commit_ts);
        self.commit_ts = commit_ts;
        self.durable_ts = durable_ts;

        self.snapshot = None;
        if prepared {
            self.modifications.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        }

        let force_sync = cfg.sync.or(self.sync).unwrap_or(false);
        if self.touches_logged_file.load(Ordering::Relaxed) {
            logger.log_commit(self.id, force_sync)?;
        }

        let mut any_modifications = false;
        for entry in self.modifications.iter() {
            any_modifications = true;
            match entry {
                ModEntry::BasicRow { btree_id, key, update, key_repeated }
                | ModEntry::InMemRow { btree_id, key, update, key_repeated } => {
                    if prepared {
                        if !key_repeated {
                            prepare::resolve_prepared_op(
                                update,
                                *btree_id,
                                &Key::Row(key.clone()),
                                self.id,
                                true,
                                commit_ts,
                                durable_ts,
                                deps,
                            )?;
                        }
                    } else {
                        update.resolve_commit(commit_ts, durable_ts);
                    }
                }
                ModEntry::BasicCol { btree_id, recno, update, key_repeated }
                | ModEntry::InMemCol { btree_id, recno, update, key_repeated } => {
                    if prepared {
                        if !key_repeated {
                            prepare::resolve_prepared_op(
                                update,
                                *btree_id,
                                &Key::Column(*recno),
                                self.id,
                                true,
                                commit_ts,
                                durable_ts,
                                deps,
                            )?;
                        }
                    } else {
                        update.resolve_commit(commit_ts, durable_ts);
                    }
                }
                ModEntry::RefDelete { page, .. } => {
                    let _ = page.commit_fast_truncate();
                }
                ModEntry::TruncateRow { .. } | ModEntry::TruncateCol { .. } => {}
            }
        }

        // Past this point a failure is unrecoverable (§4.2 step 5).
        let published_durable = timestamps.advance_durable(durable_ts);
        if prepared && published_durable <= timestamps.stable_ts() {
            tracing::error!(txn = self.id.0, "prepared commit's durable_ts did not exceed stable_ts");
            return Err(Error::Panic("durable_ts did not exceed stable_ts for a prepared commit".into()));
        }
        tracing::debug!(txn = self.id.0, prepared, commit_ts = commit_ts.0, "transaction committed");

        if any_modifications {
            registry.bump_commit_generation();
        }
        if !prepared {
            registry.clear_slot(self.slot_index);
        }
        self.flags = TxnFlags::NONE;
        self.state = TxnState::Idle;
        Ok(())
    }

    /// `rollback(session, cfg)` (§4.2).
    pub fn rollback(&mut self, registry: &TxnRegistry, deps: &ResolveDeps<'_>) -> Result<()> {
        if self.state == TxnState::Idle {
            return Err(Error::InvalidArgument("no transaction to roll back".into()));
        }
        let prepared = self.state == TxnState::Prepared;
        self.snapshot = None;

        if prepared {
            self.modifications.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        }

        for entry in self.modifications.iter() {
            match entry {
                ModEntry::BasicRow { btree_id, key, update, key_repeated }
                | ModEntry::InMemRow { btree_id, key, update, key_repeated } => {
                    if prepared {
                        if !key_repeated {
                            prepare::resolve_prepared_op(
                                update,
                                *btree_id,
                                &Key::Row(key.clone()),
                                self.id,
                                false,
                                Timestamp::NONE,
                                Timestamp::NONE,
                                deps,
                            )?;
                        }
                    } else {
                        update.resolve_rollback();
                    }
                }
                ModEntry::BasicCol { btree_id, recno, update, key_repeated }
                | ModEntry::InMemCol { btree_id, recno, update, key_repeated } => {
                    if prepared {
                        if !key_repeated {
                            prepare::resolve_prepared_op(
                                update,
                                *btree_id,
                                &Key::Column(*recno),
                                self.id,
                                false,
                                Timestamp::NONE,
                                Timestamp::NONE,
                                deps,
                            )?;
                        }
                    } else {
                        update.resolve_rollback();
                    }
                }
                ModEntry::RefDelete { page, .. } => page.rollback_fast_truncate(),
                ModEntry::TruncateRow { .. } | ModEntry::TruncateCol { .. } => {}
            }
        }

        registry.clear_slot(self.slot_index);
        self.flags = TxnFlags::NONE;
        self.in_error = false;
        self.state = TxnState::Idle;
        Ok(())
    }

    /// `release(session)` (§4.2): clears per-session id unless prepare
    /// already did, frees the modify list, resets timers.
    pub fn release(&mut self, registry: &TxnRegistry) {
        if self.state != TxnState::Idle {
            registry.clear_slot(self.slot_index);
        }
        self.modifications.clear();
        self.snapshot = None;
        self.flags = TxnFlags::NONE;
        self.state = TxnState::Idle;
        self.operation_timeout = None;
        self.timeout_started = None;
        self.id = Txid::NONE;
    }

    /// Mark the sticky error sub-state (any operation may call this; only
    /// rollback, or commit of a read-only transaction, is permitted after).
    pub fn set_error(&mut self, reason: impl Into<String>) {
        self.in_error = true;
        self.rollback_reason = Some(reason.into());
    }
}
