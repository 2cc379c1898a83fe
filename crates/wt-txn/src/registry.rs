//! Global transaction registry (§4.1): id allocation, the live-transaction
//! table, and snapshot construction.
//!
//! Grounded on `crates/concurrency/src/manager.rs`'s counter-and-slot-table
//! style: a monotonic `AtomicU64` id source plus a fixed table of per-session
//! published state, guarded by a single `parking_lot::RwLock` for the rare
//! structural operations (grow the table, sweep `oldest`) and lock-free
//! atomics for the hot path (publish an id, read a slot).

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use wt_core::Txid;

/// One session's published transaction state, visible to every other
/// session computing a snapshot (§3: "Global registry").
pub struct SessionSlot {
    /// The id this slot is currently running, or `Txid::NONE` if idle.
    id: AtomicU64,
    /// Set for the duration of `allocate_txid`, between "id drawn from the
    /// counter" and "id published to this slot" — a concurrent snapshot
    /// must either wait this out or treat the slot as "could be anything
    /// less than the allocating thread's next id" (§4.1, "a transaction
    /// caught mid-allocation ...").
    is_allocating: AtomicBool,
    /// Whether this slot should be skipped entirely when building a
    /// snapshot for some other session — set while idle, and also set for
    /// the session whose own snapshot is being computed (§4.1: "excluding
    /// the caller's own slot").
    active: AtomicBool,
}

impl SessionSlot {
    fn new() -> Self {
        SessionSlot {
            id: AtomicU64::new(Txid::NONE.0),
            is_allocating: AtomicBool::new(false),
            active: AtomicBool::new(false),
        }
    }

    fn published_id(&self) -> Txid {
        Txid(self.id.load(Ordering::Acquire))
    }
}

/// The global transaction registry shared by every session in a connection.
pub struct TxnRegistry {
    /// Next id to hand out. `current_id - 1` is the last id actually
    /// allocated.
    current_id: AtomicU64,
    /// Oldest id any live snapshot might still need to see (§4.1,
    /// `update_oldest`).
    oldest_id: AtomicU64,
    /// Lower bound published for checkpoint cursors pinned below `oldest_id`
    /// (§3: `pinned_id`).
    pinned_id: AtomicU64,
    /// Bumped every time a transaction commits or rolls back, letting
    /// read-committed sessions cheaply detect "nothing changed, keep my
    /// current snapshot" (§4.1, read-committed snapshot refresh).
    commit_generation: AtomicU64,
    slots: RwLock<Vec<SessionSlot>>,
}

impl Default for TxnRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TxnRegistry {
    /// Construct an empty registry. The first id handed out is `Txid::FIRST`.
    pub fn new() -> Self {
        TxnRegistry {
            current_id: AtomicU64::new(Txid::FIRST.0),
            oldest_id: AtomicU64::new(Txid::FIRST.0),
            pinned_id: AtomicU64::new(Txid::FIRST.0),
            commit_generation: AtomicU64::new(0),
            slots: RwLock::new(Vec::new()),
        }
    }

    /// Reserve a slot for a new session, returning its index. Sessions never
    /// give back a slot index while the connection is open; a closed
    /// session's slot is recycled by marking it idle, not by shrinking the
    /// table (so indices handed out earlier stay valid).
    pub fn register_session(&self) -> usize {
        let mut slots = self.slots.write();
        slots.push(SessionSlot::new());
        slots.len() - 1
    }

    /// The oldest id any live snapshot might still need (§3: `oldest_id`).
    pub fn oldest_id(&self) -> Txid {
        Txid(self.oldest_id.load(Ordering::Acquire))
    }

    /// The lowest id pinned by a checkpoint or long-running cursor.
    pub fn pinned_id(&self) -> Txid {
        Txid(self.pinned_id.load(Ordering::Acquire))
    }

    /// Draw a fresh id and publish it into `slot` (§4.1, `allocate_txid`).
    ///
    /// The two-step publish — mark `is_allocating`, fetch-and-increment the
    /// counter, store the id, clear `is_allocating` — is why a concurrent
    /// snapshot has to treat an allocating slot as "not yet resolved" rather
    /// than simply reading whatever is currently there: the slot's old
    /// (usually `NONE`) value is stale the instant `is_allocating` goes up.
    pub fn allocate_txid(&self, slot_index: usize) -> Txid {
        let slots = self.slots.read();
        let slot = &slots[slot_index];
        slot.is_allocating.store(true, Ordering::SeqCst);
        let id = Txid(self.current_id.fetch_add(1, Ordering::SeqCst));
        slot.id.store(id.0, Ordering::Release);
        slot.active.store(true, Ordering::Release);
        slot.is_allocating.store(false, Ordering::SeqCst);
        id
    }

    /// Publish `id` as this session's pinned read point without drawing a
    /// fresh transaction id (used by the read-committed "adopt the lowest
    /// currently-running id" path and by checkpoint cursors).
    pub fn publish_pinned(&self, slot_index: usize, id: Txid) {
        let slots = self.slots.read();
        let slot = &slots[slot_index];
        slot.id.store(id.0, Ordering::Release);
        slot.active.store(true, Ordering::Release);
    }

    /// Clear a session's published state, making it invisible to future
    /// snapshots (§4.1: "commit/rollback clears the session's published id").
    pub fn clear_slot(&self, slot_index: usize) {
        let slots = self.slots.read();
        let slot = &slots[slot_index];
        slot.id.store(Txid::NONE.0, Ordering::Release);
        slot.active.store(false, Ordering::Release);
    }

    /// Record that a transaction resolved, for read-committed's cheap
    /// "did anything change" check.
    pub fn bump_commit_generation(&self) {
        self.commit_generation.fetch_add(1, Ordering::Release);
    }

    /// The current commit generation counter.
    pub fn commit_generation(&self) -> u64 {
        self.commit_generation.load(Ordering::Acquire)
    }

    /// Build a snapshot for `slot_index`, excluding its own published id
    /// (§4.1, `take_snapshot`).
    ///
    /// Returns the sorted ids of every other transaction that is either
    /// still allocating (conservatively included, since it may yet publish
    /// an id below the caller's horizon) or has published an id less than
    /// the freshly-drawn `current`, plus the `(snap_min, snap_max)` bounds
    /// used by [`crate::visibility::visible`].
    pub fn take_snapshot(&self, slot_index: usize) -> (Vec<Txid>, Txid, Txid) {
        let current = Txid(self.current_id.load(Ordering::SeqCst));
        let oldest = self.oldest_id();
        let slots = self.slots.read();

        let mut ids = Vec::with_capacity(slots.len());
        for (i, slot) in slots.iter().enumerate() {
            if i == slot_index {
                continue;
            }
            // An allocating neighbor hasn't published yet; wait it out
            // briefly rather than racily excluding an id that is about to
            // become live and younger than `current`.
            let mut spins = 0;
            while slot.is_allocating.load(Ordering::SeqCst) {
                std::hint::spin_loop();
                spins += 1;
                if spins > 1_000 {
                    break;
                }
            }
            if !slot.active.load(Ordering::Acquire) {
                continue;
            }
            let id = slot.published_id();
            if id.is_none() || id.is_aborted() {
                continue;
            }
            if id.precedes(current) {
                ids.push(id);
            }
        }

        ids.sort_by(|a, b| {
            if a == b {
                std::cmp::Ordering::Equal
            } else if a.precedes(*b) {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            }
        });
        ids.dedup();

        let snap_min = ids.first().copied().unwrap_or(current);
        let snap_min = if snap_min.precedes(oldest) { oldest } else { snap_min };
        (ids, snap_min, current)
    }

    /// Recompute `oldest_id` as the minimum of every active slot's published
    /// id and the current allocation counter (§4.1, `update_oldest`).
    ///
    /// WiredTiger skips the sweep unless the id has moved by a worthwhile
    /// margin, to avoid every commit paying for a full scan; `force` (used
    /// by checkpoint and shutdown paths) bypasses that threshold.
    pub fn update_oldest(&self, force: bool) {
        let slots = self.slots.read();
        let mut oldest = Txid(self.current_id.load(Ordering::SeqCst));
        for slot in slots.iter() {
            if !slot.active.load(Ordering::Acquire) {
                continue;
            }
            let id = slot.published_id();
            if !id.is_none() && !id.is_aborted() && id.precedes(oldest) {
                oldest = id;
            }
        }
        let previous = self.oldest_id();
        let moved = oldest.0.wrapping_sub(previous.0);
        if force || moved >= 100 {
            self.oldest_id.store(oldest.0, Ordering::Release);
            if self.pinned_id().precedes(oldest) {
                self.pinned_id.store(oldest.0, Ordering::Release);
            }
        }
    }

    /// Advance the pinned id directly, e.g. to release a checkpoint cursor's
    /// hold without waiting for the next `update_oldest` sweep.
    pub fn advance_pinned(&self, id: Txid) {
        let mut current = self.pinned_id();
        while current.precedes(id) {
            match self.pinned_id.compare_exchange_weak(
                current.0,
                id.0,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = Txid(observed),
            }
        }
    }
}
