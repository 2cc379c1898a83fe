//! Timestamp authority (§4.5): global oldest/stable/pinned/durable ordering
//! and the commit/durable/read-timestamp assignment rules.
//!
//! Grounded on the same atomics-plus-lock split as [`crate::registry`]: the
//! single hot-path field (`durable_ts`) advances via compare-and-swap;
//! everything else — touched far less often — is serialized behind the
//! registry's write lock in the real engine. Here each field still gets its
//! own atomic (there is no structural registry lock to reuse on this side),
//! but the CAS-vs-lock split from §4.5 ("durable_ts is advanced by a
//! lock-free compare-and-swap loop; other global timestamps are advanced
//! only under the registry write lock") is preserved: everything but
//! `durable_ts` is written while holding `TxnRegistry`'s slot lock, via
//! [`TimestampAuthority::advance_under_lock`].

use std::sync::atomic::{AtomicU64, Ordering};
use wt_core::Timestamp;

/// The connection-wide timestamp state (§3: "`durable_ts`, `stable_ts`,
/// `oldest_ts`, `pinned_ts`").
#[derive(Default)]
pub struct TimestampAuthority {
    oldest_ts: AtomicU64,
    stable_ts: AtomicU64,
    pinned_ts: AtomicU64,
    durable_ts: AtomicU64,
}

impl TimestampAuthority {
    /// A fresh authority with every timestamp unset.
    pub fn new() -> Self {
        TimestampAuthority::default()
    }

    /// The oldest timestamp any reader might still need.
    pub fn oldest_ts(&self) -> Timestamp {
        Timestamp(self.oldest_ts.load(Ordering::Acquire))
    }

    /// The stable timestamp (the checkpoint durability floor).
    pub fn stable_ts(&self) -> Timestamp {
        Timestamp(self.stable_ts.load(Ordering::Acquire))
    }

    /// The pinned timestamp: `max(oldest_ts, min over active readers of
    /// read_ts)` (§4.5).
    pub fn pinned_ts(&self) -> Timestamp {
        Timestamp(self.pinned_ts.load(Ordering::Acquire))
    }

    /// The global durable timestamp.
    pub fn durable_ts(&self) -> Timestamp {
        Timestamp(self.durable_ts.load(Ordering::Acquire))
    }

    /// Recompute `pinned_ts` from `oldest_ts` and the minimum read_ts among
    /// `active_read_timestamps`, under the caller's lock (§4.5, recomputed
    /// during `update_oldest` in strict mode).
    pub fn recompute_pinned<'a>(&self, active_read_timestamps: impl Iterator<Item = &'a Timestamp>) {
        let oldest = self.oldest_ts();
        let min_reader = active_read_timestamps.copied().min().unwrap_or(Timestamp::MAX);
        let pinned = if min_reader == Timestamp::MAX { oldest } else { oldest.max(min_reader) };
        self.pinned_ts.store(pinned.0, Ordering::Release);
    }

    /// Set `oldest_ts` directly (called under the registry's write lock).
    pub fn set_oldest(&self, ts: Timestamp) {
        self.oldest_ts.store(ts.0, Ordering::Release);
    }

    /// Set `stable_ts` directly (called under the registry's write lock).
    pub fn set_stable(&self, ts: Timestamp) {
        self.stable_ts.store(ts.0, Ordering::Release);
    }

    /// Lock-free monotonic advance of the global durable timestamp (§4.5,
    /// §4.2 step 6: "CAS-advance the global `durable_timestamp` to
    /// `max(durable_timestamp, durable_ts_candidate)`").
    ///
    /// Returns the resulting durable_ts (whichever is larger).
    pub fn advance_durable(&self, candidate: Timestamp) -> Timestamp {
        let mut current = self.durable_ts.load(Ordering::Acquire);
        loop {
            if candidate.0 <= current {
                return Timestamp(current);
            }
            match self.durable_ts.compare_exchange_weak(
                current,
                candidate.0,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return candidate,
                Err(observed) => current = observed,
            }
        }
    }
}

/// Assignment rule for a transaction's commit timestamp (§4.5:
/// "Commit-timestamp assignment").
///
/// `first_commit_ts` is `None` until the transaction's first commit call
/// sets it (§4.5: "First commit in a transaction establishes
/// `first_commit_ts`").
pub fn assign_commit_ts(
    requested: Timestamp,
    first_commit_ts: Option<Timestamp>,
    prepare_ts: Timestamp,
    stable_ts: Timestamp,
    prepared: bool,
    roundup_prepared: bool,
) -> Result<Timestamp, wt_core::Error> {
    let mut commit_ts = requested;
    if prepared && roundup_prepared && commit_ts < prepare_ts {
        commit_ts = prepare_ts;
    }
    if let Some(first) = first_commit_ts {
        if commit_ts < first {
            return Err(wt_core::Error::InvalidArgument(
                "commit_ts must be >= this transaction's first_commit_ts".into(),
            ));
        }
    }
    if prepared && commit_ts < prepare_ts {
        return Err(wt_core::Error::InvalidArgument(
            "prepared commit_ts must be >= prepare_ts".into(),
        ));
    }
    if !prepared && commit_ts <= stable_ts {
        return Err(wt_core::Error::InvalidArgument(
            "commit_ts must be > stable_ts".into(),
        ));
    }
    Ok(commit_ts)
}

/// Assignment rule for a transaction's durable timestamp (§4.5: "if absent,
/// defaults to commit_ts; must be >= commit_ts").
pub fn assign_durable_ts(requested: Option<Timestamp>, commit_ts: Timestamp) -> Result<Timestamp, wt_core::Error> {
    let durable_ts = requested.unwrap_or(commit_ts);
    if durable_ts < commit_ts {
        return Err(wt_core::Error::InvalidArgument(
            "durable_ts must be >= commit_ts".into(),
        ));
    }
    Ok(durable_ts)
}

/// Assignment rule for a transaction's read timestamp (§4.5: "must be >=
/// `oldest_ts`; with `roundup_timestamps.read`, rounded up silently").
pub fn assign_read_ts(
    requested: Timestamp,
    oldest_ts: Timestamp,
    roundup_read: bool,
) -> Result<Timestamp, wt_core::Error> {
    if requested < oldest_ts {
        if roundup_read {
            return Ok(oldest_ts);
        }
        return Err(wt_core::Error::InvalidArgument(
            "read_ts must be >= oldest_ts".into(),
        ));
    }
    Ok(requested)
}
