//! Per-transaction snapshots (§3: "sorted array of concurrent txids with
//! `snap_min`, `snap_max`, `count`").
//!
//! §9's open question about checkpoint snapshot ownership ("an implementation
//! mixing inline and heap storage must make the distinction a type-level
//! property to avoid double-free") doesn't apply directly to Rust — there is
//! no manual free to get wrong — but the underlying requirement, that a
//! checkpoint's externally-owned snapshot is never confused with an ordinary
//! session's own snapshot, is still worth keeping visible at the type level.
//! [`Snapshot::Owned`] is what every ordinary session uses; [`Snapshot::Checkpoint`]
//! marks a snapshot built once by the checkpoint scheduler and shared
//! read-only across every reader pinned to it, via `Arc` rather than a
//! per-session copy.

use std::sync::Arc;
use wt_core::Txid;

/// A transaction's view of which other transactions were concurrent with it
/// at the moment the snapshot was taken.
#[derive(Debug, Clone)]
pub enum Snapshot {
    /// An ordinary session's own snapshot (§9: "for a normal session the
    /// storage is inline" — in Rust, a plain owned `Vec`).
    Owned(Arc<SnapshotData>),
    /// A checkpoint cursor's snapshot, built once and shared by every reader
    /// pinned to that checkpoint (§9: "heap-allocated and owned separately").
    Checkpoint(Arc<SnapshotData>),
}

/// The sorted ids plus the `snap_min`/`snap_max` bounds of a snapshot
/// (I3: `snap_min` is the smallest txid in the snapshot, or `snap_max` if
/// the snapshot is empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotData {
    /// Concurrent txids, sorted ascending under wrap-safe order.
    pub ids: Vec<Txid>,
    /// Smallest id in `ids`, or `snap_max` if `ids` is empty.
    pub snap_min: Txid,
    /// The allocator's `current` value at the moment this snapshot was
    /// taken; every id `>= snap_max` is "in the future" to this reader.
    pub snap_max: Txid,
    /// The commit-generation counter observed when this snapshot was built,
    /// used by read-committed's cheap refresh check (§4.1).
    pub commit_generation: u64,
}

impl Snapshot {
    /// Build an ordinary session snapshot.
    pub fn owned(ids: Vec<Txid>, snap_min: Txid, snap_max: Txid, commit_generation: u64) -> Self {
        Snapshot::Owned(Arc::new(SnapshotData {
            ids,
            snap_min,
            snap_max,
            commit_generation,
        }))
    }

    /// Build a checkpoint snapshot, shared across every reader pinned to it.
    pub fn checkpoint(ids: Vec<Txid>, snap_min: Txid, snap_max: Txid) -> Self {
        Snapshot::Checkpoint(Arc::new(SnapshotData {
            ids,
            snap_min,
            snap_max,
            commit_generation: 0,
        }))
    }

    /// The underlying data, regardless of ownership kind.
    pub fn data(&self) -> &SnapshotData {
        match self {
            Snapshot::Owned(d) | Snapshot::Checkpoint(d) => d,
        }
    }

    /// True if `id` is recorded as concurrent in this snapshot (binary
    /// search, since `ids` is always kept sorted — §4.1: "custom
    /// introselect-style partition + insertion sort for small arrays";
    /// a binary search over a sorted `Vec` gets the same asymptotic
    /// behavior with the standard library's sort doing the work a bespoke
    /// introselect would have).
    pub fn contains(&self, id: Txid) -> bool {
        let data = self.data();
        data.ids
            .binary_search_by(|probe| {
                if *probe == id {
                    std::cmp::Ordering::Equal
                } else if probe.precedes(id) {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Greater
                }
            })
            .is_ok()
    }

    /// `snap_min` (I3).
    pub fn snap_min(&self) -> Txid {
        self.data().snap_min
    }

    /// `snap_max`.
    pub fn snap_max(&self) -> Txid {
        self.data().snap_max
    }

    /// The commit generation this snapshot was built under (always `0` for
    /// checkpoint snapshots, which never refresh).
    pub fn commit_generation(&self) -> u64 {
        self.data().commit_generation
    }
}
