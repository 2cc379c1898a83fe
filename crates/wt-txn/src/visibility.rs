//! The visibility predicate (§4.1: "`visible(reader_session, upd)`").

use crate::chain::{PrepareState, UpdateNodeView};
use crate::session::IgnorePrepare;
use crate::snapshot::Snapshot;
use wt_core::{Timestamp, Txid};

/// What a reader should do about an update it has found on a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// The reader can see this version.
    Visible,
    /// The reader cannot see this version (too new, rolled back, or
    /// shadowed by the reader's own snapshot).
    Invisible,
    /// The update is an unresolved prepared transaction and the reader does
    /// not carry `ignore_prepare` — the caller must surface `PrepareConflict`.
    PrepareConflict,
}

/// Everything the visibility predicate needs to know about the reader,
/// independent of which update is being tested.
#[derive(Debug, Clone, Copy)]
pub struct Reader {
    /// The reader's own transaction id, if it has one (`Txid::NONE` for a
    /// reader with no transaction context — "committed-read pseudo").
    pub id: Txid,
    /// The reader's read timestamp, used only when `id` is none.
    pub read_ts: Timestamp,
    /// How the reader wants to treat an in-progress prepared update.
    pub ignore_prepare: IgnorePrepare,
}

/// `visible(reader, upd)` from §4.1.
///
/// `snapshot` is `None` for a read-uncommitted reader (no snapshot at all —
/// everything not aborted is visible) and `Some` for snapshot/read-committed
/// isolation.
pub fn visible(reader: Reader, upd: UpdateNodeView, snapshot: Option<&Snapshot>) -> Visibility {
    if upd.txid.is_aborted() {
        return Visibility::Invisible;
    }

    if reader.id.is_none() {
        // Committed-read pseudo-reader: compare against read_ts directly.
        return if !upd.start_ts.is_none() && upd.start_ts <= reader.read_ts {
            prepare_gate(reader, upd)
        } else {
            Visibility::Invisible
        };
    }

    if upd.txid == reader.id {
        return Visibility::Visible;
    }

    let Some(snapshot) = snapshot else {
        // Read-uncommitted: anything not aborted and not our own write is
        // still visible, prepared state aside.
        return prepare_gate(reader, upd);
    };

    if !upd.txid.precedes(snapshot.snap_max()) {
        // upd.txid >= snap_max: allocated after our snapshot was taken.
        return Visibility::Invisible;
    }
    if upd.txid.precedes(snapshot.snap_min()) {
        return prepare_gate(reader, upd);
    }
    if snapshot.contains(upd.txid) {
        return Visibility::Invisible;
    }
    prepare_gate(reader, upd)
}

fn prepare_gate(reader: Reader, upd: UpdateNodeView) -> Visibility {
    if upd.prepare_state != PrepareState::InProgress {
        return Visibility::Visible;
    }
    match reader.ignore_prepare {
        IgnorePrepare::False => Visibility::PrepareConflict,
        IgnorePrepare::True => Visibility::Invisible,
        IgnorePrepare::Force => Visibility::Visible,
    }
}
