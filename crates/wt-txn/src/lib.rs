//! Transaction core for a WiredTiger-family storage engine
//!
//! This crate implements the per-session transaction lifecycle that sits
//! above the page/B-tree layer:
//! - TxnRegistry: global id allocation, the live-transaction table, and
//!   snapshot construction
//! - Session: begin/prepare/commit/rollback/release for one session's
//!   transaction
//! - visible(): the snapshot-isolation visibility predicate
//! - resolve_prepared_op(): two-phase resolution of a prepared transaction's
//!   updates, including history-store coupling
//! - TimestampAuthority: oldest/stable/pinned/durable timestamp bookkeeping
//!
//! The physical B-tree page, on-disk history store, and write-ahead log are
//! out of scope; this crate talks to them only through the trait objects
//! defined in `wt_core::traits`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod flags;
pub mod prepare;
pub mod registry;
pub mod session;
pub mod snapshot;
#[cfg(test)]
pub mod testing;
pub mod timestamp;
pub mod visibility;

pub use chain::{PrepareState, UpdateFlags, UpdateNode, UpdateNodeView, UpdateType};
pub use flags::TxnFlags;
pub use prepare::{resolve_prepared_op, ResolveDeps};
pub use registry::TxnRegistry;
pub use session::{
    IgnorePrepare, Isolation, ModEntry, PageRef, PageState, ResolveConfig, Session, TxnConfig, TxnState,
};
pub use snapshot::Snapshot;
pub use timestamp::{assign_commit_ts, assign_durable_ts, assign_read_ts, TimestampAuthority};
pub use visibility::{visible, Reader, Visibility};

// Re-export the shared primitives from wt-core for convenience.
pub use wt_core::{Error, Key, RecordId, Result, RowKey, TimeWindow, Timestamp, Txid, Value};
