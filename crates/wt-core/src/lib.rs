//! Shared primitives for the transaction core and tiered cursor.
//!
//! This crate defines the foundational types and external-interface traits
//! used by `wt-txn` and `wt-tiered`:
//!
//! - `Txid` / `Timestamp`: wrap-safe ordered identifiers (§3 of the design).
//! - `Key` / `Value`: the minimal key/value shapes the transaction core and
//!   tiered cursor operate on.
//! - `error`: the unified error hierarchy (§7).
//! - `traits`: the external collaborator interfaces consumed by the core
//!   (data handle, tier cursor protocol, history store, commit logger) —
//!   the physical B-tree, block I/O, and on-disk history store themselves
//!   are out of scope (§1).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ids;
pub mod key;
pub mod traits;
pub mod value;

pub use error::{Error, Result};
pub use ids::{TimeWindow, Timestamp, Txid, txid_cmp};
pub use key::{Key, RecordId, RowKey};
pub use traits::{ByteLexCollator, Collator, CommitLogger, DataHandle, HistoryStore, TierCursor};
pub use value::Value;
