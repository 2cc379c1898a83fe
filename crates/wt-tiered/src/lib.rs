//! Tiered merged cursor for a WiredTiger-family storage engine
//!
//! This crate implements the K-way merge a tiered table's cursor performs
//! across its writable local tier and any number of older, read-only
//! checkpointed tiers:
//! - TieredCursor: the merged `TierCursor` implementation itself
//! - tombstone encode/decode: the two-byte deletion marker and its
//!   collision-escaping for application values that would otherwise be
//!   mistaken for it
//!
//! The physical tier cursors (local B-tree, remote object-store reader) are
//! out of scope; this crate only consumes them through `wt_core::TierCursor`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod tombstone;

pub use cursor::{TieredCursor, MAX_TIERS};
pub use tombstone::{decode, encode, is_tombstone, tombstone_value, MARKER};

pub use wt_core::{ByteLexCollator, Collator, Error, Result, RowKey, TierCursor, Value};
