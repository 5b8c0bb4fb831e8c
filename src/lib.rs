//! # histdiff
//!
//! Row-level history diffs for tables in a version-controlled relational
//! store. A [`DiffTable`] walks the commit graph once, splits the table's
//! history into before/after partitions wherever its content changed,
//! reconciles every historical schema into one super-schema and streams
//! the joined `to_*`/`from_*` rows of each partition from a background
//! differ.

pub mod async_differ;
pub mod cancel;
pub mod cli;
pub mod commands;
pub mod commit_walk;
pub mod config;
pub mod diff_iter;
pub mod diff_table;
pub mod error;
pub mod fixture;
pub mod hash;
pub mod memory;
pub mod output;
pub mod partition;
pub mod row;
pub mod rowconv;
pub mod schema;
pub mod store;
pub mod super_schema;
pub mod value;

pub use async_differ::{AsyncDiffer, DiffEntry, DiffType};
pub use cancel::CancelToken;
pub use config::EngineConfig;
pub use diff_iter::{DiffRow, DiffRowIter, DiffSchema};
pub use diff_table::{DiffTable, DiffTableOptions};
pub use error::{HistDiffError, Result};
pub use hash::Hash;
pub use partition::{DiffPartition, PartitionSet};
pub use store::SnapshotStore;
pub use super_schema::SuperSchema;

/// Default bound of the channel between a differ and its consumer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default interval at which blocked differ calls re-check for cancellation
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5;

/// Label of the uncommitted working state
pub const WORKING_LABEL: &str = "WORKING";

/// Name prefix of diff tables
pub const DIFF_TABLE_PREFIX: &str = "diff_";
