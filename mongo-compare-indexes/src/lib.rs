//! Compare the index definitions of two MongoDB databases.
//!
//! A run collects an [`IndexSnapshot`] from each side through an
//! [`IndexSource`], then [`diff`]s them by `(collection, index name)`
//! identity. [`compare_databases`] does both against live servers and closes
//! the connections whatever the outcome.

pub mod collector;
pub mod compare;
pub mod config;
pub mod differ;
pub mod errors;
pub mod events;
pub mod memory;
pub mod mongo;
pub mod snapshot;
pub mod source;
pub mod types;

pub use collector::{CollectOptions, collect};
pub use compare::{
    ComparisonReport, SideSummary, collect_and_close, compare_and_close, compare_databases, compare_sources,
    snapshot_database,
};
pub use config::{CompareConfig, Settings};
pub use differ::{DiffOptions, IndexDiff, diff, diff_with_events};
pub use errors::*;
pub use events::{CompareEvent, EventSink, LogSink, NullSink, RecordingSink, SkipReason};
pub use memory::MemorySource;
pub use mongo::MongoSource;
pub use snapshot::{IndexSnapshot, SnapshotBuilder};
pub use source::IndexSource;
pub use types::{
    CollectionInfo, CollectionKind, DivergentIndexRecord, IndexDefinition, IndexIdentity, IndexInfo, IndexKey,
    MissingIndexRecord, Side,
};

// Re-export the driver so callers can build their own `MongoSource` inputs
// without pinning a separate version.
pub use mongodb;
