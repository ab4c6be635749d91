//! Comparison events and the sinks that receive them.
//!
//! Components never log directly; they report [`CompareEvent`]s to the sink
//! handed to them. [`LogSink`] forwards to the `log` facade, tests capture
//! events with their own sink.

use crate::types::{IndexIdentity, Side};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareEvent {
    Connected {
        side: Side,
        database: String,
    },
    CollectionsListed {
        side: Side,
        count: usize,
    },
    CollectionSkipped {
        side: Side,
        collection: String,
        reason: SkipReason,
    },
    IndexCollected {
        side: Side,
        identity: IndexIdentity,
    },
    /// The same identity was produced twice for one snapshot. The later
    /// definition replaced the earlier one.
    IdentityCollision {
        side: Side,
        identity: IndexIdentity,
    },
    SnapshotBuilt {
        side: Side,
        collections: usize,
        indexes: usize,
    },
    /// `identity` exists on the other side but not on `missing_from`.
    IndexMissing {
        missing_from: Side,
        identity: IndexIdentity,
    },
    IndexDiverged {
        identity: IndexIdentity,
    },
    Closed {
        side: Side,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    View,
    Timeseries,
    System,
    Unsupported,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::View => write!(f, "view"),
            SkipReason::Timeseries => write!(f, "time-series collection"),
            SkipReason::System => write!(f, "system collection"),
            SkipReason::Unsupported => write!(f, "unsupported namespace type"),
        }
    }
}

/// Receiver for comparison events.
pub trait EventSink: Sync {
    fn record(&self, event: CompareEvent);
}

/// Sink that writes every event through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&self, event: CompareEvent) {
        match event {
            CompareEvent::Connected { side, database } => {
                log::info!("Connected successfully to {} MongoDB server (database {database})", side.label());
            }
            CompareEvent::CollectionsListed { side, count } => {
                log::debug!("{}: {count} collection(s) listed", side.label());
            }
            CompareEvent::CollectionSkipped {
                side,
                collection,
                reason,
            } => {
                log::info!("{}: skipping {collection} ({reason})", side.label());
            }
            CompareEvent::IndexCollected { side, identity } => {
                log::debug!("{}: {identity}", side.label());
            }
            CompareEvent::IdentityCollision { side, identity } => {
                log::warn!("{}: index {identity} listed more than once, keeping the last definition", side.label());
            }
            CompareEvent::SnapshotBuilt {
                side,
                collections,
                indexes,
            } => {
                log::info!("{}: {indexes} index(es) across {collections} collection(s)", side.label());
            }
            CompareEvent::IndexMissing { missing_from, identity } => {
                log::debug!("Check_{missing_from}: {identity}");
            }
            CompareEvent::IndexDiverged { identity } => {
                log::debug!("Check_divergent: {identity}");
            }
            CompareEvent::Closed { side } => {
                log::debug!("{} connection closed", side.label());
            }
        }
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: CompareEvent) {}
}

/// Sink that keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<CompareEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CompareEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Count events matching a predicate.
    pub fn count(&self, predicate: impl Fn(&CompareEvent) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: CompareEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
