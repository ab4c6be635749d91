//! Immutable index inventory of one database.

use std::collections::{BTreeSet, HashMap};

use crate::{
    events::{CompareEvent, EventSink},
    types::{IndexDefinition, IndexIdentity, IndexInfo, Side},
};

/// Every index of one database, keyed by identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSnapshot {
    side: Side,
    collections: BTreeSet<String>,
    indexes: HashMap<IndexIdentity, IndexDefinition>,
}

impl IndexSnapshot {
    pub fn builder(side: Side) -> SnapshotBuilder<'static> {
        SnapshotBuilder::new(side, None)
    }

    /// Fold per-collection listings into one snapshot.
    ///
    /// Listings are merged in the order given. An identity produced twice is
    /// overwritten by the later listing and reported to `events`.
    pub fn from_listings<I>(side: Side, listings: I, events: &dyn EventSink) -> Self
    where
        I: IntoIterator<Item = (String, Vec<IndexInfo>)>,
    {
        let mut builder = SnapshotBuilder::new(side, Some(events));
        for (collection, indexes) in listings {
            builder.add_collection(collection.as_str());
            for index in indexes {
                builder.insert(IndexIdentity::new(collection.as_str(), index.name), index.key);
            }
        }
        builder.build()
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn get(&self, identity: &IndexIdentity) -> Option<&IndexDefinition> {
        self.indexes.get(identity)
    }

    pub fn contains(&self, identity: &IndexIdentity) -> bool {
        self.indexes.contains_key(identity)
    }

    pub fn has_collection(&self, collection: &str) -> bool {
        self.collections.contains(collection)
    }

    /// Collection names that were enumerated, sorted.
    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.collections.iter().map(String::as_str)
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IndexIdentity, &IndexDefinition)> {
        self.indexes.iter()
    }

    /// Entries sorted by identity.
    pub fn sorted(&self) -> Vec<(&IndexIdentity, &IndexDefinition)> {
        let mut entries: Vec<_> = self.indexes.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// Accumulates one snapshot. Only [`SnapshotBuilder::build`] hands out the
/// finished, read-only value.
pub struct SnapshotBuilder<'a> {
    side: Side,
    events: Option<&'a dyn EventSink>,
    collections: BTreeSet<String>,
    indexes: HashMap<IndexIdentity, IndexDefinition>,
}

impl<'a> SnapshotBuilder<'a> {
    fn new(side: Side, events: Option<&'a dyn EventSink>) -> Self {
        Self {
            side,
            events,
            collections: BTreeSet::new(),
            indexes: HashMap::new(),
        }
    }

    /// Record a collection even if it turns out to have no indexes.
    pub fn add_collection(&mut self, collection: &str) {
        if !self.collections.contains(collection) {
            self.collections.insert(collection.to_string());
        }
    }

    /// Insert an index, returning the definition it replaced.
    pub fn insert(&mut self, identity: IndexIdentity, definition: IndexDefinition) -> Option<IndexDefinition> {
        self.add_collection(&identity.collection);
        if let Some(events) = self.events {
            events.record(CompareEvent::IndexCollected {
                side: self.side,
                identity: identity.clone(),
            });
        }
        let replaced = self.indexes.insert(identity.clone(), definition);
        if replaced.is_some()
            && let Some(events) = self.events
        {
            events.record(CompareEvent::IdentityCollision {
                side: self.side,
                identity,
            });
        }
        replaced
    }

    /// Builder-style insert used when assembling fixtures.
    pub fn index(
        mut self,
        collection: impl Into<String>,
        index_name: impl Into<String>,
        definition: IndexDefinition,
    ) -> Self {
        self.insert(IndexIdentity::new(collection, index_name), definition);
        self
    }

    pub fn build(self) -> IndexSnapshot {
        if let Some(events) = self.events {
            events.record(CompareEvent::SnapshotBuilt {
                side: self.side,
                collections: self.collections.len(),
                indexes: self.indexes.len(),
            });
        }
        IndexSnapshot {
            side: self.side,
            collections: self.collections,
            indexes: self.indexes,
        }
    }
}
