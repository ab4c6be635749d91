//! In-memory [`IndexSource`] for offline comparisons and tests.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::{
    errors::{CompareError, CompareResult},
    source::IndexSource,
    types::{CollectionInfo, IndexDefinition, IndexInfo, Side},
};

/// A fixed index inventory served as if it came from a live database.
#[derive(Debug, Clone)]
pub struct MemorySource {
    side: Side,
    database: String,
    collections: Vec<CollectionInfo>,
    indexes: HashMap<String, Vec<IndexInfo>>,
    failing_collections: Vec<String>,
    fail_listing: bool,
    delays: HashMap<String, Duration>,
    closed: Arc<AtomicBool>,
}

impl MemorySource {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            database: "test".to_string(),
            collections: Vec::new(),
            indexes: HashMap::new(),
            failing_collections: Vec::new(),
            fail_listing: false,
            delays: HashMap::new(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.database = name.into();
        self
    }

    /// Add a collection with the given `(index name, key shape)` pairs.
    pub fn collection<I, N>(mut self, name: impl Into<String>, indexes: I) -> Self
    where
        I: IntoIterator<Item = (N, IndexDefinition)>,
        N: Into<String>,
    {
        let name = name.into();
        let listed: Vec<IndexInfo> = indexes
            .into_iter()
            .map(|(index_name, key)| IndexInfo::new(index_name, key))
            .collect();
        self.collections.push(CollectionInfo::collection(name.clone()));
        self.indexes.entry(name).or_default().extend(listed);
        self
    }

    /// Add a view; views never have their indexes listed.
    pub fn view(mut self, name: impl Into<String>) -> Self {
        self.collections.push(CollectionInfo::view(name));
        self
    }

    /// Make `list_collections` fail.
    pub fn fail_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Make `list_indexes` fail for one collection.
    pub fn fail_on(mut self, collection: impl Into<String>) -> Self {
        self.failing_collections.push(collection.into());
        self
    }

    /// Delay `list_indexes` for one collection.
    pub fn delay_on(mut self, collection: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(collection.into(), delay);
        self
    }

    /// Handle that reports whether [`IndexSource::close`] was called.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl IndexSource for MemorySource {
    fn side(&self) -> Side {
        self.side
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    async fn list_collections(&self) -> CompareResult<Vec<CollectionInfo>> {
        if self.fail_listing {
            return Err(CompareError::connectivity(
                self.side,
                "listing collections",
                io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"),
            ));
        }
        Ok(self.collections.clone())
    }

    async fn list_indexes(&self, collection: &str) -> CompareResult<Vec<IndexInfo>> {
        if let Some(delay) = self.delays.get(collection) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_collections.iter().any(|name| name == collection) {
            return Err(CompareError::connectivity(
                self.side,
                format!("listing indexes on {collection}"),
                io::Error::new(io::ErrorKind::PermissionDenied, "not authorized"),
            ));
        }
        Ok(self.indexes.get(collection).cloned().unwrap_or_default())
    }

    async fn close(self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source_lists_inventory() {
        let source = MemorySource::new(Side::Source)
            .collection("users", [("_id_", IndexDefinition::new().with("_id", 1))])
            .view("active_users");

        let collections = source.list_collections().await.unwrap();
        assert_eq!(collections.len(), 2);
        assert_eq!(source.list_indexes("users").await.unwrap().len(), 1);
        assert!(source.list_indexes("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_source_failures_are_connectivity() {
        let source = MemorySource::new(Side::Target).fail_on("users").fail_listing();

        let err = source.list_collections().await.unwrap_err();
        assert_eq!(err.side(), Some(Side::Target));
        assert!(source.list_indexes("users").await.unwrap_err().is_connectivity());
    }

    #[tokio::test]
    async fn test_memory_source_close_sets_flag() {
        let source = MemorySource::new(Side::Source);
        let flag = source.closed_flag();
        source.close().await;
        assert!(flag.load(Ordering::SeqCst));
    }
}
