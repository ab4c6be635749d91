//! Index snapshot collection.
//!
//! One collection listing, then one index listing per collection. Index
//! listings run concurrently up to [`CollectOptions::concurrency`] and are
//! merged into the snapshot on the calling task once all have finished.

use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt, stream};

use crate::{
    errors::{CompareError, CompareResult},
    events::{CompareEvent, EventSink, SkipReason},
    snapshot::IndexSnapshot,
    source::IndexSource,
    types::{CollectionInfo, CollectionKind, IndexInfo, Side},
};

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectOptions {
    /// Maximum number of index listings in flight at once.
    pub concurrency: usize,
    /// Upper bound for every single round trip.
    pub timeout: Duration,
    /// Keep `system.*` collections in the snapshot.
    pub include_system_collections: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            include_system_collections: false,
        }
    }
}

/// Build the index snapshot of the database behind `source`.
///
/// Any failed or timed out round trip aborts the whole collection, no
/// partial snapshot is returned.
pub async fn collect<S>(source: &S, options: &CollectOptions, events: &dyn EventSink) -> CompareResult<IndexSnapshot>
where
    S: IndexSource,
{
    let side = source.side();
    let listed = bounded(side, "listing collections", options.timeout, source.list_collections()).await?;
    events.record(CompareEvent::CollectionsListed {
        side,
        count: listed.len(),
    });

    let mut names = Vec::with_capacity(listed.len());
    for info in listed {
        match skip_reason(&info, options) {
            Some(reason) => events.record(CompareEvent::CollectionSkipped {
                side,
                collection: info.name,
                reason,
            }),
            None => names.push(info.name),
        }
    }

    let mut listings: Vec<(usize, String, Vec<IndexInfo>)> = stream::iter(names.into_iter().enumerate())
        .map(|(position, name)| async move {
            let operation = format!("listing indexes on {name}");
            let indexes = bounded(side, operation, options.timeout, source.list_indexes(&name)).await?;
            Ok::<_, CompareError>((position, name, indexes))
        })
        .buffer_unordered(options.concurrency.max(1))
        .try_collect()
        .await?;

    // Merge in listing order so collisions resolve the same way every run.
    listings.sort_by_key(|(position, _, _)| *position);

    Ok(IndexSnapshot::from_listings(
        side,
        listings.into_iter().map(|(_, name, indexes)| (name, indexes)),
        events,
    ))
}

fn skip_reason(info: &CollectionInfo, options: &CollectOptions) -> Option<SkipReason> {
    match info.kind {
        CollectionKind::View => Some(SkipReason::View),
        CollectionKind::Timeseries => Some(SkipReason::Timeseries),
        CollectionKind::Other => Some(SkipReason::Unsupported),
        CollectionKind::Collection if info.is_system() && !options.include_system_collections => {
            Some(SkipReason::System)
        }
        CollectionKind::Collection => None,
    }
}

async fn bounded<T, F>(
    side: Side,
    operation: impl Into<Cow<'static, str>>,
    limit: Duration,
    request: F,
) -> CompareResult<T>
where
    F: Future<Output = CompareResult<T>>,
{
    match tokio::time::timeout(limit, request).await {
        Ok(result) => result,
        Err(_) => Err(CompareError::timeout(side, operation, limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::RecordingSink,
        memory::MemorySource,
        types::{IndexDefinition, IndexIdentity},
    };

    fn id_key() -> IndexDefinition {
        IndexDefinition::new().with("_id", 1)
    }

    #[tokio::test]
    async fn test_collects_every_index_of_every_collection() {
        let source = MemorySource::new(Side::Source)
            .collection(
                "users",
                [
                    ("_id_", id_key()),
                    ("email_1", IndexDefinition::new().with("email", 1)),
                ],
            )
            .collection(
                "places",
                [
                    ("_id_", id_key()),
                    ("loc_2dsphere", IndexDefinition::new().with("loc", "2dsphere")),
                ],
            );

        let snapshot = collect(&source, &CollectOptions::default(), &RecordingSink::new())
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.collection_count(), 2);
        assert_eq!(
            snapshot.get(&IndexIdentity::new("places", "loc_2dsphere")),
            Some(&IndexDefinition::new().with("loc", "2dsphere"))
        );
    }

    #[tokio::test]
    async fn test_views_and_system_collections_are_skipped() {
        let source = MemorySource::new(Side::Source)
            .collection("users", [("_id_", id_key())])
            .collection("system.profile", [("_id_", id_key())])
            .view("active_users");
        let sink = RecordingSink::new();

        let snapshot = collect(&source, &CollectOptions::default(), &sink).await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.has_collection("system.profile"));
        assert!(!snapshot.has_collection("active_users"));
        assert_eq!(
            sink.count(|e| matches!(e, CompareEvent::CollectionSkipped { reason: SkipReason::System, .. })),
            1
        );
        assert_eq!(
            sink.count(|e| matches!(e, CompareEvent::CollectionSkipped { reason: SkipReason::View, .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_system_collections_can_be_included() {
        let source = MemorySource::new(Side::Source).collection("system.profile", [("_id_", id_key())]);
        let options = CollectOptions {
            include_system_collections: true,
            ..Default::default()
        };

        let snapshot = collect(&source, &options, &RecordingSink::new()).await.unwrap();
        assert!(snapshot.contains(&IndexIdentity::new("system.profile", "_id_")));
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_collection() {
        let source = MemorySource::new(Side::Target)
            .collection("users", [("_id_", id_key())])
            .collection("orders", [("_id_", id_key())])
            .fail_on("orders");

        let err = collect(&source, &CollectOptions::default(), &RecordingSink::new())
            .await
            .unwrap_err();

        assert!(err.is_connectivity());
        assert_eq!(err.side(), Some(Side::Target));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_listing_times_out() {
        let source = MemorySource::new(Side::Source)
            .collection("users", [("_id_", id_key())])
            .delay_on("users", Duration::from_secs(60));
        let options = CollectOptions {
            timeout: Duration::from_secs(5),
            ..Default::default()
        };

        let err = collect(&source, &options, &RecordingSink::new()).await.unwrap_err();
        assert!(err.is_connectivity());
        assert!(err.to_string().contains("listing indexes on users"));
        assert!(err.to_string().contains("timed out after 5000ms"));
    }

    #[tokio::test]
    async fn test_concurrency_does_not_change_result() {
        let mut source = MemorySource::new(Side::Source);
        for n in 0..20 {
            source = source.collection(
                format!("coll_{n}"),
                [
                    ("_id_".to_string(), id_key()),
                    (format!("field_{n}_1"), IndexDefinition::new().with(format!("field_{n}"), 1)),
                ],
            );
        }

        let sequential = CollectOptions {
            concurrency: 1,
            ..Default::default()
        };
        let wide = CollectOptions {
            concurrency: 16,
            ..Default::default()
        };

        let a = collect(&source, &sequential, &RecordingSink::new()).await.unwrap();
        let b = collect(&source, &wide, &RecordingSink::new()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_treated_as_one() {
        let source = MemorySource::new(Side::Source).collection("users", [("_id_", id_key())]);
        let options = CollectOptions {
            concurrency: 0,
            ..Default::default()
        };
        let snapshot = collect(&source, &options, &RecordingSink::new()).await.unwrap();
        assert_eq!(snapshot.len(), 1);
    }
}
