//! End-to-end comparison of two databases.

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    collector::{CollectOptions, collect},
    config::CompareConfig,
    differ::{DiffOptions, IndexDiff, diff_with_events},
    errors::{CompareError, CompareResult},
    events::{CompareEvent, EventSink},
    mongo::MongoSource,
    snapshot::IndexSnapshot,
    source::IndexSource,
    types::Side,
};

/// Size of one side's snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideSummary {
    pub database: String,
    pub collections: usize,
    pub indexes: usize,
}

impl SideSummary {
    fn of(database: &str, snapshot: &IndexSnapshot) -> Self {
        Self {
            database: database.to_string(),
            collections: snapshot.collection_count(),
            indexes: snapshot.len(),
        }
    }
}

/// Everything a comparison run produces.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub source: SideSummary,
    pub target: SideSummary,
    #[serde(flatten)]
    pub diff: IndexDiff,
    pub elapsed_ms: u128,
    pub generated_at: DateTime<Utc>,
}

impl ComparisonReport {
    pub fn total_missing_in(&self, side: Side) -> usize {
        self.diff.missing_in(side).len()
    }

    pub fn has_differences(&self) -> bool {
        !self.diff.is_empty()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.elapsed_ms).unwrap_or(u64::MAX))
    }
}

/// Collect both snapshots concurrently and diff them.
///
/// The sources are borrowed; closing them is the caller's job.
pub async fn compare_sources<S, T>(
    source: &S,
    target: &T,
    collect_options: &CollectOptions,
    diff_options: &DiffOptions,
    events: &dyn EventSink,
) -> CompareResult<ComparisonReport>
where
    S: IndexSource,
    T: IndexSource,
{
    let started = Instant::now();

    let (source_snapshot, target_snapshot) = tokio::try_join!(
        collect(source, collect_options, events),
        collect(target, collect_options, events),
    )?;

    let diff = diff_with_events(&source_snapshot, &target_snapshot, diff_options, events);

    Ok(ComparisonReport {
        source: SideSummary::of(source.database_name(), &source_snapshot),
        target: SideSummary::of(target.database_name(), &target_snapshot),
        diff,
        elapsed_ms: started.elapsed().as_millis(),
        generated_at: Utc::now(),
    })
}

/// Run [`compare_sources`] and close both sources on every exit path.
///
/// If `shutdown` resolves first the in-flight listings are dropped and the
/// run fails with [`CompareError::Cancelled`].
pub async fn compare_and_close<S, T, F>(
    source: S,
    target: T,
    collect_options: &CollectOptions,
    diff_options: &DiffOptions,
    events: &dyn EventSink,
    shutdown: F,
) -> CompareResult<ComparisonReport>
where
    S: IndexSource,
    T: IndexSource,
    F: Future<Output = ()>,
{
    let outcome = tokio::select! {
        result = compare_sources(&source, &target, collect_options, diff_options, events) => result,
        () = shutdown => Err(CompareError::Cancelled),
    };

    close(source, events).await;
    close(target, events).await;

    outcome
}

/// Connect to both databases from `config` and compare them.
pub async fn compare_databases<F>(config: &CompareConfig, events: &dyn EventSink, shutdown: F) -> CompareResult<ComparisonReport>
where
    F: Future<Output = ()>,
{
    let timeout = config.collect.timeout;
    let (source, target) = tokio::join!(
        MongoSource::connect(&config.source_url, Side::Source, timeout),
        MongoSource::connect(&config.target_url, Side::Target, timeout),
    );
    let (source, target) = open_both(source, target, events).await?;

    compare_and_close(source, target, &config.collect, &config.diff, events, shutdown).await
}

/// Connect to one database and collect its snapshot.
pub async fn snapshot_database<F>(
    url: &str,
    side: Side,
    options: &CollectOptions,
    events: &dyn EventSink,
    shutdown: F,
) -> CompareResult<(String, IndexSnapshot)>
where
    F: Future<Output = ()>,
{
    let source = MongoSource::connect(url, side, options.timeout).await?;
    let database = source.database_name().to_string();
    events.record(CompareEvent::Connected {
        side,
        database: database.clone(),
    });
    collect_and_close(source, options, events, shutdown)
        .await
        .map(|snapshot| (database, snapshot))
}

/// Collect one source's snapshot, closing it afterwards.
pub async fn collect_and_close<S, F>(
    source: S,
    options: &CollectOptions,
    events: &dyn EventSink,
    shutdown: F,
) -> CompareResult<IndexSnapshot>
where
    S: IndexSource,
    F: Future<Output = ()>,
{
    let outcome = tokio::select! {
        result = collect(&source, options, events) => result,
        () = shutdown => Err(CompareError::Cancelled),
    };
    close(source, events).await;
    outcome
}

/// Keep both handles only if both opened; otherwise close the survivor.
async fn open_both<S, T>(
    source: CompareResult<S>,
    target: CompareResult<T>,
    events: &dyn EventSink,
) -> CompareResult<(S, T)>
where
    S: IndexSource,
    T: IndexSource,
{
    match (source, target) {
        (Ok(source), Ok(target)) => {
            for handle in [(source.side(), source.database_name()), (target.side(), target.database_name())] {
                events.record(CompareEvent::Connected {
                    side: handle.0,
                    database: handle.1.to_string(),
                });
            }
            Ok((source, target))
        }
        (Ok(source), Err(err)) => {
            close(source, events).await;
            Err(err)
        }
        (Err(err), Ok(target)) => {
            close(target, events).await;
            Err(err)
        }
        (Err(err), Err(_)) => Err(err),
    }
}

async fn close<S: IndexSource>(handle: S, events: &dyn EventSink) {
    let side = handle.side();
    handle.close().await;
    events.record(CompareEvent::Closed { side });
}
