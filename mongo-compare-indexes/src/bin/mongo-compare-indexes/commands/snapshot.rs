use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Table};
use serde::Serialize;

use mongo_compare_indexes::{
    IndexDefinition, IndexSnapshot, LogSink, Settings, Side,
    config::{redact_url, validate_url},
    snapshot_database,
};

use super::{Outcome, SideArg, shutdown_signal};
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Inspect One Database",
        commands: &[
            "mongo-compare-indexes snapshot mongodb://localhost:27017/app",
            "mongo-compare-indexes snapshot --side target      # Uses TARGET_MONGO_URL or [target] url",
        ],
    },
    ExampleGroup {
        title: "Export",
        commands: &["mongo-compare-indexes --output json snapshot > indexes.json"],
    },
];

#[derive(Args, Debug, Default)]
pub struct SnapshotArgs {
    /// Connection string (defaults to the configured URL of --side)
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    /// Which configured endpoint to read when no URL is given
    #[arg(long, value_enum, default_value = "source")]
    pub side: SideArg,

    /// Path to a settings file (defaults to ./mongo-compare-indexes.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Maximum number of collections listed at once
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Timeout for each database round trip, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Include system.* collections
    #[arg(long)]
    pub include_system_collections: bool,
}

/// Serializable view of one database's index inventory.
#[derive(Debug, Serialize)]
pub struct SnapshotView<'a> {
    pub database: String,
    pub side: Side,
    pub collections: Vec<&'a str>,
    pub indexes: Vec<IndexRow<'a>>,
}

#[derive(Debug, Serialize)]
pub struct IndexRow<'a> {
    pub collection: &'a str,
    pub index_name: &'a str,
    pub index_value: &'a IndexDefinition,
}

impl<'a> SnapshotView<'a> {
    pub fn new(database: String, snapshot: &'a IndexSnapshot) -> Self {
        Self {
            database,
            side: snapshot.side(),
            collections: snapshot.collections().collect(),
            indexes: snapshot
                .sorted()
                .into_iter()
                .map(|(identity, definition)| IndexRow {
                    collection: &identity.collection,
                    index_name: &identity.index_name,
                    index_value: definition,
                })
                .collect(),
        }
    }
}

impl TableDisplay for SnapshotView<'_> {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table();
        output.add_table_header(&mut table, vec!["collection", "index_name", "index_value"]);
        for row in &self.indexes {
            table.add_row(vec![
                Cell::new(row.collection),
                Cell::new(row.index_name),
                Cell::new(row.index_value.to_string()),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!(
            "database={} collections={} indexes={}",
            self.database,
            self.collections.len(),
            self.indexes.len()
        )
    }
}

pub async fn handle_snapshot(args: SnapshotArgs, output: &OutputManager) -> Result<Outcome> {
    let side = Side::from(args.side);
    let mut settings = Settings::discover(args.config.as_deref()).context("Failed to load settings")?;
    if let Some(concurrency) = args.concurrency {
        settings.collector.concurrency = concurrency;
    }
    if let Some(timeout) = args.timeout {
        settings.collector.timeout_secs = timeout;
    }
    settings.collector.include_system_collections |= args.include_system_collections;

    let url = match args.url {
        Some(url) => url,
        None => settings.url(side)?,
    };
    validate_url(side, &url)?;
    let options = settings.collect_options()?;

    output.verbose(&format!("Reading indexes from {}", redact_url(&url)));
    output.progress("Collecting indexes");
    let collected = snapshot_database(&url, side, &options, &LogSink, shutdown_signal()).await;
    output.clear_line();
    let (database, snapshot) = collected?;

    let view = SnapshotView::new(database, &snapshot);
    if output.is_table() {
        output.heading(&format!("Indexes in {}", view.database));
        if view.indexes.is_empty() {
            output.warning("No indexes found");
        } else {
            output.display(&view)?;
        }
        output.info(&format!(
            "{} index(es) across {} collection(s)",
            view.indexes.len(),
            view.collections.len()
        ));
    } else {
        output.display(&view)?;
    }

    Ok(Outcome::Clean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_is_sorted() {
        let snapshot = IndexSnapshot::builder(Side::Source)
            .index("users", "email_1", IndexDefinition::new().with("email", 1))
            .index("orders", "_id_", IndexDefinition::new().with("_id", 1))
            .index("users", "_id_", IndexDefinition::new().with("_id", 1))
            .build();

        let view = SnapshotView::new("shop".to_string(), &snapshot);
        let names: Vec<_> = view
            .indexes
            .iter()
            .map(|row| format!("{}/{}", row.collection, row.index_name))
            .collect();

        assert_eq!(names, vec!["orders/_id_", "users/_id_", "users/email_1"]);
        assert_eq!(view.collections, vec!["orders", "users"]);
        assert_eq!(view.to_compact(), "database=shop collections=2 indexes=3");
    }

    #[test]
    fn test_view_serializes_definitions_in_order() {
        let snapshot = IndexSnapshot::builder(Side::Target)
            .index("places", "loc_2dsphere_name_1", IndexDefinition::new().with("loc", "2dsphere").with("name", 1))
            .build();

        let json = serde_json::to_value(SnapshotView::new("geo".to_string(), &snapshot)).unwrap();
        assert_eq!(json["side"], "target");
        assert_eq!(json["indexes"][0]["index_value"]["loc"], "2dsphere");
        assert_eq!(json["indexes"][0]["index_value"]["name"], 1);
    }
}
