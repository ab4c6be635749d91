use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color as TableColor, Table};

use mongo_compare_indexes::{
    ComparisonReport, LogSink, MissingIndexRecord, Settings, Side, compare_databases,
    config::{SOURCE_URL_ENV, TARGET_URL_ENV, redact_url},
};

use super::{Outcome, shutdown_signal};
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Compare Two Databases",
        commands: &[
            "mongo-compare-indexes run mongodb://prod:27017/app mongodb://replica:27017/app",
            "SOURCE_MONGO_URL=... TARGET_MONGO_URL=... mongo-compare-indexes run",
            "mongo-compare-indexes run --config ./mongo-compare-indexes.toml",
        ],
    },
    ExampleGroup {
        title: "Stricter Checks",
        commands: &[
            "mongo-compare-indexes run --compare-keys           # Also report indexes whose keys differ",
            "mongo-compare-indexes run --skip-missing-collections  # Hide _id_ of absent collections",
            "mongo-compare-indexes run --fail-on-diff           # Exit with status 2 on differences",
        ],
    },
    ExampleGroup {
        title: "Scripting",
        commands: &[
            "mongo-compare-indexes --output json run | jq '.missing_in_target'",
            "mongo-compare-indexes --output compact run",
        ],
    },
];

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Connection string of the reference database
    #[arg(env = SOURCE_URL_ENV, hide_env_values = true, value_name = "SOURCE_URL")]
    pub source_url: Option<String>,

    /// Connection string of the database to verify
    #[arg(env = TARGET_URL_ENV, hide_env_values = true, value_name = "TARGET_URL")]
    pub target_url: Option<String>,

    /// Path to a settings file (defaults to ./mongo-compare-indexes.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Maximum number of collections listed at once per database
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Timeout for each database round trip, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Include system.* collections
    #[arg(long)]
    pub include_system_collections: bool,

    /// Also report indexes whose key definitions differ
    #[arg(long)]
    pub compare_keys: bool,

    /// Skip _id indexes that indicate missing collections
    #[arg(long)]
    pub skip_missing_collections: bool,

    /// Exit with status 2 when differences are found
    #[arg(long)]
    pub fail_on_diff: bool,
}

impl RunArgs {
    /// Layer command-line values over the settings file.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(url) = &self.source_url {
            settings.source.url = Some(url.clone());
        }
        if let Some(url) = &self.target_url {
            settings.target.url = Some(url.clone());
        }
        if let Some(concurrency) = self.concurrency {
            settings.collector.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            settings.collector.timeout_secs = timeout;
        }
        settings.collector.include_system_collections |= self.include_system_collections;
        settings.diff.compare_keys |= self.compare_keys;
        settings.diff.skip_missing_collections |= self.skip_missing_collections;
    }
}

pub async fn handle_run(args: RunArgs, output: &OutputManager) -> Result<Outcome> {
    let mut settings = Settings::discover(args.config.as_deref()).context("Failed to load settings")?;
    args.apply(&mut settings);
    let config = settings.resolve()?;

    output.verbose(&format!("Source: {}", redact_url(&config.source_url)));
    output.verbose(&format!("Target: {}", redact_url(&config.target_url)));
    output.verbose(&format!(
        "Listing up to {} collection(s) at once, {}s timeout",
        config.collect.concurrency,
        config.collect.timeout.as_secs()
    ));

    output.progress("Comparing indexes");
    let report = compare_databases(&config, &LogSink, shutdown_signal()).await;
    output.clear_line();
    let report = report?;

    if output.is_table() {
        render_report(&report, config.diff.compare_keys, output);
    } else {
        output.display(&report)?;
    }

    if args.fail_on_diff && report.has_differences() {
        Ok(Outcome::DifferencesFound)
    } else {
        Ok(Outcome::Clean)
    }
}

fn render_report(report: &ComparisonReport, compare_keys: bool, output: &OutputManager) {
    output.heading("Index Comparison");
    output.key_value(
        "Source",
        &format!(
            "{} ({} collections, {} indexes)",
            report.source.database, report.source.collections, report.source.indexes
        ),
    );
    output.key_value(
        "Target",
        &format!(
            "{} ({} collections, {} indexes)",
            report.target.database, report.target.collections, report.target.indexes
        ),
    );

    for side in [Side::Source, Side::Target] {
        let missing = report.diff.missing_in(side);
        output.heading(&format!("Missing in {side}"));
        if missing.is_empty() {
            output.success(&format!("No indexes missing in {side}"));
        } else {
            output.table(&missing_table(missing, output));
        }
        output.info(&format!("Total missing indexes in {side}: {}", missing.len()));
    }

    if compare_keys {
        output.heading("Divergent indexes");
        if report.diff.divergent.is_empty() {
            output.success("All shared indexes have identical keys");
        } else {
            let mut table = output.create_table();
            output.add_table_header(&mut table, vec!["collection", "index_name", "source_value", "target_value"]);
            for record in &report.diff.divergent {
                table.add_row(vec![
                    Cell::new(&record.collection),
                    Cell::new(&record.index_name),
                    output.colored_cell(&record.source_value, TableColor::Green),
                    output.colored_cell(&record.target_value, TableColor::Red),
                ]);
            }
            output.table(&table);
            output.info(&format!("Total divergent indexes: {}", report.diff.divergent.len()));
        }
    }

    for side in [Side::Source, Side::Target] {
        let collections = report.diff.collections_missing_in(side);
        if !collections.is_empty() {
            output.warning(&format!("{} collection(s) missing in {side}:", collections.len()));
            for collection in collections {
                output.bullet(collection);
            }
        }
    }

    if report.has_differences() {
        output.warning("Index definitions differ between source and target");
    } else {
        output.success("Source and target have the same indexes");
    }
    output.timing(&format!("Completed in {}ms", report.elapsed_ms));
}

fn missing_table(records: &[MissingIndexRecord], output: &OutputManager) -> Table {
    let mut table = output.create_table();
    output.add_table_header(&mut table, vec!["collection", "index_name", "index_value"]);
    for record in records {
        table.add_row(vec![
            Cell::new(&record.collection),
            Cell::new(&record.index_name),
            Cell::new(record.index_value.to_string()),
        ]);
    }
    table
}

impl TableDisplay for ComparisonReport {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table();
        output.add_table_header(&mut table, vec!["side", "database", "collections", "indexes", "missing"]);
        for (side, summary) in [(Side::Source, &self.source), (Side::Target, &self.target)] {
            table.add_row(vec![
                Cell::new(side.label()),
                Cell::new(&summary.database),
                Cell::new(summary.collections),
                Cell::new(summary.indexes),
                Cell::new(self.total_missing_in(side)),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!(
            "source={} target={} missing_in_source={} missing_in_target={} divergent={} elapsed_ms={}",
            self.source.database,
            self.target.database,
            self.total_missing_in(Side::Source),
            self.total_missing_in(Side::Target),
            self.diff.divergent.len(),
            self.elapsed_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongo_compare_indexes::{IndexDefinition, IndexDiff, IndexIdentity, SideSummary};

    fn report() -> ComparisonReport {
        let email = IndexDefinition::new().with("email", 1);
        ComparisonReport {
            source: SideSummary {
                database: "shop".to_string(),
                collections: 1,
                indexes: 2,
            },
            target: SideSummary {
                database: "shop_copy".to_string(),
                collections: 1,
                indexes: 1,
            },
            diff: IndexDiff {
                missing_in_target: vec![MissingIndexRecord::new(&IndexIdentity::new("users", "email_1"), &email)],
                ..Default::default()
            },
            elapsed_ms: 12,
            generated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_cli_values_override_settings() {
        let mut settings = Settings::default();
        settings.source.url = Some("mongodb://from-file/app".to_string());
        settings.diff.compare_keys = true;

        let args = RunArgs {
            source_url: Some("mongodb://from-cli/app".to_string()),
            timeout: Some(5),
            skip_missing_collections: true,
            ..Default::default()
        };
        args.apply(&mut settings);

        assert_eq!(settings.source.url.as_deref(), Some("mongodb://from-cli/app"));
        assert_eq!(settings.target.url, None);
        assert_eq!(settings.collector.timeout_secs, 5);
        assert_eq!(settings.collector.concurrency, 8);
        assert!(settings.diff.compare_keys);
        assert!(settings.diff.skip_missing_collections);
    }

    #[test]
    fn test_compact_report() {
        assert_eq!(
            report().to_compact(),
            "source=shop target=shop_copy missing_in_source=0 missing_in_target=1 divergent=0 elapsed_ms=12"
        );
    }

    #[test]
    fn test_missing_table_columns() {
        let output = OutputManager::new(crate::output::GlobalOptions {
            no_color: true,
            ..Default::default()
        });
        let rendered = missing_table(report().diff.missing_in(Side::Target), &output).to_string();

        assert!(rendered.contains("index_value"));
        assert!(rendered.contains("email_1"));
        assert!(rendered.contains("{ email: 1 }"));
    }
}
