//! Set difference between two index snapshots.

use serde::Serialize;

use crate::{
    events::{CompareEvent, EventSink},
    snapshot::IndexSnapshot,
    types::{DivergentIndexRecord, IndexIdentity, MissingIndexRecord, Side},
};

/// Name MongoDB gives the mandatory primary key index.
pub const ID_INDEX_NAME: &str = "_id_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Also report identities present on both sides with different key
    /// shapes. Off by default, matching presence-only comparison.
    pub compare_keys: bool,
    /// Drop `_id_` records whose collection does not exist on the other
    /// side at all. The collection itself is still listed as missing.
    pub skip_missing_collections: bool,
}

/// Outcome of comparing a source snapshot with a target snapshot.
///
/// Every list is sorted by `(collection, index_name)` or by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexDiff {
    /// In target, absent from source.
    pub missing_in_source: Vec<MissingIndexRecord>,
    /// In source, absent from target.
    pub missing_in_target: Vec<MissingIndexRecord>,
    /// On both sides with different key shapes; empty unless requested.
    pub divergent: Vec<DivergentIndexRecord>,
    pub collections_missing_in_source: Vec<String>,
    pub collections_missing_in_target: Vec<String>,
}

impl IndexDiff {
    pub fn is_empty(&self) -> bool {
        self.missing_in_source.is_empty()
            && self.missing_in_target.is_empty()
            && self.divergent.is_empty()
            && self.collections_missing_in_source.is_empty()
            && self.collections_missing_in_target.is_empty()
    }

    pub fn missing_in(&self, side: Side) -> &[MissingIndexRecord] {
        match side {
            Side::Source => &self.missing_in_source,
            Side::Target => &self.missing_in_target,
        }
    }

    pub fn collections_missing_in(&self, side: Side) -> &[String] {
        match side {
            Side::Source => &self.collections_missing_in_source,
            Side::Target => &self.collections_missing_in_target,
        }
    }
}

/// Compare two snapshots by index identity.
pub fn diff(source: &IndexSnapshot, target: &IndexSnapshot, options: &DiffOptions) -> IndexDiff {
    diff_with_events(source, target, options, &crate::events::NullSink)
}

/// [`diff`], reporting each finding to `events`.
pub fn diff_with_events(
    source: &IndexSnapshot,
    target: &IndexSnapshot,
    options: &DiffOptions,
    events: &dyn EventSink,
) -> IndexDiff {
    let missing_in_source = missing_from(source, target, options);
    let missing_in_target = missing_from(target, source, options);

    let mut divergent = Vec::new();
    if options.compare_keys {
        for (identity, source_value) in source.iter() {
            if let Some(target_value) = target.get(identity)
                && target_value != source_value
            {
                divergent.push(DivergentIndexRecord {
                    collection: identity.collection.clone(),
                    index_name: identity.index_name.clone(),
                    source_value: source_value.clone(),
                    target_value: target_value.clone(),
                });
            }
        }
        divergent.sort_by(|a, b| (&a.collection, &a.index_name).cmp(&(&b.collection, &b.index_name)));
    }

    for record in &missing_in_source {
        events.record(CompareEvent::IndexMissing {
            missing_from: Side::Source,
            identity: record.identity(),
        });
    }
    for record in &missing_in_target {
        events.record(CompareEvent::IndexMissing {
            missing_from: Side::Target,
            identity: record.identity(),
        });
    }
    for record in &divergent {
        events.record(CompareEvent::IndexDiverged {
            identity: IndexIdentity::new(record.collection.as_str(), record.index_name.as_str()),
        });
    }

    IndexDiff {
        missing_in_source,
        missing_in_target,
        divergent,
        collections_missing_in_source: missing_collections(source, target),
        collections_missing_in_target: missing_collections(target, source),
    }
}

/// Records for every identity of `present` that `lacking` does not have.
fn missing_from(lacking: &IndexSnapshot, present: &IndexSnapshot, options: &DiffOptions) -> Vec<MissingIndexRecord> {
    let mut records: Vec<MissingIndexRecord> = present
        .iter()
        .filter(|(identity, _)| !lacking.contains(identity))
        .filter(|(identity, _)| {
            !(options.skip_missing_collections
                && identity.index_name == ID_INDEX_NAME
                && !lacking.has_collection(&identity.collection))
        })
        .map(|(identity, definition)| MissingIndexRecord::new(identity, definition))
        .collect();
    records.sort_by(|a, b| (&a.collection, &a.index_name).cmp(&(&b.collection, &b.index_name)));
    records
}

fn missing_collections(lacking: &IndexSnapshot, present: &IndexSnapshot) -> Vec<String> {
    present
        .collections()
        .filter(|name| !lacking.has_collection(name))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::snapshot::SnapshotBuilder;
    use crate::types::IndexDefinition;

    fn key(field: &str) -> IndexDefinition {
        IndexDefinition::new().with(field, 1)
    }

    fn users(side: Side) -> SnapshotBuilder<'static> {
        IndexSnapshot::builder(side).index("users", "_id_", key("_id"))
    }

    #[test]
    fn test_index_missing_in_target() {
        let source = users(Side::Source).index("users", "email_1", key("email")).build();
        let target = users(Side::Target).build();

        let result = diff(&source, &target, &DiffOptions::default());

        assert!(result.missing_in_source.is_empty());
        assert_eq!(
            result.missing_in_target,
            vec![MissingIndexRecord {
                collection: "users".to_string(),
                index_name: "email_1".to_string(),
                index_value: key("email"),
            }]
        );
    }

    #[test]
    fn test_identical_snapshots_have_no_differences() {
        let source = users(Side::Source).index("users", "email_1", key("email")).build();
        let target = users(Side::Target).index("users", "email_1", key("email")).build();

        let result = diff(&source, &target, &DiffOptions::default());
        assert!(result.is_empty());
    }

    #[test]
    fn test_collection_absent_from_target() {
        let source = users(Side::Source)
            .index("orders", "_id_", key("_id"))
            .index("orders", "customer_1", key("customer"))
            .build();
        let target = users(Side::Target).build();

        let result = diff(&source, &target, &DiffOptions::default());

        assert!(result.missing_in_source.is_empty());
        let names: Vec<_> = result
            .missing_in_target
            .iter()
            .map(|r| (r.collection.as_str(), r.index_name.as_str()))
            .collect();
        assert_eq!(names, vec![("orders", "_id_"), ("orders", "customer_1")]);
        assert_eq!(result.collections_missing_in_target, vec!["orders".to_string()]);
        assert!(result.collections_missing_in_source.is_empty());
    }

    #[test]
    fn test_skip_missing_collections_drops_id_index_only() {
        let source = users(Side::Source)
            .index("orders", "_id_", key("_id"))
            .index("orders", "customer_1", key("customer"))
            .build();
        let target = users(Side::Target).build();
        let options = DiffOptions {
            skip_missing_collections: true,
            ..Default::default()
        };

        let result = diff(&source, &target, &options);

        assert_eq!(result.missing_in_target.len(), 1);
        assert_eq!(result.missing_in_target[0].index_name, "customer_1");
        assert_eq!(result.collections_missing_in_target, vec!["orders".to_string()]);
    }

    #[test]
    fn test_skip_missing_collections_keeps_id_index_of_existing_collection() {
        let source = users(Side::Source).build();
        let target = IndexSnapshot::builder(Side::Target)
            .index("users", "email_1", key("email"))
            .build();
        let options = DiffOptions {
            skip_missing_collections: true,
            ..Default::default()
        };

        let result = diff(&source, &target, &options);
        assert_eq!(result.missing_in_target.len(), 1);
        assert_eq!(result.missing_in_target[0].index_name, "_id_");
    }

    #[test]
    fn test_different_key_shape_is_not_divergent_by_default() {
        let source = users(Side::Source).index("users", "email_1", key("email")).build();
        let target = users(Side::Target)
            .index("users", "email_1", IndexDefinition::new().with("email", -1))
            .build();

        let result = diff(&source, &target, &DiffOptions::default());
        assert!(result.is_empty());
    }

    #[test]
    fn test_compare_keys_reports_divergent_definitions() {
        let source = users(Side::Source).index("users", "email_1", key("email")).build();
        let target = users(Side::Target)
            .index("users", "email_1", IndexDefinition::new().with("email", -1))
            .build();
        let options = DiffOptions {
            compare_keys: true,
            ..Default::default()
        };

        let result = diff(&source, &target, &options);

        assert!(result.missing_in_source.is_empty());
        assert!(result.missing_in_target.is_empty());
        assert_eq!(
            result.divergent,
            vec![DivergentIndexRecord {
                collection: "users".to_string(),
                index_name: "email_1".to_string(),
                source_value: key("email"),
                target_value: IndexDefinition::new().with("email", -1),
            }]
        );
    }

    #[test]
    fn test_separator_in_names_survives_the_diff() {
        let source = IndexSnapshot::builder(Side::Source)
            .index("a::b", "c", key("x"))
            .build();
        let target = IndexSnapshot::builder(Side::Target)
            .index("a", "b::c", key("x"))
            .build();

        let result = diff(&source, &target, &DiffOptions::default());

        assert_eq!(result.missing_in_target.len(), 1);
        assert_eq!(result.missing_in_target[0].collection, "a::b");
        assert_eq!(result.missing_in_target[0].index_name, "c");
        assert_eq!(result.missing_in_source.len(), 1);
        assert_eq!(result.missing_in_source[0].collection, "a");
        assert_eq!(result.missing_in_source[0].index_name, "b::c");
    }

    #[test]
    fn test_findings_are_reported_as_events() {
        let source = users(Side::Source).index("users", "email_1", key("email")).build();
        let target = users(Side::Target).index("users", "name_1", key("name")).build();
        let sink = RecordingSink::new();

        diff_with_events(&source, &target, &DiffOptions::default(), &sink);

        assert_eq!(
            sink.events(),
            vec![
                CompareEvent::IndexMissing {
                    missing_from: Side::Source,
                    identity: IndexIdentity::new("users", "name_1"),
                },
                CompareEvent::IndexMissing {
                    missing_from: Side::Target,
                    identity: IndexIdentity::new("users", "email_1"),
                },
            ]
        );
    }

    #[test]
    fn test_missing_in_accessors() {
        let source = users(Side::Source).build();
        let target = users(Side::Target).index("logs", "_id_", key("_id")).build();

        let result = diff(&source, &target, &DiffOptions::default());
        assert_eq!(result.missing_in(Side::Source).len(), 1);
        assert!(result.missing_in(Side::Target).is_empty());
        assert_eq!(result.collections_missing_in(Side::Source), ["logs".to_string()]);
    }
}
