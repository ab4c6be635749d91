//! Shared value types: identities, key shapes and report records.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Which database of the comparison a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::Source => Side::Target,
            Side::Target => Side::Source,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Source => "Source",
            Side::Target => "Target",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Target => write!(f, "target"),
        }
    }
}

/// Identity of one index within one database.
///
/// Ordering is by collection, then index name, which is also the order the
/// differ reports records in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexIdentity {
    pub collection: String,
    pub index_name: String,
}

impl IndexIdentity {
    pub fn new(collection: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            index_name: index_name.into(),
        }
    }
}

impl fmt::Display for IndexIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.collection, self.index_name)
    }
}

/// Value attached to one field of an index key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    /// Ascending (`1`) or descending (`-1`) ordering.
    Direction(i64),
    /// Special index kind such as `"2dsphere"`, `"text"` or `"hashed"`.
    Kind(String),
}

impl From<i32> for IndexKey {
    fn from(value: i32) -> Self {
        IndexKey::Direction(value.into())
    }
}

impl From<i64> for IndexKey {
    fn from(value: i64) -> Self {
        IndexKey::Direction(value)
    }
}

impl From<&str> for IndexKey {
    fn from(value: &str) -> Self {
        IndexKey::Kind(value.to_string())
    }
}

impl From<String> for IndexKey {
    fn from(value: String) -> Self {
        IndexKey::Kind(value)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Direction(direction) => write!(f, "{direction}"),
            IndexKey::Kind(kind) => write!(f, "\"{kind}\""),
        }
    }
}

impl Serialize for IndexKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            IndexKey::Direction(direction) => serializer.serialize_i64(*direction),
            IndexKey::Kind(kind) => serializer.serialize_str(kind),
        }
    }
}

/// Key shape of an index: ordered `field -> key` pairs.
///
/// Equality is structural and order-sensitive, `{a: 1, b: 1}` and
/// `{b: 1, a: 1}` are different indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IndexDefinition {
    fields: Vec<(String, IndexKey)>,
}

impl IndexDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, keeping declaration order.
    pub fn with(mut self, field: impl Into<String>, key: impl Into<IndexKey>) -> Self {
        self.fields.push((field.into(), key.into()));
        self
    }

    pub fn fields(&self) -> &[(String, IndexKey)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl<F, K> FromIterator<(F, K)> for IndexDefinition
where
    F: Into<String>,
    K: Into<IndexKey>,
{
    fn from_iter<I: IntoIterator<Item = (F, K)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(field, key)| (field.into(), key.into()))
                .collect(),
        }
    }
}

impl fmt::Display for IndexDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            return write!(f, "{{}}");
        }
        write!(f, "{{ ")?;
        for (position, (field, key)) in self.fields.iter().enumerate() {
            if position > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{field}: {key}")?;
        }
        write!(f, " }}")
    }
}

impl Serialize for IndexDefinition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, key) in &self.fields {
            map.serialize_entry(field, key)?;
        }
        map.end()
    }
}

/// Kind of a namespace reported by the collection listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Collection,
    View,
    Timeseries,
    Other,
}

/// One entry of a collection listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub kind: CollectionKind,
}

impl CollectionInfo {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::Collection,
        }
    }

    pub fn view(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::View,
        }
    }

    /// Server-managed namespaces such as `system.profile` or `system.views`.
    pub fn is_system(&self) -> bool {
        self.name.starts_with("system.")
    }
}

/// One entry of an index listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub key: IndexDefinition,
}

impl IndexInfo {
    pub fn new(name: impl Into<String>, key: IndexDefinition) -> Self {
        Self {
            name: name.into(),
            key,
        }
    }
}

/// An index present on one side and absent on the other.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MissingIndexRecord {
    pub collection: String,
    pub index_name: String,
    pub index_value: IndexDefinition,
}

impl MissingIndexRecord {
    pub fn new(identity: &IndexIdentity, definition: &IndexDefinition) -> Self {
        Self {
            collection: identity.collection.clone(),
            index_name: identity.index_name.clone(),
            index_value: definition.clone(),
        }
    }

    pub fn identity(&self) -> IndexIdentity {
        IndexIdentity::new(self.collection.as_str(), self.index_name.as_str())
    }
}

/// An index present on both sides with different key shapes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DivergentIndexRecord {
    pub collection: String,
    pub index_name: String,
    pub source_value: IndexDefinition,
    pub target_value: IndexDefinition,
}
