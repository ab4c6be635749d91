//! [`IndexSource`] backed by the official MongoDB driver.

use std::time::Duration;

use futures::TryStreamExt;
use mongodb::{
    Client, Database, IndexModel,
    bson::{Bson, Document, doc},
    options::ClientOptions,
    results::{CollectionSpecification, CollectionType},
};

use crate::{
    config::validate_url,
    errors::{CompareError, CompareResult},
    source::IndexSource,
    types::{CollectionInfo, CollectionKind, IndexDefinition, IndexInfo, IndexKey, Side},
};

const APP_NAME: &str = "mongo-compare-indexes";

#[derive(Debug)]
pub struct MongoSource {
    side: Side,
    client: Client,
    database: Database,
}

impl MongoSource {
    /// Open a connection and check it with a `ping`.
    ///
    /// The database inspected is the one named in the connection string path.
    pub async fn connect(url: &str, side: Side, timeout: Duration) -> CompareResult<Self> {
        validate_url(side, url)?;

        let mut options = ClientOptions::parse(url)
            .await
            .map_err(|err| CompareError::configuration(format!("invalid {side} connection string: {err}")))?;

        let db_name = options.default_database.clone().ok_or_else(|| {
            CompareError::configuration(format!(
                "{side} connection string has no database name; use mongodb://host/<database>"
            ))
        })?;

        options.app_name.get_or_insert_with(|| APP_NAME.to_string());
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        let client = Client::with_options(options).map_err(|err| CompareError::connectivity(side, "connecting", err))?;
        let database = client.database(&db_name);

        let ping = tokio::time::timeout(timeout, database.run_command(doc! { "ping": 1 })).await;
        match ping {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                client.shutdown().await;
                return Err(CompareError::connectivity(side, "connecting", err));
            }
            Err(_) => {
                client.shutdown().await;
                return Err(CompareError::timeout(side, "connecting", timeout));
            }
        }

        Ok(Self { side, client, database })
    }
}

impl IndexSource for MongoSource {
    fn side(&self) -> Side {
        self.side
    }

    fn database_name(&self) -> &str {
        self.database.name()
    }

    async fn list_collections(&self) -> CompareResult<Vec<CollectionInfo>> {
        let cursor = self
            .database
            .list_collections()
            .await
            .map_err(|err| CompareError::connectivity(self.side, "listing collections", err))?;

        let specs: Vec<CollectionSpecification> = cursor
            .try_collect()
            .await
            .map_err(|err| CompareError::connectivity(self.side, "listing collections", err))?;

        Ok(specs.into_iter().map(collection_info).collect())
    }

    async fn list_indexes(&self, collection: &str) -> CompareResult<Vec<IndexInfo>> {
        let operation = || format!("listing indexes on {collection}");

        let cursor = self
            .database
            .collection::<Document>(collection)
            .list_indexes()
            .await
            .map_err(|err| CompareError::connectivity(self.side, operation(), err))?;

        let models: Vec<IndexModel> = cursor
            .try_collect()
            .await
            .map_err(|err| CompareError::connectivity(self.side, operation(), err))?;

        Ok(models.into_iter().map(index_info).collect())
    }

    async fn close(self) {
        self.client.shutdown().await;
    }
}

fn collection_info(spec: CollectionSpecification) -> CollectionInfo {
    let kind = match spec.collection_type {
        CollectionType::Collection => CollectionKind::Collection,
        CollectionType::View => CollectionKind::View,
        CollectionType::Timeseries => CollectionKind::Timeseries,
        #[allow(unreachable_patterns)]
        _ => CollectionKind::Other,
    };
    CollectionInfo { name: spec.name, kind }
}

fn index_info(model: IndexModel) -> IndexInfo {
    let key = definition_from_keys(&model.keys);
    // The server always names indexes; fall back to the shell's naming rule.
    let name = model
        .options
        .and_then(|options| options.name)
        .unwrap_or_else(|| default_index_name(&key));
    IndexInfo { name, key }
}

/// Convert a key document into an [`IndexDefinition`], keeping field order.
pub fn definition_from_keys(keys: &Document) -> IndexDefinition {
    keys.iter()
        .map(|(field, value)| (field.clone(), index_key(value)))
        .collect()
}

fn index_key(value: &Bson) -> IndexKey {
    match value {
        Bson::Int32(direction) => IndexKey::Direction((*direction).into()),
        Bson::Int64(direction) => IndexKey::Direction(*direction),
        Bson::Double(direction) if direction.fract() == 0.0 => IndexKey::Direction(*direction as i64),
        Bson::String(kind) => IndexKey::Kind(kind.clone()),
        other => IndexKey::Kind(other.to_string()),
    }
}

fn default_index_name(key: &IndexDefinition) -> String {
    key.fields()
        .iter()
        .map(|(field, key)| match key {
            IndexKey::Direction(direction) => format!("{field}_{direction}"),
            IndexKey::Kind(kind) => format!("{field}_{kind}"),
        })
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_from_keys_keeps_order_and_kinds() {
        let keys = doc! { "created": -1, "loc": "2dsphere", "score": 1.0, "big": 1_i64 };
        let def = definition_from_keys(&keys);

        assert_eq!(
            def,
            IndexDefinition::new()
                .with("created", -1)
                .with("loc", "2dsphere")
                .with("score", 1)
                .with("big", 1_i64)
        );
    }

    #[test]
    fn test_fractional_double_is_kept_as_text() {
        let keys = doc! { "weird": 0.5 };
        let def = definition_from_keys(&keys);
        assert!(matches!(def.fields()[0].1, IndexKey::Kind(_)));
    }

    #[test]
    fn test_default_index_name_matches_server_convention() {
        let def = IndexDefinition::new().with("email", 1).with("created", -1);
        assert_eq!(default_index_name(&def), "email_1_created_-1");
        let geo = IndexDefinition::new().with("loc", "2dsphere");
        assert_eq!(default_index_name(&geo), "loc_2dsphere");
    }

    #[tokio::test]
    async fn test_connect_rejects_url_without_database() {
        let err = MongoSource::connect("mongodb://localhost:27017", Side::Source, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("no database name"));
    }

    #[tokio::test]
    async fn test_connect_rejects_wrong_scheme() {
        let err = MongoSource::connect("postgres://localhost/app", Side::Target, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
