use crate::{
    errors::CompareResult,
    types::{CollectionInfo, IndexInfo, Side},
};

/// Read-only access to the collections and indexes of one database.
///
/// Implementations map their own failures to
/// [`CompareError::Connectivity`](crate::CompareError::Connectivity) tagged
/// with [`IndexSource::side`].
#[allow(async_fn_in_trait)]
pub trait IndexSource {
    /// Side of the comparison this handle was opened for.
    fn side(&self) -> Side;

    /// Name of the database being inspected.
    fn database_name(&self) -> &str;

    async fn list_collections(&self) -> CompareResult<Vec<CollectionInfo>>;

    async fn list_indexes(&self, collection: &str) -> CompareResult<Vec<IndexInfo>>;

    /// Release the underlying connection.
    async fn close(self)
    where
        Self: Sized;
}
