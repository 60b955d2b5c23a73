use crate::error::ModelError;
use crate::model::{Id, Item, QueryOption, Wheres};
use serde::{Deserialize, Serialize};

/// One page of query results together with the server-reported total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryPage {
    pub items: Vec<Item>,
    pub total: u64,
}

/// Data-access contract consumed by the model runtime. Implemented once per
/// backend resource; the runtime never sees transport details.
#[async_trait::async_trait]
pub trait RestAdapter: Send + Sync {
    /// Fetch one item. Fails with [`ModelError::NotFound`] when the id does
    /// not exist upstream.
    async fn get(&self, id: &Id) -> Result<Item, ModelError>;

    /// Run a filtered, paginated list query.
    async fn query(&self, option: &QueryOption, wheres: &Wheres) -> Result<QueryPage, ModelError>;

    /// Create or update an item. With `partial` only the supplied fields are
    /// transmitted; the adapter returns the full merged record. Fails with
    /// [`ModelError::Validation`] carrying a field→message map on schema
    /// violations.
    async fn save(&self, item: &Item, partial: bool) -> Result<Item, ModelError>;

    /// Delete one item. Fails with [`ModelError::NotFound`] or
    /// [`ModelError::PermissionDenied`].
    async fn delete(&self, id: &Id) -> Result<(), ModelError>;
}
