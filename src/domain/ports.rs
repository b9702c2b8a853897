use crate::core::value::Value;
use crate::domain::model::{Query, Record};
use crate::utils::error::Result;
use async_trait::async_trait;

/// A document store that hands out collection handles by name.
pub trait DocumentStore: Send + Sync {
    type Collection: DocumentCollection;

    fn collection(&self, name: &str) -> Self::Collection;
}

#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Records matching `query`, skipping the first `skip`, at most `limit`.
    async fn find(&self, query: &Query, limit: Option<usize>, skip: usize) -> Result<Vec<Record>>;

    /// Writes the record and returns its identity. A record that already
    /// carries an `_id` replaces the stored one with that identity.
    async fn insert(&self, record: Record) -> Result<String>;
}

/// Per-attribute value transformation applied by the binder.
///
/// `convert_to` runs after decoding document text, `convert_from` before
/// encoding an attribute value.
pub trait Converter: Send + Sync {
    fn convert_to(&self, value: Value) -> Result<Value>;
    fn convert_from(&self, value: Value) -> Result<Value>;
}
