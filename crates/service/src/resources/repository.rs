use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ServiceError;
use crate::storage::document::{Entry, EntryKind, Resource};

/// Trait abstraction for the resource CRUD contract behind the REST routes.
///
/// Bodies arrive as raw JSON values; implementations decide what counts as a
/// usable payload and report `BadRequest` otherwise.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Top-level keys with their classification, in document order.
    async fn keys(&self) -> Vec<(String, EntryKind)>;
    /// The whole document.
    async fn document(&self) -> Value;
    /// The collection (or singleton value) stored under `key`.
    async fn list(&self, key: &str) -> Result<Entry, ServiceError>;
    async fn get(&self, key: &str, id: &str) -> Result<Resource, ServiceError>;
    async fn create(&self, key: &str, body: Value) -> Result<Resource, ServiceError>;
    async fn replace(&self, key: &str, id: &str, body: Value) -> Result<Resource, ServiceError>;
    async fn patch(&self, key: &str, id: &str, body: Value) -> Result<Resource, ServiceError>;
    async fn delete(&self, key: &str, id: &str) -> Result<(), ServiceError>;
}
