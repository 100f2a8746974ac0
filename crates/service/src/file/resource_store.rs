use std::sync::Arc;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::ServiceError;
use crate::resources::identifier::{self, IdGenerator, UuidGenerator, ID_FIELD};
use crate::resources::repository::ResourceRepository;
use crate::storage::document::{Entry, EntryKind, Resource};
use crate::storage::json_document_store::JsonDocumentStore;

/// Resource CRUD over the JSON file-backed document store.
#[derive(Clone)]
pub struct JsonResourceStore {
    store: Arc<JsonDocumentStore>,
    ids: Arc<dyn IdGenerator>,
}

impl JsonResourceStore {
    /// Open the backing file and serve resources from it with UUID ids.
    pub async fn open<P: Into<std::path::PathBuf>>(path: P, pretty: bool) -> Result<Arc<Self>, ServiceError> {
        let store = JsonDocumentStore::open(path, pretty).await?;
        Ok(Arc::new(Self::new(store)))
    }

    pub fn new(store: Arc<JsonDocumentStore>) -> Self {
        Self::with_id_generator(store, Arc::new(UuidGenerator))
    }

    pub fn with_id_generator(store: Arc<JsonDocumentStore>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { store, ids }
    }

    pub async fn keys(&self) -> Vec<(String, EntryKind)> {
        self.store.keys().await
    }

    pub async fn list(&self, key: &str) -> Result<Entry, ServiceError> {
        self.store.get(key).await.ok_or(ServiceError::ResourceNotFound)
    }

    pub async fn get(&self, key: &str, id: &str) -> Result<Resource, ServiceError> {
        let doc = self.store.read().await;
        match doc.get(key) {
            Some(Entry::Collection(c)) => identifier::position(c, id)
                .map(|i| c[i].clone())
                .ok_or(ServiceError::ResourceNotFound),
            _ => Err(ServiceError::ResourceNotFound),
        }
    }

    /// Append a resource; the id comes from the body when it is a free string.
    pub async fn create(&self, key: &str, body: Value) -> Result<Resource, ServiceError> {
        let body = into_object(body)?;
        let ids = Arc::clone(&self.ids);
        let created = self
            .store
            .update_collection(key, move |collection| {
                let id = identifier::resolve_new_id(collection, body.get(ID_FIELD), &*ids)?;
                let resource = identifier::with_id(Value::String(id), body);
                collection.push(resource.clone());
                Ok(resource)
            })
            .await?;
        debug!(collection = %key, id = ?created.get(ID_FIELD), "resource created");
        Ok(created)
    }

    /// Swap the resource for `body`, keeping its id.
    pub async fn replace(&self, key: &str, id: &str, body: Value) -> Result<Resource, ServiceError> {
        let body = into_object(body)?;
        if body.is_empty() {
            return Err(ServiceError::BadRequest);
        }
        let target = id.to_owned();
        self.store
            .update_collection(key, move |collection| {
                let index = identifier::position(collection, &target).ok_or(ServiceError::ResourceNotFound)?;
                let existing_id = collection[index][ID_FIELD].clone();
                let resource = identifier::with_id(existing_id, body);
                collection[index] = resource.clone();
                Ok(resource)
            })
            .await
    }

    /// Shallow merge of `body` into the resource; the id never changes.
    pub async fn patch(&self, key: &str, id: &str, body: Value) -> Result<Resource, ServiceError> {
        let body = into_object(body)?;
        if !identifier::has_effective_update(&body) {
            return Err(ServiceError::BadRequest);
        }
        let target = id.to_owned();
        self.store
            .update_collection(key, move |collection| {
                let index = identifier::position(collection, &target).ok_or(ServiceError::ResourceNotFound)?;
                let resource = &mut collection[index];
                for (field, value) in body {
                    if field != ID_FIELD {
                        resource.insert(field, value);
                    }
                }
                Ok(resource.clone())
            })
            .await
    }

    pub async fn delete(&self, key: &str, id: &str) -> Result<(), ServiceError> {
        let target = id.to_owned();
        self.store
            .update_collection(key, move |collection| {
                let index = identifier::position(collection, &target).ok_or(ServiceError::ResourceNotFound)?;
                collection.remove(index);
                Ok(())
            })
            .await?;
        debug!(collection = %key, %id, "resource deleted");
        Ok(())
    }
}

fn into_object(body: Value) -> Result<Map<String, Value>, ServiceError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ServiceError::BadRequest),
    }
}

#[async_trait::async_trait]
impl ResourceRepository for JsonResourceStore {
    async fn keys(&self) -> Vec<(String, EntryKind)> { self.keys().await }
    async fn document(&self) -> Value { self.store.snapshot().await }
    async fn list(&self, key: &str) -> Result<Entry, ServiceError> { self.list(key).await }
    async fn get(&self, key: &str, id: &str) -> Result<Resource, ServiceError> { self.get(key, id).await }
    async fn create(&self, key: &str, body: Value) -> Result<Resource, ServiceError> { self.create(key, body).await }
    async fn replace(&self, key: &str, id: &str, body: Value) -> Result<Resource, ServiceError> { self.replace(key, id, body).await }
    async fn patch(&self, key: &str, id: &str, body: Value) -> Result<Resource, ServiceError> { self.patch(key, id, body).await }
    async fn delete(&self, key: &str, id: &str) -> Result<(), ServiceError> { self.delete(key, id).await }
}
