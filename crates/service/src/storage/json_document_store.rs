use std::{path::PathBuf, sync::Arc};
use serde_json::Value;
use tokio::{fs, sync::{RwLock, RwLockReadGuard}};
use tracing::{debug, error};

use crate::errors::ServiceError;
use crate::storage::document::{Collection, Document, Entry, EntryKind};
use crate::storage::persist::write_atomic;

/// JSON file-backed document store.
///
/// Holds the whole backing document in memory behind one lock. Writers keep
/// the exclusive guard while the mutated document is written back to disk,
/// so readers never see a change that has not been persisted. Mutations run
/// on a spawned task and are never abandoned half way.
pub struct JsonDocumentStore {
    inner: RwLock<Document>,
    file_path: PathBuf,
    pretty: bool,
}

impl JsonDocumentStore {
    /// Load the store from an existing backing file.
    pub async fn open<P: Into<PathBuf>>(path: P, pretty: bool) -> Result<Arc<Self>, ServiceError> {
        let file_path = path.into();
        let bytes = fs::read(&file_path)
            .await
            .map_err(|e| ServiceError::Parse(format!("unable to read {}: {e}", file_path.display())))?;
        let document = Document::load(&bytes)?;
        debug!(path = %file_path.display(), keys = document.keys().len(), "document loaded");
        Ok(Self::with_document(document, file_path, pretty))
    }

    /// Wrap an already loaded document. Nothing is written until the first mutation.
    pub fn with_document<P: Into<PathBuf>>(document: Document, path: P, pretty: bool) -> Arc<Self> {
        Arc::new(Self { inner: RwLock::new(document), file_path: path.into(), pretty })
    }

    /// Shared read access to the current document.
    pub async fn read(&self) -> RwLockReadGuard<'_, Document> {
        self.inner.read().await
    }

    /// Clone of the entry stored under `key`.
    pub async fn get(&self, key: &str) -> Option<Entry> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<(String, EntryKind)> {
        self.inner.read().await.keys()
    }

    pub async fn snapshot(&self) -> Value {
        self.inner.read().await.to_value()
    }

    /// Replace a whole collection and persist; returns the previous collection.
    pub async fn replace_collection(self: &Arc<Self>, key: &str, collection: Collection) -> Result<Collection, ServiceError> {
        self.update_collection(key, move |slot| Ok(std::mem::replace(slot, collection))).await
    }

    /// Run a read-modify-write on one collection as a single critical section.
    ///
    /// The section runs on its own task, so it completes even if the caller
    /// is dropped (request timeout, client disconnect, shutdown) once it has
    /// started. If `f` fails, or the document cannot be written back, the
    /// collection is restored before the lock is released.
    pub async fn update_collection<F, T>(self: &Arc<Self>, key: &str, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Collection) -> Result<T, ServiceError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(self);
        let key = key.to_owned();
        tokio::spawn(async move { store.apply(&key, f).await })
            .await
            .map_err(|e| ServiceError::Internal(format!("mutation task failed: {e}")))?
    }

    async fn apply<F, T>(&self, key: &str, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Collection) -> Result<T, ServiceError>,
    {
        let mut doc = self.inner.write().await;
        let collection = doc.collection_mut(key).ok_or(ServiceError::ResourceNotFound)?;
        let before = collection.clone();
        let out = match f(collection) {
            Ok(out) => out,
            Err(e) => {
                *collection = before;
                return Err(e);
            }
        };

        if let Err(e) = self.save(&doc).await {
            error!(collection = %key, path = %self.file_path.display(), error = %e, "persist failed; rolling back");
            doc.replace_collection(key, before);
            return Err(e);
        }
        Ok(out)
    }

    async fn save(&self, doc: &Document) -> Result<(), ServiceError> {
        let data = doc.to_bytes(self.pretty).map_err(|e| ServiceError::Persistence(e.to_string()))?;
        write_atomic(&self.file_path, &data)
            .await
            .map_err(|e| ServiceError::Persistence(format!("{}: {e}", self.file_path.display())))
    }
}
