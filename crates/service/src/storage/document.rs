//! In-memory model of the backing JSON document.
//!
//! Every top-level key of the file is an [`Entry`]: arrays become
//! collections of resources, anything else is kept verbatim as a singleton.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::ServiceError;

/// One JSON object inside a collection.
pub type Resource = Map<String, Value>;

/// Resources under one top-level key, in insertion order.
pub type Collection = Vec<Resource>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Collection,
    Singleton,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entry {
    Collection(Collection),
    Singleton(Value),
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::Collection(_) => EntryKind::Collection,
            Entry::Singleton(_) => EntryKind::Singleton,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Document {
    entries: IndexMap<String, Entry>,
}

impl Document {
    /// Parse the raw file contents. The top level must be a JSON object and
    /// every array under it must hold objects only.
    pub fn load(bytes: &[u8]) -> Result<Self, ServiceError> {
        let root: Value = serde_json::from_slice(bytes).map_err(ServiceError::parse)?;
        let Value::Object(root) = root else {
            return Err(ServiceError::parse("top-level value must be a JSON object"));
        };

        let mut entries = IndexMap::with_capacity(root.len());
        for (key, value) in root {
            let entry = match value {
                Value::Array(items) => Entry::Collection(into_collection(&key, items)?),
                other => Entry::Singleton(other),
            };
            entries.insert(key, entry);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn collection_mut(&mut self, key: &str) -> Option<&mut Collection> {
        match self.entries.get_mut(key) {
            Some(Entry::Collection(collection)) => Some(collection),
            _ => None,
        }
    }

    /// Swap in a new collection for an existing collection key, returning the
    /// previous one. Singleton and unknown keys are left untouched.
    pub fn replace_collection(&mut self, key: &str, collection: Collection) -> Option<Collection> {
        self.collection_mut(key).map(|slot| std::mem::replace(slot, collection))
    }

    /// Top-level keys with their classification, in file order.
    pub fn keys(&self) -> Vec<(String, EntryKind)> {
        self.entries.iter().map(|(k, e)| (k.clone(), e.kind())).collect()
    }

    pub fn to_value(&self) -> Value {
        let map = self
            .entries
            .iter()
            .map(|(key, entry)| {
                let value = match entry {
                    Entry::Collection(c) => Value::Array(c.iter().cloned().map(Value::Object).collect()),
                    Entry::Singleton(v) => v.clone(),
                };
                (key.clone(), value)
            })
            .collect::<Map<_, _>>();
        Value::Object(map)
    }

    pub fn to_bytes(&self, pretty: bool) -> Result<Vec<u8>, serde_json::Error> {
        if pretty {
            serde_json::to_vec_pretty(self)
        } else {
            serde_json::to_vec(self)
        }
    }
}

fn into_collection(key: &str, items: Vec<Value>) -> Result<Collection, ServiceError> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(resource) => Ok(resource),
            _ => Err(ServiceError::Parse(format!(
                "collection `{key}` contains a non-object element at index {index}"
            ))),
        })
        .collect()
}
