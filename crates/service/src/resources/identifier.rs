//! Identifier rules shared by every resource operation.
//!
//! - create honours a client supplied string id unless it is already taken
//!   in the same collection; otherwise a fresh id is generated
//! - replace and patch never change an existing id
//! - uniqueness is per collection

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::storage::document::Resource;

pub const ID_FIELD: &str = "id";

const MAX_GENERATE_ATTEMPTS: usize = 64;

/// Source of fresh identifiers.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random UUID v4 identifiers.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Whether a stored id value refers to the path segment `id`.
/// Ids loaded from the file may be numbers; they match their decimal form.
pub fn id_matches(value: &Value, id: &str) -> bool {
    match value {
        Value::String(s) => s == id,
        Value::Number(n) => n.to_string() == id,
        _ => false,
    }
}

pub fn has_id(resource: &Resource, id: &str) -> bool {
    resource.get(ID_FIELD).is_some_and(|v| id_matches(v, id))
}

pub fn position(collection: &[Resource], id: &str) -> Option<usize> {
    collection.iter().position(|r| has_id(r, id))
}

/// Pick the id for a resource about to be appended to `collection`.
pub fn resolve_new_id(
    collection: &[Resource],
    requested: Option<&Value>,
    ids: &dyn IdGenerator,
) -> Result<String, ServiceError> {
    if let Some(Value::String(wanted)) = requested {
        if !wanted.is_empty() && position(collection, wanted).is_none() {
            return Ok(wanted.clone());
        }
    }

    for _ in 0..MAX_GENERATE_ATTEMPTS {
        let candidate = ids.generate();
        if !candidate.is_empty() && position(collection, &candidate).is_none() {
            return Ok(candidate);
        }
    }
    Err(ServiceError::Internal("unable to generate a unique id".into()))
}

/// Build the stored form of `body`: `id` first, any `id` in the body dropped.
pub fn with_id(id: Value, body: Map<String, Value>) -> Resource {
    let mut resource = Map::with_capacity(body.len() + 1);
    resource.insert(ID_FIELD.to_string(), id);
    resource.extend(body.into_iter().filter(|(k, _)| k != ID_FIELD));
    resource
}

/// A patch body must carry at least one field besides `id`.
pub fn has_effective_update(body: &Map<String, Value>) -> bool {
    body.keys().any(|k| k != ID_FIELD)
}
