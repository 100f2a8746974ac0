use axum::{body::Bytes, extract::{Path, State}, http::StatusCode, Json};
use common::types::ResourceIndex;
use serde_json::Value;
use service::{storage::document::{Entry, EntryKind, Resource}, ServiceError};
use tracing::debug;

use crate::errors::ApiError;
use crate::routes::ServerState;

/// Parse a request body. Anything that is not valid JSON is a bad request;
/// whether the value is a usable payload is up to the operation.
fn parse_body(body: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "rejecting unparsable body");
        ApiError(ServiceError::BadRequest)
    })
}

/// Index of the generated routes
pub async fn home(State(state): State<ServerState>) -> Json<ResourceIndex> {
    let mut index = ResourceIndex { db: "/db".into(), ..Default::default() };
    for (key, kind) in state.resources.keys().await {
        match kind {
            EntryKind::Collection => index.collections.push(format!("/{key}")),
            EntryKind::Singleton => index.singletons.push(format!("/{key}")),
        }
    }
    Json(index)
}

/// Whole backing document
pub async fn db(State(state): State<ServerState>) -> Json<Value> {
    Json(state.resources.document().await)
}

/// List a collection, or read a singleton
pub async fn list(
    State(state): State<ServerState>,
    Path(key): Path<String>,
) -> Result<Json<Entry>, ApiError> {
    Ok(Json(state.resources.list(&key).await?))
}

pub async fn read(
    State(state): State<ServerState>,
    Path((key, id)): Path<(String, String)>,
) -> Result<Json<Resource>, ApiError> {
    Ok(Json(state.resources.get(&key, &id).await?))
}

pub async fn create(
    State(state): State<ServerState>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Resource>), ApiError> {
    let body = parse_body(&body)?;
    let created = state.resources.create(&key, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Full replace, PUT
pub async fn replace(
    State(state): State<ServerState>,
    Path((key, id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<Resource>, ApiError> {
    let body = parse_body(&body)?;
    Ok(Json(state.resources.replace(&key, &id, body).await?))
}

/// Partial update, PATCH
pub async fn patch(
    State(state): State<ServerState>,
    Path((key, id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<Resource>, ApiError> {
    let body = parse_body(&body)?;
    Ok(Json(state.resources.patch(&key, &id, body).await?))
}

pub async fn delete(
    State(state): State<ServerState>,
    Path((key, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.resources.delete(&key, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn not_found() -> ApiError {
    ApiError(ServiceError::ResourceNotFound)
}
