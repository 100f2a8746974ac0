use std::{sync::Arc, time::Duration};

use axum::{routing::get, Json, Router};
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{TraceLayer, DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, DefaultOnFailure},
};
use tracing::Level;

use common::types::Health;
use service::ResourceRepository;

pub mod resources;

/// Paths served by the router itself; document keys with these names are shadowed.
pub const RESERVED_PATHS: [&str; 2] = ["db", "health"];

#[derive(Clone)]
pub struct ServerState {
    pub resources: Arc<dyn ResourceRepository>,
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Build the full application router: index, health, `/db`, and the
/// generated resource routes for every top-level key.
pub fn build_router(state: ServerState, cors: CorsLayer, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(resources::home))
        .route("/health", get(health))
        .route("/db", get(resources::db))
        .route("/:key", get(resources::list).post(resources::create))
        .route(
            "/:key/:id",
            get(resources::read)
                .put(resources::replace)
                .patch(resources::patch)
                .delete(resources::delete),
        )
        .fallback(resources::not_found)
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(
                    DefaultOnRequest::new()
                        .level(Level::INFO),
                )
                // status and latency
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_failure(
                    DefaultOnFailure::new()
                        .level(Level::ERROR),
                )
        )
}
