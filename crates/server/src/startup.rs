use std::{future::{Future, IntoFuture}, sync::Arc, time::Duration};

use axum::Router;
use configs::{AppConfig, StorageConfig};
use service::{storage::document::EntryKind, JsonResourceStore, ResourceRepository};
use tokio::{net::TcpListener, sync::oneshot};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::errors::StartupError;
use crate::routes::{self, ServerState, RESERVED_PATHS};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Open the backing file and wrap it as router state.
pub async fn build_state(storage: &StorageConfig) -> Result<ServerState, StartupError> {
    let store = JsonResourceStore::open(&storage.file, storage.pretty).await?;
    let resources: Arc<dyn ResourceRepository> = store;
    Ok(ServerState { resources })
}

/// Print the generated routes, the way the CLI greets its user.
fn announce(addr: &str, keys: &[(String, EntryKind)]) {
    println!("JSON Server successfully running\n");
    println!("Resources");
    for (key, kind) in keys {
        if RESERVED_PATHS.contains(&key.as_str()) {
            warn!(resource = %key, "resource name collides with a built-in route and is not reachable");
        }
        info!(resource = %key, kind = ?kind, "resource available");
        println!("http://{addr}/{key}");
    }
    println!("http://{addr}/db\n");
    println!("Home");
    println!("http://{addr}\n");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!(event = "shutdown_signal", "received Ctrl+C, shutting down");
}

/// Serve `app` until `shutdown` resolves, then give in-flight requests up to
/// `grace` to finish before dropping the remaining connections.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F, grace: Duration) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            let _ = signalled_tx.send(());
        })
        .into_future();

    let grace_elapsed = async move {
        match signalled_rx.await {
            Ok(()) => tokio::time::sleep(grace).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        res = server => res,
        // Connections still open are dropped along with the runtime.
        _ = grace_elapsed => {
            warn!(grace_ms = grace.as_millis() as u64, "grace period elapsed; abandoning remaining connections");
            Ok(())
        }
    }
}

/// Public entry: open the document, build the app and run the HTTP server
pub async fn run(cfg: AppConfig) -> Result<(), StartupError> {
    let state = build_state(&cfg.storage).await?;
    let keys = state.resources.keys().await;
    info!(file = %cfg.storage.file, resources = keys.len(), "document loaded");

    let app = routes::build_router(state, build_cors(), Duration::from_secs(cfg.server.request_timeout_secs));

    let addr = cfg.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind { addr: addr.clone(), source })?;
    info!(%addr, "starting json server");
    announce(&addr, &keys);

    serve(listener, app, shutdown_signal(), Duration::from_secs(cfg.server.shutdown_grace_secs))
        .await
        .map_err(|e| StartupError::Any(e.into()))?;
    info!(event = "stop", "gracefully shut down server");
    Ok(())
}
