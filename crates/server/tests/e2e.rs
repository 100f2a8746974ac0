use std::net::SocketAddr;
use std::time::{Duration, Instant};

use configs::StorageConfig;
use reqwest::StatusCode as HttpStatusCode;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use uuid::Uuid;

use server::{routes, startup};

fn cors() -> tower_http::cors::CorsLayer { tower_http::cors::CorsLayer::very_permissive() }

struct TestApp {
    addr: SocketAddr,
    base_url: String,
    file: std::path::PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    server: tokio::task::JoinHandle<std::io::Result<()>>,
}

/// Isolated backing file per test run
async fn seed_file(contents: &Value) -> anyhow::Result<(std::path::PathBuf, StorageConfig)> {
    let file = std::env::temp_dir().join(format!("json_server_e2e_{}.json", Uuid::new_v4()));
    tokio::fs::write(&file, serde_json::to_vec_pretty(contents)?).await?;
    let storage = StorageConfig { file: file.to_string_lossy().into_owned(), pretty: true };
    Ok((file, storage))
}

async fn start_server(contents: Value) -> anyhow::Result<TestApp> {
    start_server_with_grace(contents, Duration::from_secs(2)).await
}

async fn start_server_with_grace(contents: Value, grace: Duration) -> anyhow::Result<TestApp> {
    let (file, storage) = seed_file(&contents).await?;
    let state = startup::build_state(&storage).await?;
    let app = routes::build_router(state, cors(), Duration::from_secs(5));

    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let base_url = format!("http://{}:{}", addr.ip(), addr.port());

    let (tx, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(startup::serve(
        listener,
        app,
        async move {
            let _ = rx.await;
        },
        grace,
    ));

    Ok(TestApp { addr, base_url, file, shutdown: Some(tx), server })
}

/// Raw HTTP/1.1 request head for a JSON body of `len` bytes; the server closes after replying.
fn post_head(addr: SocketAddr, path: &str, len: usize) -> String {
    format!(
        "POST {path} HTTP/1.1\r\nhost: {addr}\r\ncontent-type: application/json\r\ncontent-length: {len}\r\nconnection: close\r\n\r\n"
    )
}

#[tokio::test]
async fn e2e_crud_round_trip_through_the_file() -> anyhow::Result<()> {
    let mut app = start_server(json!({"books": [{"id": "1", "title": "A"}], "profile": {"name": "x"}})).await?;
    let c = reqwest::Client::new();

    let res = c.post(format!("{}/books", app.base_url)).json(&json!({"title": "B"})).send().await?;
    assert_eq!(res.status(), HttpStatusCode::CREATED);
    let created = res.json::<Value>().await?;
    let id = created["id"].as_str().unwrap_or_default().to_string();

    let res = c.patch(format!("{}/books/{}", app.base_url, id)).json(&json!({"year": 2020})).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);

    let res = c.delete(format!("{}/books/1", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NO_CONTENT);

    // The file is rewritten before each response, so it already holds every change.
    let on_disk: Value = serde_json::from_slice(&tokio::fs::read(&app.file).await?)?;
    assert_eq!(on_disk, json!({"books": [{"id": id, "title": "B", "year": 2020}], "profile": {"name": "x"}}));

    let res = c.get(format!("{}/db", app.base_url)).send().await?;
    assert_eq!(res.json::<Value>().await?, on_disk);

    if let Some(tx) = app.shutdown.take() { let _ = tx.send(()); }
    (&mut app.server).await??;
    let _ = tokio::fs::remove_file(&app.file).await;
    Ok(())
}

#[tokio::test]
async fn e2e_concurrent_creates_are_serialized() -> anyhow::Result<()> {
    let mut app = start_server(json!({"items": []})).await?;
    let c = reqwest::Client::new();

    let requests = (0..20).map(|n| {
        let c = c.clone();
        let url = format!("{}/items", app.base_url);
        async move { c.post(url).json(&json!({"n": n})).send().await }
    });
    for res in futures_join(requests).await {
        assert_eq!(res?.status(), HttpStatusCode::CREATED);
    }

    let on_disk: Value = serde_json::from_slice(&tokio::fs::read(&app.file).await?)?;
    let items = on_disk["items"].as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 20);
    let mut ids = items.iter().filter_map(|r| r["id"].as_str()).collect::<Vec<_>>();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 20);

    if let Some(tx) = app.shutdown.take() { let _ = tx.send(()); }
    (&mut app.server).await??;
    let _ = tokio::fs::remove_file(&app.file).await;
    Ok(())
}

#[tokio::test]
async fn e2e_shutdown_stops_accepting_requests() -> anyhow::Result<()> {
    let mut app = start_server(json!({"items": []})).await?;
    let res = reqwest::get(format!("{}/health", app.base_url)).await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    drop(res.text().await?);

    if let Some(tx) = app.shutdown.take() { let _ = tx.send(()); }
    tokio::time::timeout(Duration::from_secs(5), &mut app.server).await???;

    let c = reqwest::Client::builder().timeout(Duration::from_secs(2)).build()?;
    assert!(c.get(format!("{}/health", app.base_url)).send().await.is_err());
    let _ = tokio::fs::remove_file(&app.file).await;
    Ok(())
}

#[tokio::test]
async fn e2e_in_flight_request_finishes_during_shutdown() -> anyhow::Result<()> {
    let mut app = start_server_with_grace(json!({"items": []}), Duration::from_secs(5)).await?;
    let body = br#"{"title":"late"}"#;

    // Headers and half the body are in before shutdown is requested.
    let mut stream = TcpStream::connect(app.addr).await?;
    stream.write_all(post_head(app.addr, "/items", body.len()).as_bytes()).await?;
    stream.write_all(&body[..6]).await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    if let Some(tx) = app.shutdown.take() { let _ = tx.send(()); }
    tokio::time::sleep(Duration::from_millis(200)).await;
    stream.write_all(&body[6..]).await?;

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response)).await??;
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 201"), "unexpected response: {response}");

    tokio::time::timeout(Duration::from_secs(5), &mut app.server).await???;
    let on_disk: Value = serde_json::from_slice(&tokio::fs::read(&app.file).await?)?;
    assert_eq!(on_disk["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(on_disk["items"][0]["title"], "late");
    let _ = tokio::fs::remove_file(&app.file).await;
    Ok(())
}

#[tokio::test]
async fn e2e_grace_period_bounds_shutdown_and_drops_stuck_connections() -> anyhow::Result<()> {
    let (file, storage) = seed_file(&json!({"items": []})).await?;
    let grace = Duration::from_millis(300);
    let (addr_tx, addr_rx) = oneshot::channel::<SocketAddr>();
    let (tx, rx) = oneshot::channel::<()>();

    // The server gets its own runtime, as in the binary, so that tearing it
    // down after `serve` returns closes whatever connections are left.
    let server = std::thread::spawn(move || -> anyhow::Result<()> {
        let rt = tokio::runtime::Builder::new_multi_thread().worker_threads(2).enable_all().build()?;
        rt.block_on(async move {
            let state = startup::build_state(&storage).await?;
            let app = routes::build_router(state, cors(), Duration::from_secs(30));
            let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
            let _ = addr_tx.send(listener.local_addr()?);
            startup::serve(listener, app, async move { let _ = rx.await; }, grace).await?;
            Ok::<(), anyhow::Error>(())
        })
    });
    let addr = addr_rx.await?;

    // A body that never finishes keeps the request in flight forever.
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(post_head(addr, "/items", 64).as_bytes()).await?;
    stream.write_all(b"{\"title\":").await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let signalled = Instant::now();
    let _ = tx.send(());
    let joined = tokio::time::timeout(Duration::from_secs(5), tokio::task::spawn_blocking(move || server.join())).await;
    let elapsed = signalled.elapsed();
    let Ok(Ok(Ok(result))) = joined else { panic!("server did not stop after the grace period") };
    result?;
    assert!(elapsed >= Duration::from_millis(250), "returned before the grace period: {elapsed:?}");

    let mut buf = [0u8; 256];
    let read = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await;
    assert!(matches!(read, Ok(Ok(0)) | Ok(Err(_))), "stuck connection was left open: {read:?}");

    let on_disk: Value = serde_json::from_slice(&tokio::fs::read(&file).await?)?;
    assert_eq!(on_disk, json!({"items": []}));
    let _ = tokio::fs::remove_file(&file).await;
    Ok(())
}

/// Run the futures on separate tasks and collect their outputs in order.
async fn futures_join<I, F, T>(futures: I) -> Vec<T>
where
    I: IntoIterator<Item = F>,
    F: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handles = futures.into_iter().map(tokio::spawn).collect::<Vec<_>>();
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.await.expect("task panicked"));
    }
    out
}
