// tests/http_page_source.rs
//
// The HTTP page source against a local axum server on 127.0.0.1:0 that
// serves a fixed collection in pages.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::{net::TcpListener, sync::oneshot};

use unidream_catalog::{fetch_collection, Collection, FetchOptions, HttpPageSource};

#[derive(Clone)]
struct Fake {
    total: usize,
    fail_page: Option<usize>,
    garbage_page: Option<usize>,
    hits: Arc<AtomicUsize>,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl Fake {
    fn new(total: usize) -> Self {
        Self {
            total,
            fail_page: None,
            garbage_page: None,
            hits: Arc::new(AtomicUsize::new(0)),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

async fn pages(State(fake): State<Fake>, Query(q): Query<HashMap<String, String>>) -> Response {
    fake.hits.fetch_add(1, Ordering::SeqCst);
    fake.queries.lock().unwrap().push(q.clone());

    let page: usize = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let limit: usize = q.get("limit").and_then(|p| p.parse().ok()).unwrap_or(20);

    if fake.fail_page == Some(page) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if fake.garbage_page == Some(page) {
        return (StatusCode::OK, "<html>oops</html>").into_response();
    }

    let start = (page - 1) * limit;
    let items: Vec<_> = (start..(start + limit).min(fake.total))
        .map(|i| json!({ "id": i, "nombre": format!("Universidad {i}"), "tipo": "Pública" }))
        .collect();
    Json(items).into_response()
}

async fn start(fake: Fake) -> (String, oneshot::Sender<()>) {
    let app = Router::new()
        .route("/careers/", get(pages))
        .route("/universities", get(pages))
        .with_state(fake);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake api");
    let addr = listener.local_addr().expect("fake api addr");
    let (tx, rx) = oneshot::channel();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = rx.await;
    });
    tokio::spawn(async move {
        let _ = server.await;
    });
    (format!("http://{addr}"), tx)
}

#[tokio::test]
async fn http_fetch_thirteen_records_in_three_requests() {
    let fake = Fake::new(13);
    let (base, stop) = start(fake.clone()).await;

    let src = HttpPageSource::new(base);
    let opts = FetchOptions::default().with_page_size(6);
    let out = fetch_collection(&src, Collection::Universities, &opts).await;

    assert_eq!(out.records.len(), 13);
    assert_eq!(fake.hits.load(Ordering::SeqCst), 3);
    let q = fake.queries.lock().unwrap().clone();
    assert_eq!(q[0].get("page").map(String::as_str), Some("1"));
    assert_eq!(q[2].get("page").map(String::as_str), Some("3"));
    assert!(q.iter().all(|m| m.get("limit").map(String::as_str) == Some("6")));
    let _ = stop.send(());
}

#[tokio::test]
async fn http_careers_path_keeps_trailing_slash_and_filters() {
    let fake = Fake::new(2);
    let (base, stop) = start(fake.clone()).await;

    let src = HttpPageSource::new(format!("{base}/"));
    let mut opts = FetchOptions::default();
    opts.filters = vec![("area".into(), "Ingeniería".into())];
    let out = fetch_collection(&src, Collection::Careers, &opts).await;

    assert_eq!(out.records.len(), 2);
    let q = fake.queries.lock().unwrap().clone();
    assert_eq!(q.len(), 1);
    assert_eq!(q[0].get("area").map(String::as_str), Some("Ingeniería"));
    let _ = stop.send(());
}

#[tokio::test]
async fn http_server_error_on_first_page_gives_empty_result() {
    let mut fake = Fake::new(40);
    fake.fail_page = Some(1);
    let (base, stop) = start(fake.clone()).await;

    let out = fetch_collection(
        &HttpPageSource::new(base),
        Collection::Universities,
        &FetchOptions::default(),
    )
    .await;

    assert!(out.records.is_empty());
    assert!(out.report.aborted);
    assert_eq!(fake.hits.load(Ordering::SeqCst), 1);
    let _ = stop.send(());
}

#[tokio::test]
async fn http_non_json_page_ends_without_error() {
    let mut fake = Fake::new(50);
    fake.garbage_page = Some(2);
    let (base, stop) = start(fake.clone()).await;

    let out = fetch_collection(
        &HttpPageSource::new(base),
        Collection::Universities,
        &FetchOptions::default(),
    )
    .await;

    assert_eq!(out.records.len(), 20);
    assert!(!out.report.aborted);
    assert_eq!(fake.hits.load(Ordering::SeqCst), 2);
    let _ = stop.send(());
}

#[tokio::test]
async fn http_unreachable_host_aborts_quietly() {
    // bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let out = fetch_collection(
        &HttpPageSource::new(format!("http://{addr}")),
        Collection::Careers,
        &FetchOptions::default(),
    )
    .await;
    assert!(out.records.is_empty());
    assert!(out.report.aborted);
    assert_eq!(out.report.requests, 1);
}
