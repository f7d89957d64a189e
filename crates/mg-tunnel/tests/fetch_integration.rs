//! HTTP fetcher integration tests
//!
//! Serves subscription payloads from a loopback axum server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header::USER_AGENT, HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use tempfile::TempDir;
use url::Url;

use mg_core::config::FetchConfig;
use mg_core::error::{FetchError, StoreError};
use mg_tunnel::store::{Fetcher, HttpFetcher};
use mg_tunnel::SubscriptionStore;

const PAYLOAD: &str = r#"{"outbounds":[{"protocol":"freedom"}]}"#;

/// Start a server and return its address
async fn serve() -> SocketAddr {
    let app = Router::new()
        .route("/sub1", get(|| async { PAYLOAD }))
        .route("/empty", get(|| async { "" }))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route(
            "/agent",
            get(|headers: HeaderMap| async move {
                headers
                    .get(USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                PAYLOAD
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn url(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{}{}", addr, path)).unwrap()
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(&FetchConfig {
        timeout: Duration::from_secs(2),
        user_agent: "mango-test/1.0".to_string(),
    })
    .unwrap()
}

#[tokio::test]
async fn test_fetch_returns_body() {
    let addr = serve().await;
    let body = fetcher().fetch(&url(addr, "/sub1")).await.unwrap();
    assert_eq!(body.as_ref(), PAYLOAD.as_bytes());
}

#[tokio::test]
async fn test_fetch_sends_configured_user_agent() {
    let addr = serve().await;
    let body = fetcher().fetch(&url(addr, "/agent")).await.unwrap();
    assert_eq!(body.as_ref(), b"mango-test/1.0");
}

#[tokio::test]
async fn test_fetch_rejects_error_status_and_empty_body() {
    let addr = serve().await;
    let fetcher = fetcher();

    let err = fetcher.fetch(&url(addr, "/missing")).await.unwrap_err();
    assert_eq!(err, FetchError::Status { status: 404 });

    let err = fetcher.fetch(&url(addr, "/empty")).await.unwrap_err();
    assert_eq!(err, FetchError::EmptyBody);
}

#[tokio::test]
async fn test_fetch_times_out() {
    let addr = serve().await;
    let err = fetcher().fetch(&url(addr, "/slow")).await.unwrap_err();
    assert!(matches!(err, FetchError::Request(_)));
}

#[tokio::test]
async fn test_store_downloads_over_http() {
    let addr = serve().await;
    let dir = TempDir::new().unwrap();
    let store = SubscriptionStore::open(dir.path(), Arc::new(fetcher()))
        .await
        .unwrap();

    let sub = store
        .download(url(addr, "/sub1").as_str())
        .await
        .unwrap();
    assert_eq!(sub.alias, "sub1");
    assert_eq!(store.payload(&sub.id).unwrap().as_ref(), PAYLOAD.as_bytes());

    let err = store
        .download(url(addr, "/missing").as_str())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Fetch(FetchError::Status { status: 404 })));
    assert_eq!(store.len(), 1);
}
