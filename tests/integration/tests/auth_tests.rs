//! Identity provider key tests
//!
//! Serves a JWKS document from a local HTTP server and loads it the way the
//! gateway does at startup.
//!
//! Run with: cargo test -p integration-tests --test auth_tests

use axum::{http::StatusCode, routing::get, Router};
use integration_tests::fixtures::SAMPLE_JWKS;
use std::net::SocketAddr;
use switchboard_common::{fetch_signing_keys, AppError};
use tokio::net::TcpListener;

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    addr
}

#[tokio::test]
async fn test_fetch_signing_keys() {
    let router = Router::new().route(
        "/.well-known/jwks.json",
        get(|| async { ([("content-type", "application/json")], SAMPLE_JWKS) }),
    );
    let addr = serve(router).await;

    let keys = fetch_signing_keys(&format!("http://{addr}/.well-known/jwks.json"))
        .await
        .expect("Key fetch failed");

    assert_eq!(keys.len(), 2);
    assert_eq!(keys.key_ids(), vec!["test-key-1", "test-key-2"]);
}

#[tokio::test]
async fn test_fetch_signing_keys_not_found() {
    let addr = serve(Router::new()).await;
    let url = format!("http://{addr}/missing.json");

    let err = fetch_signing_keys(&url).await.unwrap_err();

    match err {
        AppError::KeyFetch { url: failed, .. } => assert_eq!(failed, url),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_fetch_signing_keys_invalid_document() {
    let router = Router::new().route(
        "/jwks.json",
        get(|| async { (StatusCode::OK, "not a key set") }),
    );
    let addr = serve(router).await;

    let err = fetch_signing_keys(&format!("http://{addr}/jwks.json"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::KeyFetch { .. }));
}
