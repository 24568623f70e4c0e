//! HTTP fetcher tests against an in-process server.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use specwatch_monitor::{FetchError, FetcherConfig, SpecFetcher, SpecSource};
use tokio::net::TcpListener;

async fn echo_headers(headers: HeaderMap) -> Json<Value> {
    let read = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    Json(json!({
        "openapi": "3.0.3",
        "accept": read(header::ACCEPT),
        "user_agent": read(header::USER_AGENT),
    }))
}

/// Binds to port 0, spawns the server, and returns its base URL.
async fn start_server() -> String {
    let app = Router::new()
        .route("/openapi.json", get(echo_headers))
        .route(
            "/vendor",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/vnd.oai.openapi+json;version=3.0")],
                    r#"{"z":1,"a":2}"#,
                )
            }),
        )
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/html", get(|| async { Html("<html></html>") }))
        .route(
            "/broken",
            get(|| async { ([(header::CONTENT_TYPE, "application/json")], "{not json") }),
        )
        .route("/array", get(|| async { Json(json!([1, 2, 3])) }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn fetcher() -> SpecFetcher {
    SpecFetcher::new(&FetcherConfig::new().with_user_agent("specwatch-test/1.0")).unwrap()
}

#[tokio::test]
async fn test_fetch_sends_accept_and_user_agent() {
    let base = start_server().await;
    let document = fetcher().fetch(&format!("{base}/openapi.json")).await.unwrap();

    assert_eq!(document["accept"], "application/json");
    assert_eq!(document["user_agent"], "specwatch-test/1.0");
}

#[tokio::test]
async fn test_fetch_accepts_json_suffix_and_keeps_key_order() {
    let base = start_server().await;
    let document = fetcher().fetch(&format!("{base}/vendor")).await.unwrap();

    assert_eq!(document.to_string(), r#"{"z":1,"a":2}"#);
}

#[tokio::test]
async fn test_fetch_rejects_non_success_status() {
    let base = start_server().await;
    let err = fetcher().fetch(&format!("{base}/missing")).await.unwrap_err();

    match err {
        FetchError::Status { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Not Found");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_rejects_html() {
    let base = start_server().await;
    let err = fetcher().fetch(&format!("{base}/html")).await.unwrap_err();

    assert!(matches!(
        err,
        FetchError::UnsupportedContent { ref content_type } if content_type.starts_with("text/html")
    ));
}

#[tokio::test]
async fn test_fetch_rejects_invalid_json() {
    let base = start_server().await;
    let err = fetcher().fetch(&format!("{base}/broken")).await.unwrap_err();
    assert!(matches!(err, FetchError::Parse(_)));
}

#[tokio::test]
async fn test_fetch_rejects_non_object_json() {
    let base = start_server().await;
    let err = fetcher().fetch(&format!("{base}/array")).await.unwrap_err();
    assert!(matches!(err, FetchError::NotAnObject));
}

#[tokio::test]
async fn test_fetch_unreachable_host_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = fetcher()
        .fetch(&format!("http://{addr}/openapi.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
}
