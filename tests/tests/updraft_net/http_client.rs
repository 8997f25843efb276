use std::time::Duration;

use axum::{
    Router,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use rstest::*;
use updraft::net::{Headers, HttpClient, Net, NetError, NetExt, NetOptions, RetryPolicy};
use updraft_test_utils::TestHttpServer;

async fn echo_platform(headers: HeaderMap) -> impl IntoResponse {
    let platform = headers
        .get("expo-platform")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none")
        .to_string();
    ([("x-seen-platform", platform)], "ok")
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "missing")
}

async fn no_content() -> impl IntoResponse {
    ([("expo-protocol-version", "1")], StatusCode::NO_CONTENT)
}

async fn server() -> TestHttpServer {
    let router = Router::new()
        .route("/echo", get(echo_platform))
        .route("/missing", get(not_found))
        .route("/empty", get(no_content));
    TestHttpServer::new(router).await
}

#[fixture]
fn client() -> HttpClient {
    HttpClient::new(NetOptions::default()).unwrap()
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn sends_headers_and_reads_response_headers(client: HttpClient) {
    let server = server().await;
    let mut headers = Headers::new();
    headers.insert("Expo-Platform", "linux");

    let response = client.fetch(server.url("/echo"), Some(headers)).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.headers.get("X-Seen-Platform"), Some("linux"));
    assert_eq!(&response.body[..], b"ok");
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn error_status_carries_body(client: HttpClient) {
    let server = server().await;

    let err = client.fetch(server.url("/missing"), None).await.unwrap_err();

    match err {
        NetError::HttpError { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body.as_deref(), Some("missing"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn no_content_is_success(client: HttpClient) {
    let server = server().await;

    let response = client.fetch(server.url("/empty"), None).await.unwrap();

    assert_eq!(response.status, 204);
    assert!(response.body.is_empty());
    assert_eq!(response.headers.get("expo-protocol-version"), Some("1"));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn retry_does_not_repeat_client_errors(client: HttpClient) {
    let server = server().await;
    let net = client.with_retry(RetryPolicy::new(
        3,
        Duration::from_millis(1),
        Duration::from_millis(5),
    ));

    let err = net.fetch(server.url("/missing"), None).await.unwrap_err();

    assert_eq!(err.status_code(), Some(404));
}
