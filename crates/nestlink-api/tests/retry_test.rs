#![allow(clippy::unwrap_used)]
// Integration tests for `RetryingHttpClient` using wiremock.

mod common;

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nestlink_api::{AccessError, Error, HttpRequest, NO_ERROR, RetryingHttpClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RetryingHttpClient) {
    let server = MockServer::start().await;
    let http = RetryingHttpClient::new(
        &common::transport(),
        CancellationToken::new(),
        AccessError::new(),
    )
    .unwrap();
    (server, http)
}

fn get(server: &MockServer, suffix: &str) -> HttpRequest {
    HttpRequest::get(Url::parse(&format!("{}{suffix}", server.uri())).unwrap())
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_server_error_uses_every_attempt() {
    let (server, http) = setup().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let started = Instant::now();
    let result = http.send(&get(&server, "/flaky"), 3).await;

    assert!(
        matches!(result, Err(Error::Status { status: 503 })),
        "expected 503 status error, got: {result:?}"
    );
    // Two pauses between three attempts.
    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(http.access_error().message(), "API response status code 503");
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let (server, http) = setup().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = http.send(&get(&server, "/missing"), 5).await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert!(http.access_error().message().contains("404"));
}

#[tokio::test]
async fn test_zero_retries_still_sends_once() {
    let (server, http) = setup().await;

    Mock::given(method("GET"))
        .and(path("/once"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    assert!(http.send(&get(&server, "/once"), 0).await.is_err());
}

#[tokio::test]
async fn test_success_after_transient_failure_clears_error() {
    let (server, http) = setup().await;

    Mock::given(method("GET"))
        .and(path("/recovering"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recovering"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    http.send(&get(&server, "/recovering"), 2).await.unwrap();
    assert_eq!(http.access_error().message(), NO_ERROR);
}

#[tokio::test]
async fn test_timeout_is_retried_and_reported() {
    let (server, http) = setup().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .expect(2)
        .mount(&server)
        .await;

    let request = get(&server, "/slow").timeout(Duration::from_millis(100));
    let result = http.send(&request, 2).await;

    assert!(
        matches!(result, Err(Error::Timeout)),
        "expected timeout, got: {result:?}"
    );
    assert_eq!(http.access_error().message(), "Connection timeout");
}

#[tokio::test]
async fn test_non_ok_success_status_is_a_failure() {
    let (server, http) = setup().await;

    Mock::given(method("GET"))
        .and(path("/created"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let err = http.send(&get(&server, "/created"), 3).await.unwrap_err();
    assert_eq!(err.status(), Some(201));
}

#[tokio::test]
async fn test_cancelled_client_sends_nothing() {
    let (server, http) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    http.access_error().set("API response status code 503");
    http.cancellation_token().cancel();
    let result = http.send(&get(&server, "/anything"), 3).await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(http.access_error().message(), "API response status code 503");
}

#[tokio::test]
async fn test_cancel_during_backoff_stops_retrying() {
    let server = MockServer::start().await;
    let cancel = CancellationToken::new();
    let http = RetryingHttpClient::new(
        &common::transport().with_retry_backoff(Duration::from_secs(30)),
        cancel.clone(),
        AccessError::new(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let result = http.send(&get(&server, "/down"), 5).await;
    canceller.await.unwrap();

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(http.access_error().message(), "API response status code 503");
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_request() {
    let server = MockServer::start().await;
    let cancel = CancellationToken::new();
    let http = RetryingHttpClient::new(
        &common::transport().with_timeout(Duration::from_secs(10)),
        cancel.clone(),
        AccessError::new(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(503).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let result = http.send(&get(&server, "/slow"), 2).await;
    canceller.await.unwrap();

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(http.access_error().get(), None);
    assert_eq!(http.access_error().message(), NO_ERROR);
}
