// HTTP layer tests against a local mock server. Pipeline behavior on top of
// the fetcher (retry, rotation, parsing) is covered in integration_tests.rs.

use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cardwatch::extractor::{HttpFetcher, PageFetcher};

const UA: &str = "test-agent/1.0";
const TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_fetch_returns_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let response = fetcher
        .fetch(&format!("{}/item/abc", server.uri()), UA, TIMEOUT)
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "<html>ok</html>");
}

#[tokio::test]
async fn test_fetch_sends_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item/abc"))
        .and(header("user-agent", UA))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let response = fetcher
        .fetch(&format!("{}/item/abc", server.uri()), UA, TIMEOUT)
        .await
        .unwrap();

    assert!(response.is_success());
}

#[tokio::test]
async fn test_fetch_reports_error_status_without_failing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item/gone"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let response = fetcher
        .fetch(&format!("{}/item/gone", server.uri()), UA, TIMEOUT)
        .await
        .unwrap();

    // status classification is the caller's job
    assert!(!response.is_success());
    assert_eq!(response.status, 503);
}

#[tokio::test]
async fn test_fetch_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let result = fetcher
        .fetch(
            &format!("{}/item/slow", server.uri()),
            UA,
            Duration::from_millis(100),
        )
        .await;

    assert!(result.is_err());
}
