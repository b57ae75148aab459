//! Fetch client behaviour against live HTTP responses

use crate::common::{fast_fetch, user_agent};
use catalog_harvest::fetch::{DiagnosticLog, ErrorKind, FetchClient};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> FetchClient {
    FetchClient::new(&user_agent(), fast_fetch(), DiagnosticLog::disabled()).unwrap()
}

#[tokio::test]
async fn test_fetch_json_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "a": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client();
    let value = client.fetch(&format!("{}/ok", server.uri())).await.unwrap();
    assert_eq!(value["a"], 1);
    assert_eq!(client.requests_sent(), 1);
}

#[tokio::test]
async fn test_timeout_retries_then_classifies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1_000)))
        .expect(3)
        .mount(&server)
        .await;

    let mut client = client();
    let error = client
        .fetch(&format!("{}/slow", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), Some(ErrorKind::RequestTimeout));
    assert_eq!(error.status_code(), None);
    assert_eq!(client.requests_sent(), 3);
}

#[tokio::test]
async fn test_rate_limit_retries_then_classifies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let mut client = client();
    let error = client
        .fetch(&format!("{}/limited", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), Some(ErrorKind::TooManyRequests));
    assert_eq!(error.status_code(), Some(429));
}

#[tokio::test]
async fn test_rate_limit_clears() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let mut client = client();
    let value = client.fetch(&format!("{}/busy", server.uri())).await.unwrap();
    assert!(value.as_array().unwrap().is_empty());
    assert_eq!(client.requests_sent(), 2);
}

#[tokio::test]
async fn test_status_codes_are_not_retried() {
    let server = MockServer::start().await;
    for (route, status) in [("/gone", 404), ("/broken", 500), ("/teapot", 418)] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut client = client();
    let base = server.uri();

    let not_found = client.fetch(&format!("{}/gone", base)).await.unwrap_err();
    assert_eq!(not_found.kind(), Some(ErrorKind::NotFound));
    assert!(ErrorKind::NotFound.is_hard());

    let server_error = client.fetch(&format!("{}/broken", base)).await.unwrap_err();
    assert_eq!(server_error.kind(), Some(ErrorKind::ServerError));
    assert_eq!(server_error.status_code(), Some(500));

    let unknown = client.fetch(&format!("{}/teapot", base)).await.unwrap_err();
    assert_eq!(unknown.kind(), Some(ErrorKind::UnknownClientOrServerError));
}

#[tokio::test]
async fn test_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let mut client = client();
    let error = client
        .fetch(&format!("{}/garbage", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), Some(ErrorKind::MalformedResponse));
    assert_eq!(error.status_code(), Some(200));
    assert!(!error.is_fatal());
}

#[tokio::test]
async fn test_connection_failure_is_fatal() {
    // Bind then drop to get a port nothing listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut client = client();
    let error = client
        .fetch(&format!("http://127.0.0.1:{}/nothing", port))
        .await
        .unwrap_err();

    assert!(error.is_fatal());
    assert_eq!(error.kind(), None);
}

#[tokio::test]
async fn test_non_success_responses_are_logged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log = DiagnosticLog::new(dir.path().join("responses.jsonl"));
    let mut client = FetchClient::new(&user_agent(), fast_fetch(), log.clone()).unwrap();

    let url = format!("{}/down", server.uri());
    assert!(client.fetch(&url).await.is_err());

    let entries = log.read_all().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, 503);
    assert_eq!(entries[0].url, url);
    assert_eq!(entries[0].body, "maintenance");
}

#[tokio::test]
async fn test_redirect_loop_is_recorded_not_fatal() {
    let server = MockServer::start().await;
    let url = format!("{}/loop", server.uri());
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", url.as_str()))
        .mount(&server)
        .await;

    let mut client = client();
    let error = client.fetch(&url).await.unwrap_err();

    assert!(!error.is_fatal());
    assert_eq!(error.kind(), Some(ErrorKind::UnknownClientOrServerError));
    // Given up on the first attempt, no connection retries
    assert_eq!(client.requests_sent(), 1);
}
