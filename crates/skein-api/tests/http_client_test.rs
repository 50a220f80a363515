#![allow(clippy::unwrap_used)]
// Integration tests for `HttpClient` using wiremock.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skein_api::{Error, FetchClient, HttpClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, HttpClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let client = HttpClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

// ── Read-shaped fetches ─────────────────────────────────────────────

#[tokio::test]
async fn test_get_wrapped_envelope() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/me/appointments"))
        .and(query_param("status", "upcoming"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 1}, {"id": 2}],
            "pagination": {"current_page": 1, "total_pages": 3, "standard_page_size": 2},
            "summary": {"active_count": 2}
        })))
        .mount(&server)
        .await;

    let envelope = client
        .get("me/appointments?status=upcoming", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(envelope.data, vec![json!({"id": 1}), json!({"id": 2})]);
    let pagination = envelope.pagination.unwrap();
    assert_eq!(pagination.total_pages, Some(3));
    assert_eq!(pagination.standard_page_size, Some(2));
    assert_eq!(envelope.summary.unwrap().active_count, Some(2));
}

#[tokio::test]
async fn test_get_bare_array() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/providers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "p1"}])))
        .mount(&server)
        .await;

    let envelope = client
        .get("providers", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(envelope.data, vec![json!({"id": "p1"})]);
    assert!(envelope.pagination.is_none());
}

// ── Write-shaped fetches ────────────────────────────────────────────

#[tokio::test]
async fn test_post_sends_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/search/providers"))
        .and(body_json(json!({"specialty": "cardiology"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "p9"}]
        })))
        .mount(&server)
        .await;

    let body = json!({"specialty": "cardiology"});
    let envelope = client
        .post("search/providers", &body, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(envelope.data.len(), 1);
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me/profile"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Ada"})))
        .mount(&server)
        .await;

    let transport =
        TransportConfig::default().with_bearer_token(SecretString::from("s3cret"));
    let client = HttpClient::new(Url::parse(&server.uri()).unwrap(), &transport).unwrap();

    let value = client
        .get_json("me/profile", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(value, json!({"name": "Ada"}));
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_error_body_message_is_extracted() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not found"})))
        .mount(&server)
        .await;

    let err = client
        .get("me/missing", CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert!(err.is_not_found());
    assert_eq!(err.user_message(), "Not found");
}

#[tokio::test]
async fn test_error_without_json_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = client
        .get("me/appointments", CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Api { message: None, .. }));
    assert_eq!(err.user_message(), "HTTP 503");
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client
        .get("me/appointments", CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Deserialization { .. }));
}

// ── Cancellation ────────────────────────────────────────────────────

#[tokio::test]
async fn test_cancelled_request_resolves_to_cancelled() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": []}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = client.get("me/appointments", token).await.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_pre_cancelled_token_never_sends() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(0)
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    token.cancel();

    let result = client.get("me/appointments", token).await;
    tokio_test::assert_err!(result);
}
