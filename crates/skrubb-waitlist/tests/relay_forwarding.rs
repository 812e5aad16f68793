use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use serde_json::{json, Value};
use skrubb_waitlist::config::{PayloadFormat, RelayConfig};
use skrubb_waitlist::waitlist::{
    waitlist_router, HttpRelay, KindFields, Relay, RelayError, Submission, SubmissionService,
};
use tower::ServiceExt;
use url::Url;

fn relay_config(url: &str, payload_format: PayloadFormat, inspectable: bool) -> RelayConfig {
    RelayConfig {
        destination: Some(Url::parse(url).expect("valid url")),
        payload_format,
        response_inspectable: inspectable,
        timeout: Duration::from_secs(2),
    }
}

fn submission() -> Submission {
    Submission {
        fields: KindFields::Client {
            cleaning_details: "Need full apartment deep clean".to_string(),
        },
        name: "Jane Doe".to_string(),
        email: "jane@example.com".to_string(),
        postal_code: "K1A 0B1".to_string(),
        timestamp: Utc.with_ymd_and_hms(2025, 6, 2, 9, 15, 0).unwrap(),
        source_ip: None,
    }
}

async fn post_client(router: axum::Router) -> (StatusCode, Value) {
    let body = json!({
        "type": "client",
        "name": "Jane Doe",
        "email": "jane@example.com",
        "postalCode": "K1A0B1",
        "cleaningDetails": "Need full apartment deep clean"
    });
    let response = router
        .oneshot(
            Request::post("/api/submit-form")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .expect("route executes");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn json_relay_posts_the_full_submission() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/exec")
                .body_contains("\"type\":\"client\"")
                .body_contains("\"postalCode\":\"K1A 0B1\"")
                .body_contains("\"timestamp\":\"2025-06-02T09:15:00.000Z\"");
            then.status(200).body("ok");
        })
        .await;

    let relay = HttpRelay::new(&relay_config(
        &server.url("/exec"),
        PayloadFormat::Json,
        true,
    ))
    .expect("client builds");

    let receipt = relay.forward(&submission()).await.expect("relay succeeds");
    assert_eq!(receipt.status, Some(200));
    mock.assert_async().await;
}

#[tokio::test]
async fn form_relay_posts_email_type_and_timestamp() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/exec")
                .x_www_form_urlencoded_tuple("email", "jane@example.com")
                .x_www_form_urlencoded_tuple("type", "client")
                .x_www_form_urlencoded_tuple("timestamp", "2025-06-02T09:15:00.000Z");
            then.status(200);
        })
        .await;

    let relay = HttpRelay::new(&relay_config(
        &server.url("/exec"),
        PayloadFormat::Form,
        true,
    ))
    .expect("client builds");

    relay.forward(&submission()).await.expect("relay succeeds");
    mock.assert_async().await;
}

#[tokio::test]
async fn inspectable_relay_reports_upstream_status_and_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/exec");
            then.status(503).body("sheet locked");
        })
        .await;

    let relay = HttpRelay::new(&relay_config(
        &server.url("/exec"),
        PayloadFormat::Json,
        true,
    ))
    .expect("client builds");

    let err = relay.forward(&submission()).await.expect_err("relay fails");
    match err {
        RelayError::Rejected { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "sheet locked");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn fire_and_forget_relay_ignores_the_response() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/exec");
            then.status(500);
        })
        .await;

    let relay = HttpRelay::new(&relay_config(
        &server.url("/exec"),
        PayloadFormat::Json,
        false,
    ))
    .expect("client builds");

    let receipt = relay.forward(&submission()).await.expect("send is enough");
    assert_eq!(receipt.status, None);
    mock.assert_async().await;
}

#[tokio::test]
async fn slow_destination_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/exec");
            then.status(200).delay(Duration::from_secs(5));
        })
        .await;

    let mut config = relay_config(&server.url("/exec"), PayloadFormat::Json, true);
    config.timeout = Duration::from_millis(200);
    let relay = HttpRelay::new(&config).expect("client builds");

    let err = relay.forward(&submission()).await.expect_err("relay times out");
    assert!(matches!(err, RelayError::TimedOut(_)), "{err:?}");
}

#[tokio::test]
async fn unconfigured_relay_reports_not_configured() {
    let relay = HttpRelay::new(&RelayConfig::default()).expect("client builds");
    assert!(!relay.is_configured());

    let err = relay.forward(&submission()).await.expect_err("no destination");
    assert!(matches!(err, RelayError::NotConfigured));
}

#[tokio::test]
async fn endpoint_relays_valid_submission_end_to_end() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/exec")
                .body_contains("\"cleaningDetails\":\"Need full apartment deep clean\"");
            then.status(200);
        })
        .await;

    let config = relay_config(&server.url("/exec"), PayloadFormat::Json, true);
    let relay = Arc::new(HttpRelay::new(&config).expect("client builds"));
    let router = waitlist_router(Arc::new(SubmissionService::new(relay, config.timeout)));

    let (status, body) = post_client(router).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_destination_returns_opaque_server_error() {
    // Port 9 (discard) is not expected to accept connections on test hosts.
    let destination = "http://127.0.0.1:9/hidden-script-id/exec";
    let config = relay_config(destination, PayloadFormat::Json, true);
    let relay = Arc::new(HttpRelay::new(&config).expect("client builds"));
    let router = waitlist_router(Arc::new(SubmissionService::new(relay, config.timeout)));

    let (status, body) = post_client(router).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);

    let rendered = body.to_string();
    assert!(!rendered.contains("127.0.0.1"));
    assert!(!rendered.contains("hidden-script-id"));
    assert!(!rendered.contains("error sending request"));
}

#[tokio::test]
async fn endpoint_without_destination_returns_configuration_error() {
    let relay = Arc::new(HttpRelay::new(&RelayConfig::default()).expect("client builds"));
    let router = waitlist_router(Arc::new(SubmissionService::new(
        relay,
        RelayConfig::DEFAULT_TIMEOUT,
    )));

    let (status, body) = post_client(router).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Server configuration error");
}
