//! Real HTTP tests against a local mock server
//!
//! Requests carry the addresses their host was vetted to; the transport
//! connects to those and never to whatever the system resolver answers.

mod common;

use std::time::Duration;

use common::*;
use courier_webhooks::*;
use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOST: &str = "hooks.test";
const LOOPBACK: &str = "127.0.0.1";

// TEST-NET-1, never routed
const UNROUTABLE: &str = "192.0.2.1";

fn transport(config: &DeliveryConfig) -> ReqwestTransport {
    ReqwestTransport::new(config).unwrap()
}

fn leave_event() -> WebhookEvent {
    WebhookEvent::new(EventType::LeaveApproved, "tenant-1", json!({"leaveId": "l-3", "days": 2}))
}

fn signed_request(url: String, addresses: &[&str], event: &WebhookEvent) -> OutboundRequest {
    let body = event.to_body().unwrap();
    let timestamp = 1_700_000_000_000i64;
    let signature = WebhookSigner::new(SECRET).sign(timestamp, &body);

    OutboundRequest {
        url: url.parse().unwrap(),
        addresses: addresses.iter().map(|a| ip(a)).collect(),
        headers: vec![
            (headers::CONTENT_TYPE, "application/json".to_string()),
            (headers::SIGNATURE, signature),
            (headers::TIMESTAMP, timestamp.to_string()),
            (headers::EVENT_TYPE, event.event_type.to_string()),
        ],
        body,
    }
}

fn hook_url(server: &MockServer, host: &str, route: &str) -> String {
    format!("http://{host}:{}{route}", server.address().port())
}

#[tokio::test]
async fn test_post_carries_signature_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("content-type", "application/json"))
        .and(header("x-webhook-event", "leave.approved"))
        .and(header_exists("x-webhook-signature"))
        .and(header_exists("x-webhook-timestamp"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let event = leave_event();
    let request = signed_request(hook_url(&server, HOST, "/hook"), &[LOOPBACK], &event);

    let response = transport(&test_config()).post(request).await.unwrap();
    assert_eq!(response.status, 200);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let received = &received[0];

    let body: serde_json::Value = serde_json::from_slice(&received.body).unwrap();
    assert_eq!(body, serde_json::to_value(&event).unwrap());

    let timestamp = received.headers.get("x-webhook-timestamp").unwrap().to_str().unwrap();
    let signature = received.headers.get("x-webhook-signature").unwrap().to_str().unwrap();
    assert!(
        WebhookVerifier::new(SECRET)
            .verify(timestamp, signature, &received.body)
            .is_ok()
    );
}

#[tokio::test]
async fn test_connects_to_vetted_address_not_system_dns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    // `localhost` resolves to the mock server, but only the vetted address may be used
    let config = DeliveryConfig::builder()
        .request_timeout(Duration::from_millis(300))
        .build();
    let request = signed_request(hook_url(&server, "localhost", "/hook"), &[UNROUTABLE], &leave_event());

    let result = transport(&config).post(request).await;

    assert!(result.is_err(), "{result:?}");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_request_without_vetted_addresses_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let request = signed_request(hook_url(&server, "localhost", "/hook"), &[], &leave_event());

    let err = transport(&test_config()).post(request).await.unwrap_err();

    assert!(matches!(err, TransportError::Network(_)));
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let server = MockServer::start().await;
    let internal = format!("{}/internal", server.uri());

    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", internal.as_str()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/internal"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let request = signed_request(hook_url(&server, HOST, "/hook"), &[LOOPBACK], &leave_event());

    let response = transport(&test_config()).post(request).await.unwrap();

    assert_eq!(response.status, 302);
    assert_eq!(response.location, Some(internal));
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let request = signed_request(hook_url(&server, HOST, "/hook"), &[LOOPBACK], &leave_event());

    let response = transport(&test_config()).post(request).await.unwrap();
    assert_eq!(response, TransportResponse::new(503));
}

#[tokio::test]
async fn test_slow_subscriber_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let config = DeliveryConfig::builder()
        .request_timeout(Duration::from_millis(200))
        .build();
    let request = signed_request(hook_url(&server, HOST, "/hook"), &[LOOPBACK], &leave_event());

    let err = transport(&config).post(request).await.unwrap_err();
    assert_eq!(err, TransportError::Timeout);
}
