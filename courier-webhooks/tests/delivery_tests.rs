//! Integration tests for single delivery attempts

mod common;

use std::sync::Arc;

use common::*;
use courier_webhooks::*;
use serde_json::json;

fn booking_event() -> WebhookEvent {
    WebhookEvent::new(
        EventType::BookingCreated,
        "tenant-1",
        json!({"bookingId": "b-1", "start": "2026-03-01T09:00:00Z"}),
    )
}

#[tokio::test]
async fn test_attempt_sends_signed_request() {
    let resolver = StaticResolver::with("hooks.example.com", &[PUBLIC_IP]);
    let transport = RecordingTransport::new();
    let engine = engine(test_config(), resolver, transport.clone());

    let mut sub = subscription("tenant-1", "https://hooks.example.com/in", &["*"], &[PUBLIC_IP]);
    let event = booking_event();

    assert_eq!(engine.deliver_once(&mut sub, &event).await, Ok(200));

    let sent = transport.requests();
    assert_eq!(sent.len(), 1);
    let request = &sent[0].request;

    assert_eq!(request.url.as_str(), "https://hooks.example.com/in");
    assert_eq!(request.addresses, vec![ip(PUBLIC_IP)]);
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.header("x-webhook-event"), Some("booking.created"));
    assert_eq!(request.body, event.to_body().unwrap());

    let timestamp = request.header("x-webhook-timestamp").unwrap();
    let signature = request.header("x-webhook-signature").unwrap();
    assert!(timestamp.parse::<i64>().is_ok());
    assert!(
        WebhookVerifier::new(SECRET)
            .with_tolerance_ms(60_000)
            .verify(timestamp, signature, &request.body)
            .is_ok()
    );
}

#[tokio::test]
async fn test_rebinding_to_unvetted_public_address_is_refused() {
    let resolver = StaticResolver::with("hooks.example.com", &[PUBLIC_IP]);
    let transport = RecordingTransport::new();
    let engine = engine(test_config(), resolver.clone(), transport.clone());

    let mut sub = subscription("tenant-1", "https://hooks.example.com/in", &["*"], &[PUBLIC_IP]);
    resolver.set("hooks.example.com", &[OTHER_PUBLIC_IP]);

    let err = engine.deliver_once(&mut sub, &booking_event()).await.unwrap_err();

    assert_eq!(
        err,
        DeliveryError::DnsRebindingDetected {
            host: "hooks.example.com".to_string(),
            address: ip(OTHER_PUBLIC_IP),
        }
    );
    assert_eq!(transport.count(), 0);
    assert_eq!(sub.resolved_addresses, vec![ip(PUBLIC_IP)]);
}

#[tokio::test]
async fn test_rebinding_to_private_address_is_refused() {
    let resolver = StaticResolver::with("hooks.example.com", &[PUBLIC_IP]);
    let transport = RecordingTransport::new();
    let engine = engine(test_config(), resolver.clone(), transport.clone());

    let mut sub = subscription("tenant-1", "https://hooks.example.com/in", &["*"], &[PUBLIC_IP]);
    resolver.set("hooks.example.com", &["10.0.0.5"]);

    let err = engine.deliver_once(&mut sub, &booking_event()).await.unwrap_err();

    assert_eq!(err.code(), "private_ip_denied");
    assert_eq!(transport.count(), 0);
}

#[tokio::test]
async fn test_subset_of_vetted_addresses_is_accepted() {
    let resolver = StaticResolver::with("hooks.example.com", &[OTHER_PUBLIC_IP]);
    let transport = RecordingTransport::new();
    let engine = engine(test_config(), resolver, transport.clone());

    let mut sub = subscription(
        "tenant-1",
        "https://hooks.example.com/in",
        &["*"],
        &[PUBLIC_IP, OTHER_PUBLIC_IP],
    );

    assert!(engine.deliver_once(&mut sub, &booking_event()).await.is_ok());
    assert_eq!(transport.count(), 1);

    // Connect only to what this attempt resolved, not the whole allowlist
    assert_eq!(transport.requests()[0].request.addresses, vec![ip(OTHER_PUBLIC_IP)]);
}

#[tokio::test]
async fn test_legacy_subscription_is_pinned_on_first_attempt() {
    let resolver = StaticResolver::with("hooks.example.com", &[PUBLIC_IP]);
    let transport = RecordingTransport::new();
    let store = Arc::new(InMemorySubscriptionStore::new());
    let engine = engine(test_config(), resolver.clone(), transport.clone())
        .with_store(store.clone());

    let mut legacy = WebhookSubscription::new(
        "tenant-1",
        url::Url::parse("https://hooks.example.com/in").unwrap(),
        cipher().encrypt(SECRET).unwrap(),
        ["*"],
    );
    store.insert(legacy.clone()).unwrap();

    assert!(engine.deliver_once(&mut legacy, &booking_event()).await.is_ok());
    assert_eq!(legacy.resolved_addresses, vec![ip(PUBLIC_IP)]);
    assert_eq!(transport.requests()[0].request.addresses, vec![ip(PUBLIC_IP)]);

    let cached = store.find_by_id(&legacy.id).await.unwrap().unwrap();
    assert_eq!(cached.resolved_addresses, vec![ip(PUBLIC_IP)]);
    assert!(cached.addresses_resolved_at.is_some());

    // Once pinned, a changed answer is caught
    resolver.set("hooks.example.com", &[OTHER_PUBLIC_IP]);
    let err = engine.deliver_once(&mut legacy, &booking_event()).await.unwrap_err();
    assert_eq!(err.code(), "dns_rebinding_detected");
    assert_eq!(transport.count(), 1);
}

#[tokio::test]
async fn test_legacy_plaintext_secret_still_signs() {
    let resolver = StaticResolver::with("hooks.example.com", &[PUBLIC_IP]);
    let transport = RecordingTransport::new();
    let engine = engine(test_config(), resolver, transport.clone());

    let mut sub = subscription("tenant-1", "https://hooks.example.com/in", &["*"], &[PUBLIC_IP]);
    sub.secret_ciphertext = SECRET.to_string();

    engine.deliver_once(&mut sub, &booking_event()).await.unwrap();

    let request = &transport.requests()[0].request;
    let verified = WebhookVerifier::new(SECRET).verify(
        request.header("x-webhook-timestamp").unwrap(),
        request.header("x-webhook-signature").unwrap(),
        &request.body,
    );
    assert!(verified.is_ok());
}

#[tokio::test]
async fn test_undecryptable_secret_sends_nothing() {
    let resolver = StaticResolver::with("hooks.example.com", &[PUBLIC_IP]);
    let transport = RecordingTransport::new();
    let engine = engine(test_config(), resolver, transport.clone());

    let mut sub = subscription("tenant-1", "https://hooks.example.com/in", &["*"], &[PUBLIC_IP]);
    sub.secret_ciphertext = format!("{CIPHERTEXT_PREFIX}bm90LWEtcmVhbC1jaXBoZXJ0ZXh0");

    let err = engine.deliver_once(&mut sub, &booking_event()).await.unwrap_err();
    assert_eq!(err.code(), "decryption_failed");
    assert_eq!(transport.count(), 0);
}

#[tokio::test]
async fn test_outcome_classification() {
    let resolver = StaticResolver::with("hooks.example.com", &[PUBLIC_IP]);
    let transport = RecordingTransport::scripted([
        Ok(TransportResponse {
            status: 302,
            location: Some("http://10.0.0.1/admin".to_string()),
        }),
        Ok(TransportResponse::new(500)),
        Err(TransportError::Timeout),
        Err(TransportError::Network("connection reset".to_string())),
        Ok(TransportResponse::new(202)),
    ]);
    let engine = engine(test_config(), resolver, transport.clone());
    let mut sub = subscription("tenant-1", "https://hooks.example.com/in", &["*"], &[PUBLIC_IP]);
    let event = booking_event();

    assert_eq!(
        engine.deliver_once(&mut sub, &event).await,
        Err(DeliveryError::RedirectNotAllowed {
            status: 302,
            location: Some("http://10.0.0.1/admin".to_string()),
        })
    );
    assert_eq!(
        engine.deliver_once(&mut sub, &event).await,
        Err(DeliveryError::HttpStatus(500))
    );
    assert_eq!(
        engine.deliver_once(&mut sub, &event).await,
        Err(DeliveryError::Timeout)
    );
    assert_eq!(
        engine.deliver_once(&mut sub, &event).await,
        Err(DeliveryError::Network("connection reset".to_string()))
    );
    assert_eq!(engine.deliver_once(&mut sub, &event).await, Ok(202));
}

#[tokio::test]
async fn test_permit_is_released_after_attempt() {
    let resolver = StaticResolver::with("hooks.example.com", &[PUBLIC_IP]);
    let transport = RecordingTransport::scripted([Ok(TransportResponse::new(500))]);
    let config = DeliveryConfig::builder().max_in_flight(1).build();
    let engine = engine(config, resolver, transport);

    let mut sub = subscription("tenant-1", "https://hooks.example.com/in", &["*"], &[PUBLIC_IP]);

    assert!(engine.deliver_once(&mut sub, &booking_event()).await.is_err());
    assert_eq!(engine.available_permits(), 1);
    assert!(engine.deliver_once(&mut sub, &booking_event()).await.is_ok());
}
