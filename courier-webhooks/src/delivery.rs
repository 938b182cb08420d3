//! Delivery attempts and the in-process retry scheduler

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::DeliveryConfig;
use crate::crypto::{SecretCipher, open_secret};
use crate::error::DeliveryError;
use crate::event::{EventType, WebhookEvent};
use crate::network::NetworkGuard;
use crate::retry::RetryPolicy;
use crate::signature::{WebhookSigner, headers};
use crate::store::SubscriptionStore;
use crate::subscription::WebhookSubscription;
use crate::transport::{HttpTransport, OutboundRequest, TransportResponse};

/// State of one subscription × event delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Pending,
    Delivered,
    Failed,
}

/// Progress of delivering one event to one subscription.
///
/// Owns a snapshot of the subscription; nothing here is shared with other
/// deliveries.
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    /// Attempts made so far
    pub attempt_number: u32,
    pub subscription: WebhookSubscription,
    pub event: WebhookEvent,
    pub next_eligible_at: Option<DateTime<Utc>>,
    pub state: AttemptState,
    pub last_error: Option<DeliveryError>,
}

impl DeliveryAttempt {
    pub fn new(subscription: WebhookSubscription, event: WebhookEvent) -> Self {
        Self {
            attempt_number: 0,
            subscription,
            event,
            next_eligible_at: None,
            state: AttemptState::Pending,
            last_error: None,
        }
    }

    fn into_report(self, status: Option<u16>) -> DeliveryReport {
        DeliveryReport {
            subscription_id: self.subscription.id,
            event_type: self.event.event_type,
            state: self.state,
            attempts: self.attempt_number,
            status: status.or_else(|| self.last_error.as_ref().and_then(DeliveryError::status)),
            last_error: self.last_error,
        }
    }
}

/// Terminal outcome of a delivery
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub subscription_id: String,
    pub event_type: EventType,
    pub state: AttemptState,
    pub attempts: u32,

    /// Last HTTP status received, if any
    pub status: Option<u16>,

    pub last_error: Option<DeliveryError>,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.state == AttemptState::Delivered
    }
}

/// Signs and sends events to subscribers, re-validating the destination
/// before every attempt.
pub struct DeliveryEngine {
    config: DeliveryConfig,
    policy: RetryPolicy,
    guard: NetworkGuard,
    cipher: Arc<dyn SecretCipher>,
    transport: Arc<dyn HttpTransport>,
    store: Option<Arc<dyn SubscriptionStore>>,
    limiter: Arc<Semaphore>,
}

impl std::fmt::Debug for DeliveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryEngine")
            .field("config", &self.config)
            .field("available_permits", &self.limiter.available_permits())
            .finish_non_exhaustive()
    }
}

impl DeliveryEngine {
    pub fn new(
        config: DeliveryConfig,
        guard: NetworkGuard,
        cipher: Arc<dyn SecretCipher>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_in_flight));
        Self {
            policy: config.retry_policy(),
            config,
            guard,
            cipher,
            transport,
            store: None,
            limiter,
        }
    }

    /// Store used to re-cache addresses pinned for legacy subscriptions
    pub fn with_store(mut self, store: Arc<dyn SubscriptionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share an in-flight limiter with other engines
    pub fn with_concurrency_limit(mut self, limiter: Arc<Semaphore>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Permits currently free in the in-flight limiter
    pub fn available_permits(&self) -> usize {
        self.limiter.available_permits()
    }

    /// Make one delivery attempt, returning the 2xx status on success.
    ///
    /// If the snapshot carries no vetted addresses, the freshly resolved set
    /// is pinned onto it and re-cached in the store. The transport connects
    /// only to the addresses vetted by this attempt.
    pub async fn deliver_once(
        &self,
        subscription: &mut WebhookSubscription,
        event: &WebhookEvent,
    ) -> Result<u16, DeliveryError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| DeliveryError::LimiterClosed)?;

        let vetted = self.guard.classify(&subscription.url).await?;
        self.enforce_allowlist(subscription, &vetted).await?;

        let secret = open_secret(self.cipher.as_ref(), &subscription.secret_ciphertext)
            .map_err(|e| DeliveryError::Decryption(e.to_string()))?;
        let body = event
            .to_body()
            .map_err(|e| DeliveryError::Serialization(e.to_string()))?;

        let timestamp = Utc::now().timestamp_millis();
        let signature = WebhookSigner::new(secret).sign(timestamp, &body);

        let request = OutboundRequest {
            url: subscription.url.clone(),
            addresses: vetted,
            headers: vec![
                (headers::CONTENT_TYPE, "application/json".to_string()),
                (headers::SIGNATURE, signature),
                (headers::TIMESTAMP, timestamp.to_string()),
                (headers::EVENT_TYPE, event.event_type.to_string()),
            ],
            body,
        };

        debug!(
            subscription_id = %subscription.id,
            event_type = %event.event_type,
            host = %subscription.host(),
            "Sending webhook"
        );

        let response = self.transport.post(request).await?;
        classify_response(response)
    }

    async fn enforce_allowlist(
        &self,
        subscription: &mut WebhookSubscription,
        fresh: &[IpAddr],
    ) -> Result<(), DeliveryError> {
        if !subscription.resolved_addresses.is_empty() {
            return match fresh
                .iter()
                .find(|ip| !subscription.resolved_addresses.contains(ip))
            {
                Some(address) => Err(DeliveryError::DnsRebindingDetected {
                    host: subscription.host().to_string(),
                    address: *address,
                }),
                None => Ok(()),
            };
        }

        let now = Utc::now();
        info!(
            subscription_id = %subscription.id,
            addresses = ?fresh,
            "Pinning resolved addresses for legacy subscription"
        );

        if let Some(store) = &self.store {
            if let Err(e) = store
                .cache_resolved_addresses(&subscription.id, fresh, now)
                .await
            {
                warn!(
                    subscription_id = %subscription.id,
                    error = %e,
                    "Failed to cache pinned addresses"
                );
            }
        }

        subscription.pin_addresses(fresh.to_vec(), now);
        Ok(())
    }

    /// Deliver with retries until success or attempts are exhausted.
    ///
    /// Attempts for one subscription and event run strictly one after
    /// another; the limiter permit is released while waiting out a backoff.
    pub async fn deliver(&self, subscription: WebhookSubscription, event: WebhookEvent) -> DeliveryReport {
        let mut attempt = DeliveryAttempt::new(subscription, event);

        loop {
            let result = self
                .deliver_once(&mut attempt.subscription, &attempt.event)
                .await;
            attempt.attempt_number += 1;

            match result {
                Ok(status) => {
                    attempt.state = AttemptState::Delivered;
                    attempt.next_eligible_at = None;
                    info!(
                        subscription_id = %attempt.subscription.id,
                        event_type = %attempt.event.event_type,
                        attempt = attempt.attempt_number,
                        status,
                        "Webhook delivered"
                    );
                    return attempt.into_report(Some(status));
                }
                Err(err) => {
                    if !self.policy.should_retry(attempt.attempt_number) {
                        error!(
                            subscription_id = %attempt.subscription.id,
                            tenant_id = %attempt.event.tenant_id,
                            event_type = %attempt.event.event_type,
                            attempts = attempt.attempt_number,
                            code = err.code(),
                            error = %err,
                            "Webhook delivery failed permanently"
                        );
                        attempt.state = AttemptState::Failed;
                        attempt.next_eligible_at = None;
                        attempt.last_error = Some(err);
                        return attempt.into_report(None);
                    }

                    let delay = self.policy.delay_for_attempt(attempt.attempt_number - 1);
                    attempt.next_eligible_at =
                        Some(Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default());

                    warn!(
                        subscription_id = %attempt.subscription.id,
                        event_type = %attempt.event.event_type,
                        attempt = attempt.attempt_number,
                        code = err.code(),
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "Webhook delivery attempt failed"
                    );
                    attempt.last_error = Some(err);

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// 2xx succeeds; 3xx is a rejected redirect; anything else fails with its status
fn classify_response(response: TransportResponse) -> Result<u16, DeliveryError> {
    match response.status {
        200..=299 => Ok(response.status),
        300..=399 => Err(DeliveryError::RedirectNotAllowed {
            status: response.status,
            location: response.location,
        }),
        status => Err(DeliveryError::HttpStatus(status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_statuses() {
        assert_eq!(classify_response(TransportResponse::new(200)), Ok(200));
        assert_eq!(classify_response(TransportResponse::new(204)), Ok(204));
    }

    #[test]
    fn test_redirects_are_failures() {
        let response = TransportResponse {
            status: 307,
            location: Some("http://169.254.169.254/".to_string()),
        };
        assert_eq!(
            classify_response(response),
            Err(DeliveryError::RedirectNotAllowed {
                status: 307,
                location: Some("http://169.254.169.254/".to_string()),
            })
        );
    }

    #[test]
    fn test_error_statuses_carry_status() {
        for status in [400, 404, 429, 500, 503] {
            let err = classify_response(TransportResponse::new(status)).unwrap_err();
            assert_eq!(err.status(), Some(status));
            assert_eq!(err.code(), "http_status");
        }
    }

    #[test]
    fn test_new_attempt_is_pending() {
        let subscription = WebhookSubscription::new(
            "t",
            url::Url::parse("https://hooks.example.com").unwrap(),
            "enc:v1:x",
            ["*"],
        );
        let event = WebhookEvent::new(EventType::TaskCreated, "t", serde_json::json!({}));
        let attempt = DeliveryAttempt::new(subscription, event);

        assert_eq!(attempt.state, AttemptState::Pending);
        assert_eq!(attempt.attempt_number, 0);
        assert!(attempt.next_eligible_at.is_none());
    }
}
