//! Outbound webhook delivery for Courier
//!
//! Turns internal domain events into authenticated HTTP callbacks to
//! tenant-supplied endpoints.
//!
//! # Features
//!
//! - **SSRF Protection**: Destinations are resolved and rejected if any address
//!   is loopback, private, link-local or otherwise reserved
//! - **Rebinding Defense**: Every attempt re-resolves the host and refuses
//!   addresses outside the set vetted at registration
//! - **Signatures**: HMAC-SHA256 over `"{timestamp}.{body}"`
//! - **Retries**: Exponential backoff with jitter, strictly sequential per
//!   subscription and event
//! - **Bounded Fan-out**: One in-flight limiter shared by every event
//! - **Durable Queue Handoff**: Optional; the queue then owns retries
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use courier_webhooks::{AesGcmCipher, EventType, InMemorySubscriptionStore, WebhookEvent, Webhooks};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let webhooks = Webhooks::builder()
//!     .store(Arc::new(InMemorySubscriptionStore::new()))
//!     .cipher(Arc::new(AesGcmCipher::new(&[7u8; 32])?))
//!     .build()?;
//!
//! let event = WebhookEvent::new(
//!     EventType::InvoicePaid,
//!     "tenant-1",
//!     serde_json::json!({"invoiceId": "inv-42"}),
//! );
//!
//! // Fire and forget; per-subscriber failures are logged, never raised
//! webhooks.emit(event).await;
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Verifying on the Subscriber Side
//!
//! ```rust
//! use courier_webhooks::{WebhookSigner, WebhookVerifier};
//!
//! let secret = "whsec_0123456789abcdef0123456789abcdef";
//! let body = br#"{"type":"booking.created"}"#;
//! let signature = WebhookSigner::new(secret).sign(1_700_000_000_000, body);
//!
//! let verifier = WebhookVerifier::new(secret);
//! assert!(verifier.verify_at("1700000000000", &signature, body, 1_700_000_000_500).is_ok());
//! ```

mod config;
mod crypto;
mod delivery;
mod dispatcher;
mod error;
mod event;
mod network;
mod queue;
mod registration;
mod retry;
mod service;
mod signature;
mod store;
mod subscription;
mod transport;

pub use config::{DEFAULT_JOB_NAME, DeliveryConfig, DeliveryConfigBuilder};
pub use crypto::{AesGcmCipher, CIPHERTEXT_PREFIX, SecretCipher, open_secret};
pub use delivery::{AttemptState, DeliveryAttempt, DeliveryEngine, DeliveryReport};
pub use dispatcher::{Dispatcher, EmitReport};
pub use error::{
    CipherError, DeliveryError, QueueError, RegistrationError, ResolveError, SafetyError,
    StoreError, WebhookError,
};
pub use event::{EventType, WILDCARD, WebhookEvent};
pub use network::{DnsResolver, NetworkGuard, SystemResolver, is_reserved_ip};
pub use queue::{Backoff, DeliveryJob, DeliveryQueue, EnqueueOptions, JobData};
pub use registration::{RegisterSubscription, SubscriptionRegistrar};
pub use retry::RetryPolicy;
pub use service::{Webhooks, WebhooksBuilder};
pub use signature::{VerificationError, WebhookSigner, WebhookVerifier, headers};
pub use store::{InMemorySubscriptionStore, SubscriptionStore};
pub use subscription::WebhookSubscription;
pub use transport::{
    HttpTransport, OutboundRequest, ReqwestTransport, TransportError, TransportResponse,
};

/// Result type for webhook service construction
pub type Result<T> = std::result::Result<T, WebhookError>;

