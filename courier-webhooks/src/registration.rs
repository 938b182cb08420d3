//! Subscription registration

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::crypto::SecretCipher;
use crate::error::{RegistrationError, SafetyError};
use crate::event::{EventType, WILDCARD};
use crate::network::NetworkGuard;
use crate::store::SubscriptionStore;
use crate::subscription::WebhookSubscription;

/// Input to [`SubscriptionRegistrar::register`]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSubscription {
    pub url: String,
    pub secret: String,
    pub event_types: Vec<String>,
}

impl RegisterSubscription {
    pub fn new(
        url: impl Into<String>,
        secret: impl Into<String>,
        event_types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            url: url.into(),
            secret: secret.into(),
            event_types: event_types.into_iter().map(Into::into).collect(),
        }
    }
}

/// Validates and persists new subscriptions.
///
/// Registration is all-or-nothing: nothing is stored unless the URL, secret
/// and event filter all pass and the secret was encrypted.
pub struct SubscriptionRegistrar {
    guard: NetworkGuard,
    cipher: Arc<dyn SecretCipher>,
    store: Arc<dyn SubscriptionStore>,
    min_secret_length: usize,
}

impl SubscriptionRegistrar {
    pub fn new(
        guard: NetworkGuard,
        cipher: Arc<dyn SecretCipher>,
        store: Arc<dyn SubscriptionStore>,
        min_secret_length: usize,
    ) -> Self {
        Self {
            guard,
            cipher,
            store,
            min_secret_length,
        }
    }

    pub async fn register(
        &self,
        tenant_id: &str,
        input: RegisterSubscription,
    ) -> Result<WebhookSubscription, RegistrationError> {
        let url = Url::parse(input.url.trim())
            .map_err(|e| SafetyError::InvalidUrl(format!("{}: {e}", input.url)))?;

        let addresses = match self.guard.classify(&url).await {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!(tenant_id, url = %url, code = e.code(), "Rejected webhook destination");
                return Err(e.into());
            }
        };

        let actual = input.secret.chars().count();
        if actual < self.min_secret_length {
            return Err(RegistrationError::SecretLength {
                min: self.min_secret_length,
                actual,
            });
        }

        validate_event_types(&input.event_types)?;

        let secret_ciphertext = self.cipher.encrypt(&input.secret)?;

        let subscription = WebhookSubscription::new(tenant_id, url, secret_ciphertext, input.event_types)
            .with_resolved_addresses(addresses, Utc::now());
        let subscription = self.store.create(subscription).await?;

        info!(
            tenant_id,
            subscription_id = %subscription.id,
            host = %subscription.host(),
            "Registered webhook subscription"
        );
        Ok(subscription)
    }
}

fn validate_event_types(event_types: &[String]) -> Result<(), RegistrationError> {
    if event_types.is_empty() {
        return Err(RegistrationError::EventTypes(
            "at least one event type is required".to_string(),
        ));
    }

    let unknown: Vec<&str> = event_types
        .iter()
        .map(String::as_str)
        .filter(|t| *t != WILDCARD && EventType::parse(t).is_none())
        .collect();

    if !unknown.is_empty() {
        return Err(RegistrationError::EventTypes(format!(
            "unknown event types: {}",
            unknown.join(", ")
        )));
    }
    Ok(())
}
