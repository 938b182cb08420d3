//! Webhook subscription records

use std::collections::BTreeSet;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::event::{EventType, WILDCARD};

/// A tenant's registered webhook endpoint.
///
/// `secret_ciphertext` holds whatever the encryption collaborator produced;
/// the plaintext secret never lives on this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSubscription {
    /// Unique subscription ID
    pub id: String,

    pub tenant_id: String,

    /// Target URL for delivery
    pub url: Url,

    pub secret_ciphertext: String,

    /// Event type names, or `"*"` for every type
    pub event_types: BTreeSet<String>,

    pub active: bool,

    /// Addresses vetted when the URL was last validated, in resolver order.
    /// Empty for records created before address pinning.
    #[serde(default)]
    pub resolved_addresses: Vec<IpAddr>,

    #[serde(default)]
    pub addresses_resolved_at: Option<DateTime<Utc>>,
}

impl WebhookSubscription {
    /// Create an active subscription with a fresh ID
    pub fn new(
        tenant_id: impl Into<String>,
        url: Url,
        secret_ciphertext: impl Into<String>,
        event_types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            url,
            secret_ciphertext: secret_ciphertext.into(),
            event_types: event_types.into_iter().map(Into::into).collect(),
            active: true,
            resolved_addresses: Vec::new(),
            addresses_resolved_at: None,
        }
    }

    /// Attach the vetted address set
    pub fn with_resolved_addresses(mut self, addresses: Vec<IpAddr>, at: DateTime<Utc>) -> Self {
        self.pin_addresses(addresses, at);
        self
    }

    /// Replace the vetted address set
    pub fn pin_addresses(&mut self, addresses: Vec<IpAddr>, at: DateTime<Utc>) {
        self.resolved_addresses = addresses;
        self.addresses_resolved_at = Some(at);
    }

    /// Whether this subscription's filter contains the event type or `"*"`
    pub fn is_subscribed_to(&self, event_type: EventType) -> bool {
        self.event_types.contains(WILDCARD) || self.event_types.contains(event_type.as_str())
    }

    /// Whether an event of this type for this tenant should be delivered here
    pub fn matches(&self, tenant_id: &str, event_type: EventType) -> bool {
        self.active && self.tenant_id == tenant_id && self.is_subscribed_to(event_type)
    }

    /// Host portion of the URL, for logging
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }
}
