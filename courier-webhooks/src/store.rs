//! Subscription persistence interface and an in-memory implementation

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::event::EventType;
use crate::subscription::WebhookSubscription;

/// Persistence of webhook subscriptions.
///
/// Business-entity storage lives elsewhere; this is the narrow slice the
/// delivery core needs.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Persist a new subscription
    async fn create(&self, subscription: WebhookSubscription) -> Result<WebhookSubscription, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<WebhookSubscription>, StoreError>;

    /// Active subscriptions of `tenant_id` whose filter contains `event_type` or `"*"`
    async fn find_active_by_tenant_and_event(
        &self,
        tenant_id: &str,
        event_type: EventType,
    ) -> Result<Vec<WebhookSubscription>, StoreError>;

    /// Re-cache the vetted address set of a subscription
    async fn cache_resolved_addresses(
        &self,
        id: &str,
        addresses: &[IpAddr],
        resolved_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Store backed by a map, for tests and single-process deployments
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionStore {
    subscriptions: Arc<RwLock<HashMap<String, WebhookSubscription>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, WebhookSubscription>>, StoreError> {
        self.subscriptions
            .read()
            .map_err(|_| StoreError::Unavailable("subscription map poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, WebhookSubscription>>, StoreError> {
        self.subscriptions
            .write()
            .map_err(|_| StoreError::Unavailable("subscription map poisoned".to_string()))
    }

    /// Insert or replace a record as-is, bypassing registration checks
    pub fn insert(&self, subscription: WebhookSubscription) -> Result<(), StoreError> {
        self.write()?.insert(subscription.id.clone(), subscription);
        Ok(())
    }

    /// Activate or deactivate a subscription
    pub fn set_active(&self, id: &str, active: bool) -> Result<(), StoreError> {
        match self.write()?.get_mut(id) {
            Some(subscription) => {
                subscription.active = active;
                Ok(())
            }
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    /// Get the number of stored subscriptions
    pub fn count(&self) -> usize {
        self.read().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn create(&self, subscription: WebhookSubscription) -> Result<WebhookSubscription, StoreError> {
        let mut subscriptions = self.write()?;
        if subscriptions.contains_key(&subscription.id) {
            return Err(StoreError::Conflict(subscription.id));
        }
        subscriptions.insert(subscription.id.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<WebhookSubscription>, StoreError> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn find_active_by_tenant_and_event(
        &self,
        tenant_id: &str,
        event_type: EventType,
    ) -> Result<Vec<WebhookSubscription>, StoreError> {
        Ok(self
            .read()?
            .values()
            .filter(|s| s.matches(tenant_id, event_type))
            .cloned()
            .collect())
    }

    async fn cache_resolved_addresses(
        &self,
        id: &str,
        addresses: &[IpAddr],
        resolved_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match self.write()?.get_mut(id) {
            Some(subscription) => {
                subscription.pin_addresses(addresses.to_vec(), resolved_at);
                Ok(())
            }
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }
}
