//! Service facade wiring registration and dispatch from collaborators

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::DeliveryConfig;
use crate::crypto::SecretCipher;
use crate::delivery::DeliveryEngine;
use crate::dispatcher::{Dispatcher, EmitReport};
use crate::error::{DeliveryError, RegistrationError, WebhookError};
use crate::event::WebhookEvent;
use crate::network::{DnsResolver, NetworkGuard, SystemResolver};
use crate::queue::{DeliveryQueue, JobData};
use crate::registration::{RegisterSubscription, SubscriptionRegistrar};
use crate::store::SubscriptionStore;
use crate::subscription::WebhookSubscription;
use crate::transport::{HttpTransport, ReqwestTransport};

/// Outbound webhook service
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use courier_webhooks::{
///     AesGcmCipher, EventType, InMemorySubscriptionStore, RegisterSubscription, WebhookEvent,
///     Webhooks,
/// };
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let webhooks = Webhooks::builder()
///     .store(Arc::new(InMemorySubscriptionStore::new()))
///     .cipher(Arc::new(AesGcmCipher::new(&[7u8; 32])?))
///     .build()?;
///
/// webhooks
///     .register(
///         "tenant-1",
///         RegisterSubscription::new(
///             "https://example.com/hook",
///             "whsec_0123456789abcdef0123456789abcdef",
///             ["booking.created"],
///         ),
///     )
///     .await?;
///
/// webhooks
///     .emit(WebhookEvent::new(
///         EventType::BookingCreated,
///         "tenant-1",
///         serde_json::json!({"bookingId": "b-1"}),
///     ))
///     .await;
/// # Ok(())
/// # }
/// ```
pub struct Webhooks {
    config: DeliveryConfig,
    registrar: SubscriptionRegistrar,
    dispatcher: Dispatcher,
}

impl Webhooks {
    pub fn builder() -> WebhooksBuilder {
        WebhooksBuilder::default()
    }

    pub async fn register(
        &self,
        tenant_id: &str,
        input: RegisterSubscription,
    ) -> Result<WebhookSubscription, RegistrationError> {
        self.registrar.register(tenant_id, input).await
    }

    pub async fn emit(&self, event: WebhookEvent) -> EmitReport {
        self.dispatcher.emit(event).await
    }

    pub async fn process_job(&self, payload: JobData) -> Result<(), DeliveryError> {
        self.dispatcher.process_job(payload).await
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    pub fn registrar(&self) -> &SubscriptionRegistrar {
        &self.registrar
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

/// Builder for [`Webhooks`]. The store and cipher are required; the resolver
/// defaults to the system resolver and the transport to `reqwest`.
#[derive(Default)]
pub struct WebhooksBuilder {
    config: Option<DeliveryConfig>,
    store: Option<Arc<dyn SubscriptionStore>>,
    cipher: Option<Arc<dyn SecretCipher>>,
    resolver: Option<Arc<dyn DnsResolver>>,
    transport: Option<Arc<dyn HttpTransport>>,
    queue: Option<Arc<dyn DeliveryQueue>>,
    limiter: Option<Arc<Semaphore>>,
}

impl WebhooksBuilder {
    pub fn config(mut self, config: DeliveryConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: Arc<dyn SubscriptionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cipher(mut self, cipher: Arc<dyn SecretCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn DnsResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn queue(mut self, queue: Arc<dyn DeliveryQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Share an in-flight limiter instead of creating one of `max_in_flight` permits
    pub fn limiter(mut self, limiter: Arc<Semaphore>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn build(self) -> Result<Webhooks, WebhookError> {
        use courier_config::Validate;

        let config = self.config.unwrap_or_default();
        config.validate()?;

        let store = self
            .store
            .ok_or(WebhookError::MissingCollaborator("subscription store"))?;
        let cipher = self
            .cipher
            .ok_or(WebhookError::MissingCollaborator("secret cipher"))?;
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(SystemResolver) as Arc<dyn DnsResolver>);
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&config)?),
        };

        let guard = NetworkGuard::new(resolver);

        let mut engine = DeliveryEngine::new(config.clone(), guard.clone(), Arc::clone(&cipher), transport)
            .with_store(Arc::clone(&store));
        if let Some(limiter) = self.limiter {
            engine = engine.with_concurrency_limit(limiter);
        }

        let mut dispatcher = Dispatcher::new(Arc::clone(&store), Arc::new(engine), &config);
        if let Some(queue) = self.queue {
            dispatcher = dispatcher.with_queue(queue);
        }

        let registrar = SubscriptionRegistrar::new(guard, cipher, store, config.min_secret_length);

        Ok(Webhooks {
            config,
            registrar,
            dispatcher,
        })
    }
}
