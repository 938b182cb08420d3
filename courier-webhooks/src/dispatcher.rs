//! Routing of events to matching subscriptions

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::DeliveryConfig;
use crate::delivery::{DeliveryEngine, DeliveryReport};
use crate::error::DeliveryError;
use crate::event::WebhookEvent;
use crate::queue::{Backoff, DeliveryJob, DeliveryQueue, EnqueueOptions, JobData};
use crate::store::SubscriptionStore;
use crate::subscription::WebhookSubscription;

/// Result of routing one event.
///
/// Dropping the report leaves in-process deliveries running in the
/// background.
#[derive(Debug, Default)]
pub struct EmitReport {
    /// Active subscriptions that matched the event
    pub matched: usize,

    /// Deliveries handed to the durable queue
    pub queued: usize,

    /// Deliveries running on the in-process scheduler
    pub spawned: usize,

    handles: Vec<JoinHandle<DeliveryReport>>,
}

impl EmitReport {
    /// Wait for every in-process delivery to reach a terminal state
    pub async fn wait(self) -> Vec<DeliveryReport> {
        join_all(self.handles)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(report) => Some(report),
                Err(e) => {
                    error!(error = %e, "Webhook delivery task aborted");
                    None
                }
            })
            .collect()
    }
}

/// Fans events out to subscribers without ever failing the producer.
pub struct Dispatcher {
    store: Arc<dyn SubscriptionStore>,
    engine: Arc<DeliveryEngine>,
    queue: Option<Arc<dyn DeliveryQueue>>,
    job_name: String,
    enqueue_options: EnqueueOptions,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn SubscriptionStore>, engine: Arc<DeliveryEngine>, config: &DeliveryConfig) -> Self {
        Self {
            store,
            engine,
            queue: None,
            job_name: config.job_name.clone(),
            enqueue_options: EnqueueOptions {
                attempts: config.max_attempts,
                backoff: Backoff::Exponential {
                    base: config.backoff_base,
                },
            },
        }
    }

    /// Route deliveries through a durable queue instead of the in-process scheduler
    pub fn with_queue(mut self, queue: Arc<dyn DeliveryQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn engine(&self) -> &Arc<DeliveryEngine> {
        &self.engine
    }

    /// Deliver `event` to every active subscription of its tenant whose
    /// filter matches. Returns once every delivery has been routed.
    pub async fn emit(&self, event: WebhookEvent) -> EmitReport {
        let subscriptions = match self
            .store
            .find_active_by_tenant_and_event(&event.tenant_id, event.event_type)
            .await
        {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                error!(
                    tenant_id = %event.tenant_id,
                    event_type = %event.event_type,
                    error = %e,
                    "Failed to look up webhook subscriptions"
                );
                return EmitReport::default();
            }
        };

        let mut report = EmitReport {
            matched: subscriptions.len(),
            ..Default::default()
        };

        debug!(
            tenant_id = %event.tenant_id,
            event_type = %event.event_type,
            matched = report.matched,
            "Routing webhook event"
        );

        for subscription in subscriptions {
            match &self.queue {
                Some(queue) => match self.enqueue(queue.as_ref(), &subscription, &event).await {
                    Ok(()) => report.queued += 1,
                    Err(e) => {
                        warn!(
                            subscription_id = %subscription.id,
                            event_type = %event.event_type,
                            error = %e,
                            "Enqueue failed, delivering in-process"
                        );
                        report.handles.push(self.spawn(subscription, event.clone()));
                        report.spawned += 1;
                    }
                },
                None => {
                    report.handles.push(self.spawn(subscription, event.clone()));
                    report.spawned += 1;
                }
            }
        }

        report
    }

    async fn enqueue(
        &self,
        queue: &dyn DeliveryQueue,
        subscription: &WebhookSubscription,
        event: &WebhookEvent,
    ) -> Result<(), crate::error::QueueError> {
        let payload = DeliveryJob::new(subscription.clone(), event.clone()).to_payload()?;
        queue
            .enqueue(&self.job_name, payload, self.enqueue_options)
            .await
    }

    fn spawn(&self, subscription: WebhookSubscription, event: WebhookEvent) -> JoinHandle<DeliveryReport> {
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move { engine.deliver(subscription, event).await })
    }

    /// Queue worker entry point: one attempt for one job.
    ///
    /// The error is returned so the queue can apply its own retry policy.
    pub async fn process_job(&self, payload: JobData) -> Result<(), DeliveryError> {
        let DeliveryJob {
            mut subscription,
            event,
        } = DeliveryJob::from_payload(payload)
            .map_err(|e| DeliveryError::Serialization(e.to_string()))?;

        self.refresh_pins(&mut subscription).await;

        match self.engine.deliver_once(&mut subscription, &event).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(
                    subscription_id = %subscription.id,
                    event_type = %event.event_type,
                    code = e.code(),
                    error = %e,
                    "Queued webhook attempt failed"
                );
                Err(e)
            }
        }
    }

    /// A job enqueued before its subscription was pinned carries no
    /// addresses; pick up whatever has been cached in the store since.
    async fn refresh_pins(&self, subscription: &mut WebhookSubscription) {
        if !subscription.resolved_addresses.is_empty() {
            return;
        }

        match self.store.find_by_id(&subscription.id).await {
            Ok(Some(stored)) if !stored.resolved_addresses.is_empty() => {
                subscription.resolved_addresses = stored.resolved_addresses;
                subscription.addresses_resolved_at = stored.addresses_resolved_at;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    subscription_id = %subscription.id,
                    error = %e,
                    "Failed to refresh pinned addresses"
                );
            }
        }
    }
}
