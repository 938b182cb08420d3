//! Durable queue handoff
//!
//! When a queue is configured the dispatcher enqueues one job per matching
//! subscription and the queue's own retry settings govern re-attempts.
//! Workers hand each job back to [`Dispatcher::process_job`](crate::Dispatcher::process_job).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::QueueError;
use crate::event::WebhookEvent;
use crate::subscription::WebhookSubscription;

/// Job payload as stored by the queue
pub type JobData = serde_json::Value;

/// One delivery job: a subscription snapshot plus the event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryJob {
    pub subscription: WebhookSubscription,
    pub event: WebhookEvent,
}

impl DeliveryJob {
    pub fn new(subscription: WebhookSubscription, event: WebhookEvent) -> Self {
        Self {
            subscription,
            event,
        }
    }

    pub fn to_payload(&self) -> Result<JobData, QueueError> {
        serde_json::to_value(self).map_err(|e| QueueError::MalformedPayload(e.to_string()))
    }

    pub fn from_payload(payload: JobData) -> Result<Self, QueueError> {
        serde_json::from_value(payload).map_err(|e| QueueError::MalformedPayload(e.to_string()))
    }
}

/// Backoff the queue applies between its own attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Exponential { base: Duration },
}

/// Retry settings passed with each enqueued job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOptions {
    pub attempts: u32,
    pub backoff: Backoff,
}

/// External durable queue.
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    async fn enqueue(
        &self,
        job_name: &str,
        payload: JobData,
        options: EnqueueOptions,
    ) -> Result<(), QueueError>;
}
