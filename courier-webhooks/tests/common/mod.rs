//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use courier_webhooks::*;
use std::result::Result;
use tokio::time::Instant;

pub const SECRET: &str = "whsec_0123456789abcdef0123456789abcdef";
pub const PUBLIC_IP: &str = "93.184.216.34";
pub const OTHER_PUBLIC_IP: &str = "151.101.1.69";

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

pub fn cipher() -> Arc<AesGcmCipher> {
    Arc::new(AesGcmCipher::new(&[0x42u8; 32]).unwrap())
}

/// Resolver answering from a mutable host map
#[derive(Default)]
pub struct StaticResolver {
    answers: Mutex<HashMap<String, Vec<IpAddr>>>,
    lookups: AtomicUsize,
}

impl StaticResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(host: &str, addresses: &[&str]) -> Arc<Self> {
        let resolver = Self::new();
        resolver.set(host, addresses);
        resolver
    }

    pub fn set(&self, host: &str, addresses: &[&str]) {
        self.answers
            .lock()
            .unwrap()
            .insert(host.to_string(), addresses.iter().map(|a| ip(a)).collect());
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsResolver for StaticResolver {
    async fn resolve_all(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .get(host)
            .cloned()
            .ok_or_else(|| ResolveError::Lookup(format!("no such host: {host}")))
    }
}

/// A request the transport received, with the (tokio) time it arrived
#[derive(Debug, Clone)]
pub struct Recorded {
    pub request: OutboundRequest,
    pub at: Instant,
}

/// Transport that records requests and replays scripted outcomes.
/// Once the script runs out every request answers 200.
#[derive(Default)]
pub struct RecordingTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    requests: Mutex<Vec<Recorded>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripted(
        outcomes: impl IntoIterator<Item = Result<TransportResponse, TransportError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..Default::default()
        })
    }

    /// Every request takes `latency` to answer
    pub fn slow(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency: Some(latency),
            ..Default::default()
        })
    }

    pub fn slow_scripted(
        latency: Duration,
        outcomes: impl IntoIterator<Item = Result<TransportResponse, TransportError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            latency: Some(latency),
            ..Default::default()
        })
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn post(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.requests.lock().unwrap().push(Recorded {
            request,
            at: Instant::now(),
        });

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TransportResponse::new(200)));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// Queue that records every enqueue
#[derive(Default)]
pub struct RecordingQueue {
    pub jobs: Mutex<Vec<(String, JobData, EnqueueOptions)>>,
}

impl RecordingQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn jobs(&self) -> Vec<(String, JobData, EnqueueOptions)> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryQueue for RecordingQueue {
    async fn enqueue(
        &self,
        job_name: &str,
        payload: JobData,
        options: EnqueueOptions,
    ) -> Result<(), QueueError> {
        self.jobs
            .lock()
            .unwrap()
            .push((job_name.to_string(), payload, options));
        Ok(())
    }
}

/// Queue that rejects everything
pub struct FailingQueue;

#[async_trait]
impl DeliveryQueue for FailingQueue {
    async fn enqueue(&self, _: &str, _: JobData, _: EnqueueOptions) -> Result<(), QueueError> {
        Err(QueueError::Unavailable("connection refused".to_string()))
    }
}

/// Subscription for `url` pinned to `addresses`, with an encrypted secret
pub fn subscription(
    tenant_id: &str,
    url: &str,
    events: &[&str],
    addresses: &[&str],
) -> WebhookSubscription {
    let sealed = cipher().encrypt(SECRET).unwrap();
    WebhookSubscription::new(tenant_id, url::Url::parse(url).unwrap(), sealed, events.iter().copied())
        .with_resolved_addresses(addresses.iter().map(|a| ip(a)).collect(), chrono::Utc::now())
}

/// Fast config for tests: tiny backoff, short timeout
pub fn test_config() -> DeliveryConfig {
    DeliveryConfig::builder()
        .request_timeout(Duration::from_millis(500))
        .backoff_base(Duration::from_millis(10))
        .build()
}

pub fn engine(
    config: DeliveryConfig,
    resolver: Arc<StaticResolver>,
    transport: Arc<RecordingTransport>,
) -> DeliveryEngine {
    DeliveryEngine::new(config, NetworkGuard::new(resolver), cipher(), transport)
}
