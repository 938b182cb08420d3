//! Outbound HTTP transport

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, redirect};
use thiserror::Error;
use url::{Host, Url};

use crate::config::DeliveryConfig;
use crate::error::{DeliveryError, WebhookError};

/// A fully signed webhook request ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: Url,

    /// Addresses vetted for `url`'s host; the connection must use one of them
    pub addresses: Vec<IpAddr>,

    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl OutboundRequest {
    /// Value of the first header named `name`, ignoring ASCII case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What the subscriber answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,

    /// `Location` header, kept for logging rejected redirects
    pub location: Option<String>,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            location: None,
        }
    }
}

/// Failure before any response was received
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Network(String),
}

impl From<TransportError> for DeliveryError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => DeliveryError::Timeout,
            TransportError::Network(message) => DeliveryError::Network(message),
        }
    }
}

/// Sends one POST and reports the raw status. Implementations must not
/// follow redirects.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError>;
}

/// Transport over `reqwest` that connects only to the vetted addresses.
///
/// Each request gets its own client with the destination host mapped to the
/// addresses carried by the request, so the client never runs its own DNS
/// lookup. Pooling and proxies are disabled for the same reason.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    timeout: Duration,
    user_agent: String,
}

impl ReqwestTransport {
    /// Build a transport from the delivery configuration
    pub fn new(config: &DeliveryConfig) -> Result<Self, WebhookError> {
        let transport = Self {
            timeout: config.request_timeout,
            user_agent: config.user_agent.clone(),
        };
        transport.client_builder().build()?;
        Ok(transport)
    }

    fn client_builder(&self) -> ClientBuilder {
        Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .redirect(redirect::Policy::none())
            .pool_max_idle_per_host(0)
            .no_proxy()
    }

    fn pinned_client(&self, request: &OutboundRequest) -> Result<Client, TransportError> {
        if request.addresses.is_empty() {
            return Err(TransportError::Network(format!(
                "no vetted addresses for {}",
                request.url
            )));
        }

        let mut builder = self.client_builder();
        if let Some(Host::Domain(domain)) = request.url.host() {
            let port = request.url.port_or_known_default().unwrap_or(0);
            let pinned: Vec<SocketAddr> = request
                .addresses
                .iter()
                .map(|ip| SocketAddr::new(*ip, port))
                .collect();
            builder = builder.resolve_to_addrs(domain, &pinned);
        }

        builder
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let client = self.pinned_client(&request)?;

        let mut builder = client.post(request.url);
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.body(request.body).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(TransportResponse {
            status: response.status().as_u16(),
            location,
        })
    }
}
