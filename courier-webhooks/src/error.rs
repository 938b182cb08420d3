//! Error types for webhook registration and delivery
//!
//! Every error a caller can act on carries a stable `code()` so API layers
//! can surface it without matching on display strings.

use std::net::IpAddr;

use courier_config::ConfigError;
use thiserror::Error;

/// Rejection raised by the network safety validator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SafetyError {
    /// URL could not be parsed, has no host, or uses a scheme other than http/https
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Host is a loopback alias (`localhost`, `127.0.0.1`, `::1`, `0.0.0.0`)
    #[error("Destination host {0} is a loopback alias")]
    LocalhostDenied(String),

    /// Host is, or resolves to, a private or reserved address
    #[error("Destination host {host} maps to reserved address {address}")]
    PrivateIpDenied { host: String, address: IpAddr },

    /// Host could not be resolved; unresolved hosts are never delivered to
    #[error("DNS lookup failed for {host}: {reason}")]
    DnsLookupFailed { host: String, reason: String },
}

impl SafetyError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "invalid_url",
            Self::LocalhostDenied(_) => "localhost_denied",
            Self::PrivateIpDenied { .. } => "private_ip_denied",
            Self::DnsLookupFailed { .. } => "dns_lookup_failed",
        }
    }
}

/// Synchronous failures of `register()`. Nothing is persisted when one occurs.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error(transparent)]
    Unsafe(#[from] SafetyError),

    #[error("Secret must be at least {min} characters (got {actual})")]
    SecretLength { min: usize, actual: usize },

    #[error("Invalid event filter: {0}")]
    EventTypes(String),

    #[error("Failed to encrypt secret: {0}")]
    Encryption(#[from] CipherError),

    #[error("Failed to persist subscription: {0}")]
    Store(#[from] StoreError),
}

impl RegistrationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unsafe(e) => e.code(),
            Self::SecretLength { .. } => "secret_length",
            Self::EventTypes(_) => "event_types",
            Self::Encryption(_) => "encryption_failed",
            Self::Store(_) => "store_error",
        }
    }
}

/// Failure of a single delivery attempt. Every variant is retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Pre-delivery re-validation rejected the destination
    #[error(transparent)]
    Unsafe(#[from] SafetyError),

    /// The host now resolves outside the addresses vetted at registration
    #[error("DNS answer for {host} changed to unvetted address {address}")]
    DnsRebindingDetected { host: String, address: IpAddr },

    #[error("Failed to decrypt subscription secret: {0}")]
    Decryption(String),

    #[error("Failed to serialize event: {0}")]
    Serialization(String),

    /// Subscriber answered 3xx; redirects are never followed
    #[error("Subscriber answered redirect {status}; redirects are not followed")]
    RedirectNotAllowed {
        status: u16,
        location: Option<String>,
    },

    /// Subscriber answered with a non-2xx, non-3xx status
    #[error("Subscriber answered HTTP {0}")]
    HttpStatus(u16),

    #[error("Request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Network(String),

    /// The in-flight limiter was closed (process shutting down)
    #[error("Delivery limiter closed")]
    LimiterClosed,
}

impl DeliveryError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unsafe(e) => e.code(),
            Self::DnsRebindingDetected { .. } => "dns_rebinding_detected",
            Self::Decryption(_) => "decryption_failed",
            Self::Serialization(_) => "serialization_failed",
            Self::RedirectNotAllowed { .. } => "redirect_not_allowed",
            Self::HttpStatus(_) => "http_status",
            Self::Timeout => "timeout",
            Self::Network(_) => "network_error",
            Self::LimiterClosed => "limiter_closed",
        }
    }

    /// HTTP status carried by the failure, if the subscriber answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RedirectNotAllowed { status, .. } => Some(*status),
            Self::HttpStatus(status) => Some(*status),
            _ => None,
        }
    }
}

/// Failure reported by the DNS resolver collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no addresses returned")]
    NoAddresses,

    #[error("{0}")]
    Lookup(String),
}

/// Failure reported by the secret encryption collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// Failure reported by the subscription store collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("subscription not found: {0}")]
    NotFound(String),

    #[error("subscription already exists: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by the durable queue collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("enqueue rejected: {0}")]
    Rejected(String),

    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("malformed job payload: {0}")]
    MalformedPayload(String),
}

/// Errors raised while assembling the webhook service
#[derive(Error, Debug)]
pub enum WebhookError {
    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A required collaborator was not supplied to the builder
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),
}
