//! Webhook signature generation and verification

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Signs outgoing webhook bodies.
///
/// The signature is `hex(HMAC-SHA256(secret, "{timestamp}.{body}"))`, where
/// `timestamp` is the decimal Unix time in milliseconds sent alongside it.
#[derive(Clone)]
pub struct WebhookSigner {
    secret: String,
}

impl std::fmt::Debug for WebhookSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebhookSigner { .. }")
    }
}

impl WebhookSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Signature for `body` sent at `timestamp_ms`
    pub fn sign(&self, timestamp_ms: i64, body: &[u8]) -> String {
        hex::encode(mac_for(&self.secret, timestamp_ms, body).finalize().into_bytes())
    }
}

fn mac_for(secret: &str, timestamp_ms: i64, body: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take any size key");
    mac.update(timestamp_ms.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    mac
}

/// Why an incoming signature was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Invalid timestamp header: {0}")]
    MalformedTimestamp(String),

    #[error("Signature is not valid hex")]
    MalformedSignature,

    #[error("Timestamp outside tolerance: {age_ms} ms old (tolerance: {tolerance_ms} ms)")]
    Expired { age_ms: u64, tolerance_ms: u64 },

    #[error("Signature mismatch")]
    Mismatch,
}

/// Subscriber-side check of a delivered webhook.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_ms: Option<u64>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_ms", &self.tolerance_ms)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Verifier that accepts any timestamp
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_ms: None,
        }
    }

    /// Reject timestamps further than `tolerance_ms` from now
    pub fn with_tolerance_ms(mut self, tolerance_ms: u64) -> Self {
        self.tolerance_ms = Some(tolerance_ms);
        self
    }

    /// Verify raw header values against the raw body
    pub fn verify(
        &self,
        timestamp_header: &str,
        signature_header: &str,
        body: &[u8],
    ) -> Result<(), VerificationError> {
        self.verify_at(
            timestamp_header,
            signature_header,
            body,
            chrono::Utc::now().timestamp_millis(),
        )
    }

    /// Same as [`verify`](Self::verify) with an explicit current time
    pub fn verify_at(
        &self,
        timestamp_header: &str,
        signature_header: &str,
        body: &[u8],
        now_ms: i64,
    ) -> Result<(), VerificationError> {
        let timestamp_ms: i64 = timestamp_header
            .trim()
            .parse()
            .map_err(|_| VerificationError::MalformedTimestamp(timestamp_header.to_string()))?;

        if let Some(tolerance_ms) = self.tolerance_ms {
            let age_ms = now_ms.abs_diff(timestamp_ms);
            if age_ms > tolerance_ms {
                return Err(VerificationError::Expired {
                    age_ms,
                    tolerance_ms,
                });
            }
        }

        let expected =
            hex::decode(signature_header.trim()).map_err(|_| VerificationError::MalformedSignature)?;

        // Constant-time comparison
        mac_for(&self.secret, timestamp_ms, body)
            .verify_slice(&expected)
            .map_err(|_| VerificationError::Mismatch)
    }
}

/// Header names used on outgoing webhook requests
pub mod headers {
    pub const SIGNATURE: &str = "X-Webhook-Signature";

    /// Unix time in milliseconds that was signed
    pub const TIMESTAMP: &str = "X-Webhook-Timestamp";

    pub const EVENT_TYPE: &str = "X-Webhook-Event";

    pub const CONTENT_TYPE: &str = "Content-Type";
}
