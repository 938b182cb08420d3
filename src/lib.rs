// Courier - outbound webhook delivery for multi-tenant backends
//
// Turns domain events into signed HTTP callbacks to tenant endpoints, with
// SSRF and DNS-rebinding protection, bounded retries and bounded fan-out.

// Re-export the delivery core
pub use courier_webhooks::*;

// Re-export optional crates
#[cfg(feature = "config")]
pub use courier_config;

#[cfg(feature = "log")]
pub use courier_log;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        AesGcmCipher,
        DeliveryConfig,
        DeliveryError,
        // Collaborator seams
        DeliveryQueue,
        DnsResolver,
        EmitReport,
        EventType,
        HttpTransport,
        InMemorySubscriptionStore,
        RegisterSubscription,
        RegistrationError,
        SecretCipher,
        SubscriptionStore,
        WebhookEvent,
        WebhookSubscription,
        Webhooks,
        WebhooksBuilder,
    };
}
