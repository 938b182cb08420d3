//! Network safety validation for subscriber URLs
//!
//! The same classification runs when a subscription is registered and again
//! before every delivery attempt, since DNS answers can change in between.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use url::{Host, Url};

use crate::error::{ResolveError, SafetyError};

/// Hostnames rejected before any resolution happens
const LOCALHOST_ALIASES: [&str; 4] = ["localhost", "127.0.0.1", "::1", "0.0.0.0"];

/// Resolves a hostname to every address it maps to.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve_all(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError>;
}

/// Resolver backed by the operating system via `tokio::net::lookup_host`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl DnsResolver for SystemResolver {
    async fn resolve_all(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        let answers = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| ResolveError::Lookup(e.to_string()))?;

        let mut addresses: Vec<IpAddr> = Vec::new();
        for addr in answers {
            let ip = addr.ip();
            if !addresses.contains(&ip) {
                addresses.push(ip);
            }
        }

        if addresses.is_empty() {
            return Err(ResolveError::NoAddresses);
        }
        Ok(addresses)
    }
}

/// Whether an address is loopback, private, link-local, unspecified or
/// otherwise not routable on the public internet.
pub fn is_reserved_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_reserved_ipv4(v4),
        IpAddr::V6(v6) => is_reserved_ipv6(v6),
    }
}

fn is_reserved_ipv4(ip: &Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();

    ip.is_loopback()            // 127.0.0.0/8
        || ip.is_private()      // 10/8, 172.16/12, 192.168/16
        || ip.is_link_local()   // 169.254/16
        || a == 0               // 0.0.0.0/8
        || (a == 100 && (64..128).contains(&b)) // 100.64/10 carrier-grade NAT
        || ip.is_broadcast()
}

fn is_reserved_ipv6(ip: &Ipv6Addr) -> bool {
    if let Some(v4) = embedded_ipv4(ip) {
        return is_reserved_ipv4(&v4);
    }

    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xffc0) == 0xfe80 // fe80::/10 link-local
        || (first & 0xfe00) == 0xfc00 // fc00::/7 unique local
}

/// IPv4 address carried by a mapped (`::ffff:0:0/96`), compatible
/// (`::/96`), NAT64 (`64:ff9b::/96`) or 6to4 (`2002::/16`) address
fn embedded_ipv4(ip: &Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return Some(v4);
    }

    let segments = ip.segments();
    let low32 = (u32::from(segments[6]) << 16) | u32::from(segments[7]);

    match segments {
        // :: and ::1 keep their IPv6 meaning
        [0, 0, 0, 0, 0, 0, ..] if !ip.is_loopback() && !ip.is_unspecified() => {
            Some(Ipv4Addr::from(low32))
        }
        [0x64, 0xff9b, 0, 0, 0, 0, ..] => Some(Ipv4Addr::from(low32)),
        [0x2002, high, low, ..] => Some(Ipv4Addr::from(
            (u32::from(high) << 16) | u32::from(low),
        )),
        _ => None,
    }
}

fn is_localhost_alias(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    LOCALHOST_ALIASES.contains(&host.as_str())
}

/// Classifies destination URLs against the reserved address space.
#[derive(Clone)]
pub struct NetworkGuard {
    resolver: Arc<dyn DnsResolver>,
}

impl std::fmt::Debug for NetworkGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkGuard").finish_non_exhaustive()
    }
}

impl NetworkGuard {
    pub fn new(resolver: Arc<dyn DnsResolver>) -> Self {
        Self { resolver }
    }

    /// Guard using the system resolver
    pub fn system() -> Self {
        Self::new(Arc::new(SystemResolver))
    }

    /// Parse `raw` and classify it.
    pub async fn classify_str(&self, raw: &str) -> Result<Vec<IpAddr>, SafetyError> {
        let url = Url::parse(raw).map_err(|e| SafetyError::InvalidUrl(format!("{raw}: {e}")))?;
        self.classify(&url).await
    }

    /// Classify a URL, returning every address it maps to when all of them
    /// are publicly routable.
    pub async fn classify(&self, url: &Url) -> Result<Vec<IpAddr>, SafetyError> {
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(SafetyError::InvalidUrl(format!(
                    "scheme '{other}' is not allowed; use http or https"
                )));
            }
        }

        let host = url
            .host()
            .ok_or_else(|| SafetyError::InvalidUrl(format!("{url} has no host")))?;

        match host {
            Host::Ipv4(ip) => classify_literal(IpAddr::V4(ip)),
            Host::Ipv6(ip) => classify_literal(IpAddr::V6(ip)),
            Host::Domain(name) => self.classify_domain(name).await,
        }
    }

    async fn classify_domain(&self, name: &str) -> Result<Vec<IpAddr>, SafetyError> {
        if is_localhost_alias(name) {
            return Err(SafetyError::LocalhostDenied(name.to_string()));
        }

        let addresses = self
            .resolver
            .resolve_all(name)
            .await
            .map_err(|e| SafetyError::DnsLookupFailed {
                host: name.to_string(),
                reason: e.to_string(),
            })?;

        if addresses.is_empty() {
            return Err(SafetyError::DnsLookupFailed {
                host: name.to_string(),
                reason: ResolveError::NoAddresses.to_string(),
            });
        }

        if let Some(address) = addresses.iter().find(|ip| is_reserved_ip(ip)) {
            debug!(host = %name, address = %address, "Resolved address is reserved");
            return Err(SafetyError::PrivateIpDenied {
                host: name.to_string(),
                address: *address,
            });
        }

        Ok(addresses)
    }
}

fn classify_literal(ip: IpAddr) -> Result<Vec<IpAddr>, SafetyError> {
    let literal = ip.to_string();
    if LOCALHOST_ALIASES.contains(&literal.as_str()) {
        return Err(SafetyError::LocalhostDenied(literal));
    }
    if is_reserved_ip(&ip) {
        return Err(SafetyError::PrivateIpDenied {
            host: literal,
            address: ip,
        });
    }
    Ok(vec![ip])
}
