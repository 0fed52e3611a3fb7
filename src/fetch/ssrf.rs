//! SSRF guard for outbound fetches.
//!
//! Every outbound request passes through `UrlValidator::validate` before any
//! socket is opened. The validator parses the URL, resolves the hostname,
//! and refuses any address in a disallowed range: loopback, link-local,
//! RFC1918 private, unique-local, IPv4-mapped forms of those, and the cloud
//! metadata endpoints. An explicit allow-list overrides the deny rules so
//! tests and trusted internal fixtures can opt out.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use tracing::warn;
use url::{Host, Url};

use crate::config::ServiceConfig;
use crate::error::{SiftError, SiftResult};

/// AWS-style IPv4 metadata endpoint. Technically link-local, listed
/// separately so the refusal reason names it.
const METADATA_V4: Ipv4Addr = Ipv4Addr::new(169, 254, 169, 254);

/// EC2 IPv6 metadata endpoint.
const METADATA_V6: Ipv6Addr = Ipv6Addr::new(0xfd00, 0x0ec2, 0, 0, 0, 0, 0, 0x254);

/// Validates URLs against SSRF targets before any fetch.
#[derive(Debug, Clone)]
pub struct UrlValidator {
    allow_hosts: Arc<Vec<String>>,
}

impl UrlValidator {
    #[must_use]
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            allow_hosts: Arc::new(config.allow_hosts().to_vec()),
        }
    }

    /// Parse and validate a URL for outbound fetching.
    ///
    /// Resolves the hostname and checks every returned address; a single
    /// disallowed address fails the whole URL (DNS answers cannot smuggle a
    /// private address in among public ones).
    ///
    /// # Errors
    ///
    /// `InvalidUrl` for unparseable or non-http(s) input, `SsrfBlocked` when
    /// any resolved address lands in a denied range.
    pub async fn validate(&self, raw: &str) -> SiftResult<Url> {
        let url = Url::parse(raw).map_err(|e| SiftError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(SiftError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let host = url.host().ok_or_else(|| SiftError::InvalidUrl {
            url: raw.to_string(),
            reason: "URL has no host".to_string(),
        })?;

        let host_str = url.host_str().unwrap_or_default().to_lowercase();
        if self.allow_hosts.iter().any(|h| h == &host_str) {
            return Ok(url);
        }

        let port = url.port_or_known_default().unwrap_or(80);

        let addresses: Vec<IpAddr> = match host {
            Host::Ipv4(addr) => vec![IpAddr::V4(addr)],
            Host::Ipv6(addr) => vec![IpAddr::V6(addr)],
            Host::Domain(domain) => {
                let resolved = tokio::net::lookup_host((domain, port)).await.map_err(|e| {
                    SiftError::Network {
                        url: raw.to_string(),
                        reason: format!("DNS resolution failed: {e}"),
                    }
                })?;
                resolved.map(|sa: SocketAddr| sa.ip()).collect()
            }
        };

        if addresses.is_empty() {
            return Err(SiftError::Network {
                url: raw.to_string(),
                reason: "DNS returned no addresses".to_string(),
            });
        }

        for addr in &addresses {
            if let Some(reason) = deny_reason(*addr) {
                warn!(url = raw, address = %addr, reason, "refusing SSRF target");
                return Err(SiftError::SsrfBlocked {
                    url: raw.to_string(),
                    reason: format!("{addr}: {reason}"),
                });
            }
        }

        Ok(url)
    }
}

/// Why an address is denied, or `None` when it is routable and safe.
fn deny_reason(addr: IpAddr) -> Option<&'static str> {
    match addr {
        IpAddr::V4(v4) => deny_reason_v4(v4),
        IpAddr::V6(v6) => {
            // IPv4-mapped addresses inherit the mapped address's verdict.
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return deny_reason_v4(mapped);
            }
            if v6 == METADATA_V6 {
                return Some("cloud metadata endpoint");
            }
            if v6.is_loopback() {
                return Some("loopback address");
            }
            if v6.is_unspecified() {
                return Some("unspecified address");
            }
            // Unique-local fc00::/7.
            if (v6.segments()[0] & 0xfe00) == 0xfc00 {
                return Some("unique-local address");
            }
            // Link-local fe80::/10.
            if (v6.segments()[0] & 0xffc0) == 0xfe80 {
                return Some("link-local address");
            }
            None
        }
    }
}

fn deny_reason_v4(addr: Ipv4Addr) -> Option<&'static str> {
    if addr == METADATA_V4 {
        return Some("cloud metadata endpoint");
    }
    if addr.is_loopback() {
        return Some("loopback address");
    }
    if addr.is_unspecified() {
        return Some("unspecified address");
    }
    if addr.is_private() {
        return Some("private (RFC1918) address");
    }
    if addr.is_link_local() {
        return Some("link-local address");
    }
    if addr.is_broadcast() {
        return Some("broadcast address");
    }
    None
}
