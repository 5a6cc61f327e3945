//! Destination guard for outbound probes.
//!
//! Target URLs are user supplied, so every address a probe connects to is
//! checked against internal ranges. Hostnames are checked at resolution
//! time through [`GuardedResolver`], which the HTTP client consults for every
//! new connection; literal IP hosts never reach a resolver and are checked
//! with [`SsrfGuard::permits_host`] before the request and on each redirect.

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Decides whether an address may be dialed.
#[derive(Debug, Clone, Copy)]
pub struct SsrfGuard {
    allow_internal: bool,
}

impl SsrfGuard {
    /// Guard that rejects loopback, private, link-local and unspecified
    /// addresses.
    pub fn strict() -> Self {
        Self {
            allow_internal: false,
        }
    }

    /// Guard that lets everything through, for probing local test servers.
    #[cfg(test)]
    pub fn permissive() -> Self {
        Self {
            allow_internal: true,
        }
    }

    /// Whether a resolved address may be connected to.
    pub fn permits(&self, ip: IpAddr) -> bool {
        self.allow_internal || !is_internal(ip)
    }

    /// Whether a URL host may be connected to without resolution.
    ///
    /// Hostnames pass here; their addresses are checked by the resolver.
    pub fn permits_host(&self, host: &str) -> bool {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        match bare.parse::<IpAddr>() {
            Ok(ip) => self.permits(ip),
            Err(_) => true,
        }
    }
}

fn is_internal(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_internal_v4(v4),
            None => is_internal_v6(v6),
        },
    }
}

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        // 224.0.0.0/24 link-local multicast
        || (a == 224 && b == 0 && c == 0)
}

fn is_internal_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link-local unicast
        || (first & 0xffc0) == 0xfe80
        // ff02::/16 link-local multicast
        || first == 0xff02
}

/// DNS resolver that drops addresses the guard does not permit.
///
/// A name that resolves only to forbidden addresses fails like any other
/// lookup failure.
#[derive(Debug, Clone)]
pub struct GuardedResolver {
    guard: SsrfGuard,
}

impl GuardedResolver {
    pub fn new(guard: SsrfGuard) -> Self {
        Self { guard }
    }
}

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let guard = self.guard;
        Box::pin(async move {
            let host = name.as_str().to_string();
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await?
                .filter(|addr| guard.permits(addr.ip()))
                .collect();

            if addrs.is_empty() {
                tracing::debug!("No permitted address for {}", host);
                let err = io::Error::new(io::ErrorKind::AddrNotAvailable, "no usable address");
                return Err(Box::new(err) as BoxError);
            }

            Ok::<Addrs, BoxError>(Box::new(addrs.into_iter()))
        })
    }
}
