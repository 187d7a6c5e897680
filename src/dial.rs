//! Dialing through the resolution engine.
//!
//! The dialer is the integration point for anything opening outbound
//! connections: it resolves the target host through [`Resolver`] and tries
//! each resolved address in the coordinator's order until one connects.
//! HTTP clients plug it in through the [`Dial`] trait so every outbound
//! connection routes through this engine instead of the platform resolver.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::net::TcpStream;

use crate::error::DialError;
use crate::resolver::Resolver;

/// Object-safe dial seam for HTTP transports and other collaborators.
pub trait Dial: Send + Sync {
    /// Dial `target` (`host:port`) on `network` (`tcp`, `tcp4`, `tcp6`).
    fn dial<'a>(
        &'a self,
        network: &'a str,
        target: &'a str,
    ) -> BoxFuture<'a, Result<TcpStream, DialError>>;
}

/// Connection factory backed by the stub resolver.
///
/// Establishes a fresh connection per call; pooling is the HTTP layer's
/// job, not this engine's.
#[derive(Debug, Clone)]
pub struct DnsDialer {
    resolver: Arc<Resolver>,
}

impl DnsDialer {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }

    /// The resolver backing this dialer.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolve the host portion of `target` and connect to the first
    /// address that accepts.
    ///
    /// A malformed target fails immediately with no network attempt. When
    /// every resolved address refuses, the last connection error is
    /// surfaced; when resolution leaves no candidate for the requested
    /// network, the failure is a distinct no-route error.
    pub async fn dial(&self, network: &str, target: &str) -> Result<TcpStream, DialError> {
        let family = match network {
            "tcp" => None,
            "tcp4" => Some(false),
            "tcp6" => Some(true),
            other => return Err(DialError::UnsupportedNetwork(other.to_string())),
        };

        let (host, port) = split_host_port(target)?;
        let resolution = self.resolver.resolve(host).await?;

        let candidates: Vec<IpAddr> = resolution
            .addrs
            .iter()
            .copied()
            .filter(|ip| match family {
                Some(want_v6) => ip.is_ipv6() == want_v6,
                None => true,
            })
            .collect();

        let mut last: Option<io::Error> = None;
        for ip in candidates {
            match TcpStream::connect(SocketAddr::new(ip, port)).await {
                Ok(conn) => {
                    tracing::debug!(target, %ip, "dialed");
                    return Ok(conn);
                }
                Err(err) => last = Some(err),
            }
        }

        match last {
            Some(err) => Err(DialError::Connect(err)),
            None => Err(DialError::NoRouteToHost {
                host: host.to_string(),
            }),
        }
    }
}

impl Dial for DnsDialer {
    fn dial<'a>(
        &'a self,
        network: &'a str,
        target: &'a str,
    ) -> BoxFuture<'a, Result<TcpStream, DialError>> {
        Box::pin(DnsDialer::dial(self, network, target))
    }
}

/// Split `host:port` or `[v6]:port` into host and port.
fn split_host_port(target: &str) -> Result<(&str, u16), DialError> {
    let invalid = || DialError::InvalidTarget {
        target: target.to_string(),
    };

    if let Some(rest) = target.strip_prefix('[') {
        let (host, rest) = rest.split_once(']').ok_or_else(invalid)?;
        let port = rest.strip_prefix(':').ok_or_else(invalid)?;
        let port = port.parse().map_err(|_| invalid())?;
        if host.is_empty() {
            return Err(invalid());
        }
        return Ok((host, port));
    }

    let (host, port) = target.rsplit_once(':').ok_or_else(invalid)?;
    // An unbracketed IPv6 literal has more than one colon; reject it the
    // way host:port splitting traditionally does.
    if host.is_empty() || host.contains(':') {
        return Err(invalid());
    }
    let port = port.parse().map_err(|_| invalid())?;
    Ok((host, port))
}
