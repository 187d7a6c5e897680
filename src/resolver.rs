//! The resolution engine.
//!
//! Two layers live here. The per-type lookup drives one record type (A or
//! AAAA) across the server list: UDP first, TCP escalation on truncation
//! or transient failure, CNAME redirects followed up to a fixed hop bound.
//! On top of it the dual-stack coordinator races both families, merges and
//! deduplicates their answers, and shuffles the combined set so load
//! spreads across addresses.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::OptionFuture;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{Name, RData, RecordType};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rustc_hash::FxHashSet;

use crate::config::{Config, FamilyPolicy};
use crate::error::{ExchangeError, ResolveError};
use crate::exchange::{Transport, TransportPath, exchange};
use crate::servers::system_servers;

/// Hard bound on CNAME redirects for one lookup. This is the cycle
/// breaker: a redirect loop burns hops until it hits the bound, so no
/// visited-name set is needed.
const MAX_CNAME_HOPS: usize = 10;

/// Terminal status of a per-type lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    NoError,
    NxDomain,
    ServFail,
    Refused,
    FormErr,
    /// Any other rcode.
    Other(ResponseCode),
    /// The exchange timed out.
    Timeout,
    /// Socket-level failure (refused, unreachable, ...).
    Unreachable,
    /// NOERROR response carrying neither a matching address nor a CNAME.
    NoAnswer,
    /// The CNAME chain exceeded the hop bound.
    ChainLimit,
}

impl QueryStatus {
    fn from_rcode(rcode: ResponseCode) -> Self {
        match rcode {
            ResponseCode::NoError => QueryStatus::NoError,
            ResponseCode::NXDomain => QueryStatus::NxDomain,
            ResponseCode::ServFail => QueryStatus::ServFail,
            ResponseCode::Refused => QueryStatus::Refused,
            ResponseCode::FormErr => QueryStatus::FormErr,
            other => QueryStatus::Other(other),
        }
    }

    fn from_exchange(error: &ExchangeError) -> Self {
        match error {
            ExchangeError::Timeout => QueryStatus::Timeout,
            _ => QueryStatus::Unreachable,
        }
    }
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryStatus::NoError => f.write_str("NOERROR"),
            QueryStatus::NxDomain => f.write_str("NXDOMAIN"),
            QueryStatus::ServFail => f.write_str("SERVFAIL"),
            QueryStatus::Refused => f.write_str("REFUSED"),
            QueryStatus::FormErr => f.write_str("FORMERR"),
            QueryStatus::Other(rcode) => write!(f, "rcode {rcode:?}"),
            QueryStatus::Timeout => f.write_str("timeout"),
            QueryStatus::Unreachable => f.write_str("unreachable"),
            QueryStatus::NoAnswer => f.write_str("no answer"),
            QueryStatus::ChainLimit => f.write_str("cname chain too long"),
        }
    }
}

/// Result of one per-type lookup across the full server list.
///
/// Constructed fresh per call and discarded after the coordinator has
/// merged it; nothing is cached.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: QueryStatus,
    pub transport: TransportPath,
    pub addrs: Vec<IpAddr>,
}

impl Outcome {
    fn failed(status: QueryStatus, transport: TransportPath) -> Self {
        Self {
            status,
            transport,
            addrs: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        !self.addrs.is_empty()
    }
}

/// Per-call observability record: everything a logging collaborator needs
/// to format one resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The host as queried.
    pub host: String,
    /// Deduplicated, randomly ordered merged address set.
    pub addrs: Vec<IpAddr>,
    /// Outcome of the A lookup, if that family was queried.
    pub v4: Option<Outcome>,
    /// Outcome of the AAAA lookup, if that family was queried.
    pub v6: Option<Outcome>,
    /// Wall-clock time spent on the whole resolution.
    pub elapsed: Duration,
}

/// Stub DNS resolver: forwards questions to a fixed, ordered server list.
///
/// All fields are immutable after construction, so one resolver is freely
/// shared across concurrent callers without locking.
#[derive(Debug)]
pub struct Resolver {
    servers: Vec<SocketAddr>,
    timeout: Duration,
    family: FamilyPolicy,
}

impl Resolver {
    /// Build a resolver from configuration. The server list is computed
    /// here, once, and reused for the resolver's entire lifetime.
    pub fn new(config: &Config) -> Self {
        let servers = match &config.servers {
            Some(servers) if !servers.is_empty() => servers.clone(),
            _ => system_servers(),
        };
        Self {
            servers,
            timeout: config.timeout,
            family: config.family,
        }
    }

    /// Convenience: read `BEELINE_DNS_*` once and build from that.
    pub fn from_env() -> Self {
        Self::new(&Config::from_env())
    }

    /// The server list being consulted, in fallback order.
    pub fn servers(&self) -> &[SocketAddr] {
        &self.servers
    }

    /// Resolve `host` to a deduplicated, randomly ordered address set.
    ///
    /// Literal addresses short-circuit with no network I/O. Otherwise both
    /// configured families are queried concurrently and both always run to
    /// completion, so the merged set can carry both families when both
    /// answer. Fails only when every queried family fails, with a
    /// diagnostic naming each family's terminal status and transport path.
    pub async fn resolve(&self, host: &str) -> Result<Resolution, ResolveError> {
        let started = Instant::now();

        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(Resolution {
                host: host.to_string(),
                addrs: vec![ip],
                v4: None,
                v6: None,
                elapsed: started.elapsed(),
            });
        }

        let name = to_fqdn(host)?;

        let v4_fut: OptionFuture<_> = self
            .family
            .queries_v4()
            .then(|| self.lookup_type(name.clone(), RecordType::A))
            .into();
        let v6_fut: OptionFuture<_> = self
            .family
            .queries_v6()
            .then(|| self.lookup_type(name.clone(), RecordType::AAAA))
            .into();
        let (v4, v6) = futures::join!(v4_fut, v6_fut);

        let addrs = merge_addrs(v4.as_ref(), v6.as_ref());

        if addrs.is_empty() {
            let summary = failure_summary(v4.as_ref(), v6.as_ref());
            tracing::debug!(host, %summary, "resolution failed");
            return Err(ResolveError::NoAddresses {
                host: host.to_string(),
                summary,
            });
        }

        let resolution = Resolution {
            host: host.to_string(),
            addrs,
            v4,
            v6,
            elapsed: started.elapsed(),
        };
        tracing::debug!(
            host,
            servers = ?self.servers,
            addrs = ?resolution.addrs,
            v4 = ?resolution.v4,
            v6 = ?resolution.v6,
            elapsed_ms = resolution.elapsed.as_millis() as u64,
            "resolved"
        );
        Ok(resolution)
    }

    /// Resolve one record type, following CNAME redirects.
    ///
    /// Servers are tried strictly in list order; transports strictly
    /// UDP-then-TCP. Per-server failures are swallowed and kept only as
    /// last-error context; the lookup fails only on total exhaustion,
    /// except for NXDOMAIN, which is authoritative and terminates at once.
    async fn lookup_type(&self, name: Name, rtype: RecordType) -> Outcome {
        let mut current = name;
        let mut last_status = QueryStatus::NoAnswer;
        let mut last_path = TransportPath::Udp;

        for _hop in 0..MAX_CNAME_HOPS {
            let mut redirect: Option<Name> = None;

            for &server in &self.servers {
                let mut path = TransportPath::Udp;
                let udp = exchange(&current, rtype, Transport::Udp, server, self.timeout).await;

                let response = match udp {
                    Ok(resp) if resp.truncated() || is_transient(resp.response_code()) => {
                        // Truncated or transient: retry the identical
                        // question over TCP against the same server.
                        match exchange(&current, rtype, Transport::Tcp, server, self.timeout).await
                        {
                            Ok(tcp_resp) => {
                                path = TransportPath::UdpToTcp;
                                tcp_resp
                            }
                            Err(tcp_err) => {
                                last_status = if is_transient(resp.response_code()) {
                                    QueryStatus::from_rcode(resp.response_code())
                                } else {
                                    QueryStatus::from_exchange(&tcp_err)
                                };
                                last_path = TransportPath::UdpToTcp;
                                continue;
                            }
                        }
                    }
                    Ok(resp) => resp,
                    Err(_) => {
                        match exchange(&current, rtype, Transport::Tcp, server, self.timeout).await
                        {
                            Ok(tcp_resp) => {
                                path = TransportPath::UdpToTcp;
                                tcp_resp
                            }
                            Err(tcp_err) => {
                                last_status = QueryStatus::from_exchange(&tcp_err);
                                last_path = TransportPath::UdpToTcp;
                                continue;
                            }
                        }
                    }
                };
                last_path = path;

                match response.response_code() {
                    // Authoritative negative: stop immediately, do not
                    // consult the remaining servers.
                    ResponseCode::NXDomain => {
                        return Outcome::failed(QueryStatus::NxDomain, path);
                    }
                    ResponseCode::NoError => {
                        let mut addrs = Vec::new();
                        let mut cname: Option<Name> = None;
                        for record in response.answers() {
                            match record.data() {
                                RData::A(a) if rtype == RecordType::A => {
                                    addrs.push(IpAddr::V4(a.0));
                                }
                                RData::AAAA(aaaa) if rtype == RecordType::AAAA => {
                                    addrs.push(IpAddr::V6(aaaa.0));
                                }
                                RData::CNAME(target) => {
                                    cname = Some(target.0.clone());
                                }
                                _ => {}
                            }
                        }
                        if !addrs.is_empty() {
                            return Outcome {
                                status: QueryStatus::NoError,
                                transport: path,
                                addrs,
                            };
                        }
                        // CNAME only: remember the redirect but keep
                        // trying the remaining servers at this hop in
                        // case one answers the original name directly.
                        if let Some(target) = cname {
                            redirect = Some(target);
                        }
                        last_status = QueryStatus::NoAnswer;
                    }
                    rcode => {
                        last_status = QueryStatus::from_rcode(rcode);
                    }
                }
            }

            match redirect {
                Some(target) => current = target,
                None => return Outcome::failed(last_status, last_path),
            }
        }

        Outcome::failed(QueryStatus::ChainLimit, last_path)
    }
}

/// Rcodes worth retrying over TCP before giving up on a server.
fn is_transient(rcode: ResponseCode) -> bool {
    matches!(
        rcode,
        ResponseCode::ServFail | ResponseCode::Refused | ResponseCode::FormErr
    )
}

/// Normalize a host to a fully-qualified name (trailing-dot form).
fn to_fqdn(host: &str) -> Result<Name, ResolveError> {
    let trimmed = host.trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(ResolveError::InvalidName {
            host: host.to_string(),
        });
    }
    Name::from_utf8(format!("{trimmed}.")).map_err(|_| ResolveError::InvalidName {
        host: host.to_string(),
    })
}

/// Merge both families' answers, deduplicating by the literal textual form
/// of each address, then shuffle with a locally-owned generator.
fn merge_addrs(v4: Option<&Outcome>, v6: Option<&Outcome>) -> Vec<IpAddr> {
    let mut seen = FxHashSet::default();
    let mut addrs = Vec::new();
    for outcome in [v4, v6].into_iter().flatten() {
        for &ip in &outcome.addrs {
            if seen.insert(ip.to_string()) {
                addrs.push(ip);
            }
        }
    }
    let mut rng = SmallRng::from_os_rng();
    addrs.shuffle(&mut rng);
    addrs
}

/// Build the total-failure diagnostic, one clause per queried family.
fn failure_summary(v4: Option<&Outcome>, v6: Option<&Outcome>) -> String {
    let mut clauses = Vec::new();
    if let Some(outcome) = v4 {
        clauses.push(format!("A: {} via {}", outcome.status, outcome.transport));
    }
    if let Some(outcome) = v6 {
        clauses.push(format!("AAAA: {} via {}", outcome.status, outcome.transport));
    }
    clauses.join("; ")
}

/// Shared handle used by dialers and HTTP transports.
pub type SharedResolver = Arc<Resolver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn outcome(status: QueryStatus, transport: TransportPath, addrs: Vec<IpAddr>) -> Outcome {
        Outcome {
            status,
            transport,
            addrs,
        }
    }

    #[test]
    fn merge_deduplicates_by_text_form() {
        let ip = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7));
        let v4 = outcome(QueryStatus::NoError, TransportPath::Udp, vec![ip, ip]);
        let v6 = outcome(
            QueryStatus::NoError,
            TransportPath::Udp,
            vec![ip, IpAddr::V6(Ipv6Addr::LOCALHOST)],
        );

        let merged = merge_addrs(Some(&v4), Some(&v6));
        assert_eq!(merged.len(), 2);
        assert!(merged.contains(&ip));
        assert!(merged.contains(&IpAddr::V6(Ipv6Addr::LOCALHOST)));
    }

    #[test]
    fn summary_names_each_family() {
        let v4 = outcome(QueryStatus::NxDomain, TransportPath::Udp, vec![]);
        let v6 = outcome(QueryStatus::Timeout, TransportPath::UdpToTcp, vec![]);

        assert_eq!(
            failure_summary(Some(&v4), Some(&v6)),
            "A: NXDOMAIN via udp; AAAA: timeout via udp->tcp"
        );
    }

    #[test]
    fn summary_single_family() {
        let v4 = outcome(QueryStatus::ServFail, TransportPath::Udp, vec![]);
        assert_eq!(failure_summary(Some(&v4), None), "A: SERVFAIL via udp");
    }

    #[test]
    fn fqdn_normalization() {
        assert_eq!(to_fqdn("example.test").unwrap().to_utf8(), "example.test.");
        assert_eq!(to_fqdn("example.test.").unwrap().to_utf8(), "example.test.");
        assert!(to_fqdn("").is_err());
        assert!(to_fqdn(".").is_err());
    }

    #[test]
    fn transient_rcodes() {
        assert!(is_transient(ResponseCode::ServFail));
        assert!(is_transient(ResponseCode::Refused));
        assert!(is_transient(ResponseCode::FormErr));
        assert!(!is_transient(ResponseCode::NoError));
        assert!(!is_transient(ResponseCode::NXDomain));
    }

    #[tokio::test]
    async fn literal_host_short_circuits() {
        // Unroutable server; a literal must never touch the network.
        let config = Config::default().with_servers(vec!["192.0.2.1:53".parse().unwrap()]);
        let resolver = Resolver::new(&config);

        let resolution = resolver.resolve("198.51.100.7").await.unwrap();
        assert_eq!(
            resolution.addrs,
            vec![IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7))]
        );
        assert!(resolution.v4.is_none());
        assert!(resolution.v6.is_none());

        let resolution = resolver.resolve("2001:db8::7").await.unwrap();
        assert_eq!(
            resolution.addrs,
            vec!["2001:db8::7".parse::<IpAddr>().unwrap()]
        );
    }
}
