//! Resolver configuration.
//!
//! Configuration is read once (from the environment or built in code) and
//! handed to [`crate::resolver::Resolver::new`]. There is no process-global
//! resolver state: whoever dials outbound connections receives the
//! configured resolver explicitly.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::servers::DNS_PORT;

/// Environment variable naming the server list (comma-separated `host:port`
/// or bare IP entries).
pub const ENV_SERVERS: &str = "BEELINE_DNS_SERVERS";
/// Environment variable for the per-exchange timeout (`2s`, `500ms`, `1m`).
pub const ENV_TIMEOUT: &str = "BEELINE_DNS_TIMEOUT";
/// Environment variable restricting resolution to A queries.
pub const ENV_IPV4_ONLY: &str = "BEELINE_DNS_IPV4_ONLY";
/// Environment variable restricting resolution to AAAA queries.
pub const ENV_IPV6_ONLY: &str = "BEELINE_DNS_IPV6_ONLY";
/// Environment variable enabling debug logging in the binary.
pub const ENV_DEBUG: &str = "BEELINE_DNS_DEBUG";

/// Default per-exchange timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Which address families a resolution queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FamilyPolicy {
    /// Query A and AAAA concurrently (default).
    #[default]
    Both,
    /// Query A only; no AAAA query is ever issued.
    V4Only,
    /// Query AAAA only; no A query is ever issued.
    V6Only,
}

impl FamilyPolicy {
    pub fn queries_v4(self) -> bool {
        !matches!(self, FamilyPolicy::V6Only)
    }

    pub fn queries_v6(self) -> bool {
        !matches!(self, FamilyPolicy::V4Only)
    }
}

/// Immutable resolver configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Name servers to query, in fallback order. `None` reads the system
    /// resolver configuration at resolver construction.
    pub servers: Option<Vec<SocketAddr>>,
    /// Timeout applied to each UDP or TCP exchange.
    pub timeout: Duration,
    /// Address-family restriction.
    pub family: FamilyPolicy,
    /// Verbose flag for the logging collaborator; the core itself only
    /// emits `tracing` debug events.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers: None,
            timeout: DEFAULT_TIMEOUT,
            family: FamilyPolicy::default(),
            debug: false,
        }
    }
}

impl Config {
    /// Build a configuration from `BEELINE_DNS_*` environment variables.
    ///
    /// Intended to be called once at startup. Unset or unparseable values
    /// fall back to defaults; a bad timeout string is ignored rather than
    /// treated as fatal. If both family restrictions are set, IPv4-only
    /// wins.
    pub fn from_env() -> Self {
        let servers = std::env::var(ENV_SERVERS)
            .ok()
            .map(|v| parse_server_list(&v))
            .filter(|list| !list.is_empty());

        let timeout = std::env::var(ENV_TIMEOUT)
            .ok()
            .and_then(|v| parse_duration(v.trim()))
            .unwrap_or(DEFAULT_TIMEOUT);

        let family = if env_bool(ENV_IPV4_ONLY) {
            FamilyPolicy::V4Only
        } else if env_bool(ENV_IPV6_ONLY) {
            FamilyPolicy::V6Only
        } else {
            FamilyPolicy::Both
        };

        Self {
            servers,
            timeout,
            family,
            debug: env_bool(ENV_DEBUG),
        }
    }

    pub fn with_servers(mut self, servers: Vec<SocketAddr>) -> Self {
        self.servers = Some(servers);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_family(mut self, family: FamilyPolicy) -> Self {
        self.family = family;
        self
    }
}

/// Read an environment variable as a boolean flag.
///
/// Accepts `1`, `true`, `yes`, `on` (case-insensitive); everything else,
/// including an unset variable, is false.
fn env_bool(key: &str) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}

/// Parse a comma-separated server list. Each entry is `ip:port`,
/// `[v6]:port`, or a bare IP literal (port defaults to 53). Entries that
/// do not parse are skipped.
pub fn parse_server_list(value: &str) -> Vec<SocketAddr> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            if let Ok(addr) = entry.parse::<SocketAddr>() {
                return Some(addr);
            }
            entry
                .parse::<IpAddr>()
                .ok()
                .map(|ip| SocketAddr::new(ip, DNS_PORT))
        })
        .collect()
}

/// Parse a duration string with a unit suffix: `500ms`, `2s`, `1m`, `1h`.
///
/// Fractional values are accepted (`1.5s`). Returns `None` for anything
/// else, including a bare number with no unit.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let unit_start = value.find(|c: char| !c.is_ascii_digit() && c != '.')?;
    let (number, unit) = value.split_at(unit_start);
    let number: f64 = number.parse().ok()?;
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    let secs = match unit {
        "ms" => number / 1000.0,
        "s" => number,
        "m" => number * 60.0,
        "h" => number * 3600.0,
        _ => return None,
    };
    Some(Duration::from_secs_f64(secs))
}
