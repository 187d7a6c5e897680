//! Name-server list discovery.
//!
//! The server set is computed once per resolver and never mutated: it is
//! read from the system resolver configuration when that file exists and
//! names at least one server, and falls back to loopback otherwise.
//! Ordering is significant: servers are tried in list order on every
//! query, so the list defines fallback priority.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Standard DNS port, used when configuration does not name one.
pub const DNS_PORT: u16 = 53;

/// Path of the system resolver configuration file.
const RESOLV_CONF: &str = "/etc/resolv.conf";

/// The hard-coded fallback: loopback over both families.
pub fn default_servers() -> Vec<SocketAddr> {
    vec![
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DNS_PORT),
        SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), DNS_PORT),
    ]
}

/// Read the system resolver configuration.
///
/// An absent or unreadable file, or one declaring zero servers, is not an
/// error; the loopback default is returned instead.
pub fn system_servers() -> Vec<SocketAddr> {
    match std::fs::read_to_string(RESOLV_CONF) {
        Ok(text) => {
            let servers = parse_resolv_conf(&text);
            if servers.is_empty() {
                default_servers()
            } else {
                servers
            }
        }
        Err(_) => default_servers(),
    }
}

/// Parse resolv.conf text into an ordered server list.
///
/// Only `nameserver` lines and an optional `port` directive are honored;
/// the port applies to every listed server. Entries that do not parse as
/// an IP literal are skipped. IPv6 zone suffixes (`fe80::1%eth0`) are
/// stripped.
pub fn parse_resolv_conf(text: &str) -> Vec<SocketAddr> {
    let mut hosts = Vec::new();
    let mut port = DNS_PORT;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("nameserver") => {
                if let Some(host) = parts.next() {
                    hosts.push(host.to_string());
                }
            }
            Some("port") => {
                if let Some(p) = parts.next().and_then(|p| p.parse().ok()) {
                    port = p;
                }
            }
            _ => {}
        }
    }

    hosts
        .iter()
        .filter_map(|host| server_addr(host, port))
        .collect()
}

/// Join a host literal from configuration with a port.
fn server_addr(host: &str, port: u16) -> Option<SocketAddr> {
    let host = host.split('%').next()?;
    host.parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nameserver_lines_in_order() {
        let conf = "nameserver 1.1.1.1\nnameserver 8.8.8.8\n";
        assert_eq!(
            parse_resolv_conf(conf),
            vec!["1.1.1.1:53".parse().unwrap(), "8.8.8.8:53".parse().unwrap()]
        );
    }

    #[test]
    fn skips_comments_and_other_directives() {
        let conf = "# comment\n; also comment\nsearch example.test\noptions ndots:1\nnameserver 9.9.9.9\n";
        assert_eq!(parse_resolv_conf(conf), vec!["9.9.9.9:53".parse().unwrap()]);
    }

    #[test]
    fn port_directive_applies_to_all_servers() {
        let conf = "nameserver 1.1.1.1\nport 5353\nnameserver 8.8.8.8\n";
        assert_eq!(
            parse_resolv_conf(conf),
            vec![
                "1.1.1.1:5353".parse().unwrap(),
                "8.8.8.8:5353".parse().unwrap()
            ]
        );
    }

    #[test]
    fn ipv6_nameserver_with_zone() {
        let conf = "nameserver 2001:db8::1\nnameserver fe80::1%eth0\n";
        assert_eq!(
            parse_resolv_conf(conf),
            vec![
                "[2001:db8::1]:53".parse().unwrap(),
                "[fe80::1]:53".parse().unwrap()
            ]
        );
    }

    #[test]
    fn unparseable_entries_are_skipped() {
        let conf = "nameserver not-an-ip\nnameserver 1.0.0.1\n";
        assert_eq!(parse_resolv_conf(conf), vec!["1.0.0.1:53".parse().unwrap()]);
    }

    #[test]
    fn empty_conf_yields_nothing() {
        assert!(parse_resolv_conf("").is_empty());
    }

    #[test]
    fn default_servers_are_loopback() {
        let servers = default_servers();
        assert_eq!(servers.len(), 2);
        assert!(servers.iter().all(|s| s.ip().is_loopback()));
        assert!(servers.iter().all(|s| s.port() == DNS_PORT));
    }
}
