//! Beeline - a stub DNS resolver with a pluggable dialer.
//!
//! Beeline replaces the platform's name resolution with a self-contained
//! DNS client speaking plain UDP/TCP, deliberately without EDNS0. It
//! resolves A and AAAA records concurrently against an ordered server
//! list, escalates from UDP to TCP on truncation or transient failure,
//! follows CNAME chains up to a fixed bound, and hands the merged,
//! shuffled address set to callers either directly ([`Resolver::resolve`])
//! or as a connection factory ([`DnsDialer`]) that an HTTP transport can
//! install as its dial function.
//!
//! There is no cache and no global state: configuration is read once (see
//! [`Config::from_env`]) and the resulting resolver is passed explicitly
//! to whatever dials outbound connections.

pub mod config;
pub mod dial;
pub mod error;
pub mod exchange;
pub mod resolver;
pub mod servers;

pub use config::{Config, FamilyPolicy};
pub use dial::{Dial, DnsDialer};
pub use error::{DialError, ExchangeError, ResolveError};
pub use exchange::{Transport, TransportPath};
pub use resolver::{Outcome, QueryStatus, Resolution, Resolver, SharedResolver};
