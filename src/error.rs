//! Error types for the resolution engine.
//!
//! Nothing here is fatal: every variant is an ordinary returned error.
//! Per-attempt failures (one server, one transport) are absorbed inside
//! the resolver and only surface as context in the final aggregate error.

use std::io;

use hickory_proto::ProtoError;
use thiserror::Error;

/// Failure of a single query exchange against one server over one transport.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// No response within the configured per-exchange timeout.
    #[error("exchange timed out")]
    Timeout,

    /// Socket-level failure (connection refused, network unreachable, ...).
    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    /// The response could not be encoded or decoded.
    #[error("codec error: {0}")]
    Proto(#[from] ProtoError),

    /// The response carried a transaction ID that does not match the query.
    #[error("response id does not match query")]
    IdMismatch,
}

/// Failure of a full resolution across both address families.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The host is not a valid domain name.
    #[error("invalid host name {host:?}")]
    InvalidName { host: String },

    /// Every queried family failed; `summary` names each family's terminal
    /// status and transport path, e.g. "A: NXDOMAIN via udp; AAAA: timeout
    /// via udp->tcp".
    #[error("no addresses for {host}: {summary}")]
    NoAddresses { host: String, summary: String },
}

/// Failure of a dial through the engine.
#[derive(Debug, Error)]
pub enum DialError {
    /// The target did not parse as `host:port`. No network attempt is made.
    #[error("invalid dial target {target:?}: expected host:port")]
    InvalidTarget { target: String },

    /// Only TCP networks are supported by the dialer.
    #[error("unsupported network {0:?}")]
    UnsupportedNetwork(String),

    /// Resolution itself failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Resolution yielded no usable address for the requested network.
    #[error("no route to host {host}")]
    NoRouteToHost { host: String },

    /// Every resolved address was tried; this is the last connect error.
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),
}
