//! Single query exchange over UDP or TCP.
//!
//! One exchange sends one question to one server over one transport and
//! returns the parsed response or a transport error, never both. Wire
//! encoding and decoding is hickory-proto's job; this module only moves
//! bytes. Queries are built without an EDNS0 OPT record on purpose: some
//! environments answer EDNS0 queries with malformed responses or drop
//! them outright.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

use crate::error::ExchangeError;

/// Maximum size of a DNS packet (with some headroom).
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

/// Transport used for a single exchange attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp,
    Tcp,
}

/// Transport path taken to obtain a per-type outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPath {
    /// UDP answered directly.
    Udp,
    /// The UDP attempt was escalated to TCP against the same server.
    UdpToTcp,
}

impl std::fmt::Display for TransportPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportPath::Udp => f.write_str("udp"),
            TransportPath::UdpToTcp => f.write_str("udp->tcp"),
        }
    }
}

/// Build the query message for one question.
///
/// Fresh random transaction ID, recursion desired, one question, class IN.
/// No OPT record is attached, so the server sees a plain pre-EDNS0 query.
fn build_query(name: &Name, rtype: RecordType) -> Message {
    let mut message = Message::new();
    message
        .set_id(rand::random::<u16>())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(name.clone(), rtype));
    message
}

/// Perform one exchange: send `name`/`rtype` to `server` over `transport`,
/// bounded by `timeout`.
///
/// Dropping the returned future cancels the in-flight exchange.
pub async fn exchange(
    name: &Name,
    rtype: RecordType,
    transport: Transport,
    server: SocketAddr,
    timeout: Duration,
) -> Result<Message, ExchangeError> {
    let query = build_query(name, rtype);
    let wire = query.to_bytes()?;

    let attempt = async {
        let response = match transport {
            Transport::Udp => exchange_udp(&wire, server).await?,
            Transport::Tcp => exchange_tcp(&wire, server).await?,
        };
        if response.id() != query.id() {
            return Err(ExchangeError::IdMismatch);
        }
        Ok(response)
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(ExchangeError::Timeout),
    }
}

/// UDP: one datagram out, one datagram back.
async fn exchange_udp(wire: &[u8], server: SocketAddr) -> Result<Message, ExchangeError> {
    let bind: SocketAddr = if server.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind).await?;
    socket.connect(server).await?;
    socket.send(wire).await?;

    let mut buf = [0u8; MAX_DNS_PACKET_SIZE];
    let len = socket.recv(&mut buf).await?;
    Ok(Message::from_bytes(&buf[..len])?)
}

/// TCP: messages are framed with a 2-byte big-endian length prefix.
async fn exchange_tcp(wire: &[u8], server: SocketAddr) -> Result<Message, ExchangeError> {
    let mut stream = TcpStream::connect(server).await?;

    stream.write_all(&(wire.len() as u16).to_be_bytes()).await?;
    stream.write_all(wire).await?;

    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;
    let len = u16::from_be_bytes(len_buf) as usize;

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(Message::from_bytes(&buf)?)
}
