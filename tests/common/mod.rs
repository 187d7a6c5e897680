//! In-process DNS servers for integration tests.
//!
//! A mock server binds UDP and TCP on the same loopback port, parses each
//! incoming query with hickory-proto, records it, and answers through a
//! caller-supplied handler.

#![allow(dead_code)]

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use beeline::Transport;
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, CNAME};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

pub type Handler = Arc<dyn Fn(&Message, Transport) -> Message + Send + Sync>;

/// One recorded query: name, type, transport it arrived on.
pub type SeenQuery = (String, RecordType, Transport);

pub struct MockDnsServer {
    pub addr: SocketAddr,
    seen: Arc<Mutex<Vec<SeenQuery>>>,
}

impl MockDnsServer {
    /// Start serving on an ephemeral loopback port over both transports.
    pub async fn start(handler: Handler) -> Self {
        let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = udp.local_addr().unwrap();
        let tcp = TcpListener::bind(addr).await.unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        tokio::spawn(serve_udp(udp, handler.clone(), seen.clone()));
        tokio::spawn(serve_tcp(tcp, handler, seen.clone()));

        Self { addr, seen }
    }

    /// Every query received so far, in arrival order.
    pub fn seen(&self) -> Vec<SeenQuery> {
        self.seen.lock().unwrap().clone()
    }

    /// Record types queried so far.
    pub fn seen_types(&self) -> Vec<RecordType> {
        self.seen().into_iter().map(|(_, rtype, _)| rtype).collect()
    }
}

async fn serve_udp(socket: UdpSocket, handler: Handler, seen: Arc<Mutex<Vec<SeenQuery>>>) {
    let mut buf = [0u8; 4096];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(_) => return,
        };
        let query = match Message::from_bytes(&buf[..len]) {
            Ok(q) => q,
            Err(_) => continue,
        };
        record(&seen, &query, Transport::Udp);
        let response = handler(&query, Transport::Udp);
        let _ = socket.send_to(&response.to_bytes().unwrap(), peer).await;
    }
}

async fn serve_tcp(listener: TcpListener, handler: Handler, seen: Arc<Mutex<Vec<SeenQuery>>>) {
    loop {
        let (mut stream, _) = match listener.accept().await {
            Ok(r) => r,
            Err(_) => return,
        };
        let handler = handler.clone();
        let seen = seen.clone();
        tokio::spawn(async move {
            let mut len_buf = [0u8; 2];
            if stream.read_exact(&mut len_buf).await.is_err() {
                return;
            }
            let len = u16::from_be_bytes(len_buf) as usize;
            let mut buf = vec![0u8; len];
            if stream.read_exact(&mut buf).await.is_err() {
                return;
            }
            let query = match Message::from_bytes(&buf) {
                Ok(q) => q,
                Err(_) => return,
            };
            record(&seen, &query, Transport::Tcp);
            let response = handler(&query, Transport::Tcp).to_bytes().unwrap();
            let _ = stream
                .write_all(&(response.len() as u16).to_be_bytes())
                .await;
            let _ = stream.write_all(&response).await;
        });
    }
}

fn record(seen: &Arc<Mutex<Vec<SeenQuery>>>, query: &Message, transport: Transport) {
    if let Some(q) = query.queries().first() {
        seen.lock()
            .unwrap()
            .push((q.name().to_utf8(), q.query_type(), transport));
    }
}

/// Response skeleton echoing the query's ID and question.
pub fn response_for(query: &Message) -> Message {
    let mut msg = Message::new();
    msg.set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .set_recursion_available(true);
    for q in query.queries() {
        msg.add_query(q.clone());
    }
    msg
}

pub fn rcode_response(query: &Message, rcode: ResponseCode) -> Message {
    let mut msg = response_for(query);
    msg.set_response_code(rcode);
    msg
}

pub fn truncated_response(query: &Message) -> Message {
    let mut msg = response_for(query);
    msg.set_truncated(true);
    msg
}

pub fn a_response(query: &Message, ips: &[Ipv4Addr]) -> Message {
    let mut msg = response_for(query);
    let name = qname(query);
    for &ip in ips {
        msg.add_answer(Record::from_rdata(name.clone(), 60, RData::A(A(ip))));
    }
    msg
}

pub fn aaaa_response(query: &Message, ips: &[Ipv6Addr]) -> Message {
    let mut msg = response_for(query);
    let name = qname(query);
    for &ip in ips {
        msg.add_answer(Record::from_rdata(name.clone(), 60, RData::AAAA(AAAA(ip))));
    }
    msg
}

pub fn cname_response(query: &Message, target: &str) -> Message {
    let mut msg = response_for(query);
    let name = qname(query);
    let target = Name::from_utf8(target).unwrap();
    msg.add_answer(Record::from_rdata(name, 60, RData::CNAME(CNAME(target))));
    msg
}

pub fn qname(query: &Message) -> Name {
    query.queries().first().unwrap().name().clone()
}

pub fn qtype(query: &Message) -> RecordType {
    query.queries().first().unwrap().query_type()
}
