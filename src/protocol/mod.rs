// src/protocol/mod.rs
//! Minecraft Java Edition Server List Ping client.

pub mod codec;
pub mod response;

use std::fmt;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use log::debug;
use rand::Rng;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use self::codec::{
    decode_pong_body, decode_status_body, handshake_packet, ping_packet, read_packet,
    status_request_packet, PING_PACKET_ID, STATUS_PACKET_ID,
};
use self::response::StatusResponse;

#[derive(Debug)]
pub enum QueryError {
    Timeout,
    Io(std::io::Error),
    InvalidVarInt,
    PacketTooLarge(usize),
    UnexpectedPacket(i32),
    Truncated,
    InvalidUtf8,
    PongMismatch,
    Json(serde_json::Error),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "Timed out waiting for status"),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::InvalidVarInt => write!(f, "Invalid VarInt"),
            Self::PacketTooLarge(len) => write!(f, "Packet too large: {} bytes", len),
            Self::UnexpectedPacket(id) => write!(f, "Unexpected packet id 0x{:02X}", id),
            Self::Truncated => write!(f, "Truncated packet"),
            Self::InvalidUtf8 => write!(f, "Status is not valid UTF-8"),
            Self::PongMismatch => write!(f, "Pong payload does not match ping"),
            Self::Json(e) => write!(f, "Invalid status JSON: {}", e),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<std::io::Error> for QueryError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

#[derive(Debug, Clone)]
pub struct StatusReply {
    pub response: StatusResponse,
    pub latency_ms: f64,
}

/// One status query against a single `host:port`.
#[async_trait]
pub trait StatusQuery: Send + Sync {
    async fn status(&self, host: &str, port: u16, timeout: Duration) -> Result<StatusReply, QueryError>;

    /// Checks that `host` resolves before a scan fans out over its ports.
    async fn resolve(&self, host: &str) -> Result<(), QueryError> {
        let mut addrs = tokio::net::lookup_host((host, 0)).await?;
        match addrs.next() {
            Some(_) => Ok(()),
            None => Err(QueryError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} has no addresses", host),
            ))),
        }
    }
}

/// Talks the Server List Ping protocol over TCP.
#[derive(Debug, Default, Clone, Copy)]
pub struct JavaPinger;

impl JavaPinger {
    /// Handshake and status round trip. Returns the open stream for the optional ping.
    async fn request_status(host: &str, port: u16) -> Result<(TcpStream, StatusResponse, Duration), QueryError> {
        let mut stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;

        stream.write_all(&handshake_packet(host, port)).await?;
        stream.write_all(&status_request_packet()).await?;

        let started = Instant::now();
        let (packet_id, body) = read_packet(&mut stream).await?;
        let status_rtt = started.elapsed();
        if packet_id != STATUS_PACKET_ID {
            return Err(QueryError::UnexpectedPacket(packet_id));
        }
        let response: StatusResponse = serde_json::from_str(&decode_status_body(&body)?)?;
        Ok((stream, response, status_rtt))
    }

    async fn ping(stream: &mut TcpStream) -> Result<Duration, QueryError> {
        let payload: i64 = rand::thread_rng().gen();

        let started = Instant::now();
        stream.write_all(&ping_packet(payload)).await?;
        let (packet_id, body) = read_packet(stream).await?;
        let rtt = started.elapsed();

        if packet_id != PING_PACKET_ID {
            return Err(QueryError::UnexpectedPacket(packet_id));
        }
        if decode_pong_body(&body)? != payload {
            return Err(QueryError::PongMismatch);
        }
        Ok(rtt)
    }
}

#[async_trait]
impl StatusQuery for JavaPinger {
    async fn status(&self, host: &str, port: u16, timeout: Duration) -> Result<StatusReply, QueryError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let (mut stream, response, status_rtt) =
            match tokio::time::timeout_at(deadline, Self::request_status(host, port)).await {
                Ok(result) => result?,
                Err(_) => return Err(QueryError::Timeout),
            };

        // The status reply alone makes the server online; the ping only refines latency
        let latency = match tokio::time::timeout_at(deadline, Self::ping(&mut stream)).await {
            Ok(Ok(rtt)) => rtt,
            Ok(Err(e)) => {
                debug!("Ping to {}:{} failed, using status round trip: {}", host, port, e);
                status_rtt
            }
            Err(_) => {
                debug!("Ping to {}:{} timed out, using status round trip", host, port);
                status_rtt
            }
        };

        Ok(StatusReply {
            response,
            latency_ms: latency.as_secs_f64() * 1000.0,
        })
    }
}

#[cfg(test)]
pub mod testing {
    //! In-process fakes shared by the coordinator, flow and handler tests.
    use super::*;
    use std::collections::HashSet;
    use parking_lot::Mutex;

    pub const UNRESOLVABLE_HOST: &str = "unresolvable.invalid";

    /// Answers for a fixed set of open ports; everything else is refused.
    #[derive(Debug, Default)]
    pub struct FakeQuery {
        pub open: Mutex<HashSet<u16>>,
        pub body: Mutex<String>,
        pub calls: Mutex<Vec<(String, u16)>>,
        /// Time every query takes before answering.
        pub delay: Mutex<Duration>,
    }

    impl FakeQuery {
        pub fn with_ports(ports: &[u16]) -> Self {
            let fake = Self::default();
            fake.open.lock().extend(ports.iter().copied());
            *fake.body.lock() = r#"{"version":{"name":"1.20.4","protocol":765},"players":{"max":20,"online":1,"sample":[{"name":"Alex","id":"x"}]},"description":"hi"}"#.to_string();
            fake
        }

        pub fn set_open(&self, ports: &[u16]) {
            let mut open = self.open.lock();
            open.clear();
            open.extend(ports.iter().copied());
        }
    }

    #[async_trait]
    impl StatusQuery for FakeQuery {
        async fn status(&self, host: &str, port: u16, _timeout: Duration) -> Result<StatusReply, QueryError> {
            self.calls.lock().push((host.to_string(), port));
            let delay = *self.delay.lock();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if !self.open.lock().contains(&port) {
                return Err(QueryError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused)));
            }
            let body = self.body.lock().clone();
            Ok(StatusReply {
                response: serde_json::from_str(&body)?,
                latency_ms: 4.2,
            })
        }

        async fn resolve(&self, host: &str) -> Result<(), QueryError> {
            if host == UNRESOLVABLE_HOST {
                return Err(QueryError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)));
            }
            Ok(())
        }
    }
}
