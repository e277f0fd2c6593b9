use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Protocol label assigned to a logged packet.
///
/// The WebSocket variants only ever replace `Tcp`, and only for packets
/// touching the monitored service port. Serialized spellings are the export
/// wire format; everything in-process works with the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
    #[serde(rename = "Other")]
    Other,
    #[serde(rename = "WebSocket-Handshake")]
    WebSocketHandshake,
    #[serde(rename = "WebSocket-Data")]
    WebSocketData,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Other => "Other",
            Protocol::WebSocketHandshake => "WebSocket-Handshake",
            Protocol::WebSocketData => "WebSocket-Data",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport layer of a parsed packet.
///
/// Only TCP carries its payload: the handshake refinement inspects TCP
/// payloads and nothing else, so UDP and bare-IP packets stay lean.
#[derive(Debug, Clone)]
pub enum Transport {
    Tcp {
        sport: u16,
        dport: u16,
        payload: Vec<u8>,
    },
    Udp {
        sport: u16,
        dport: u16,
    },
    /// IP packet with neither a TCP nor a UDP layer (ICMP etc.).
    Other,
}

/// Network layer of a parsed packet.
#[derive(Debug, Clone)]
pub struct IpLayer {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub transport: Transport,
}

/// One captured packet as handed over by the capture thread.
///
/// `ip` is `None` for frames without an IP layer; the classifier drops
/// those without producing a record.
#[derive(Debug, Clone)]
pub struct PacketDescriptor {
    /// Total length of the packet as observed on the wire.
    pub wire_len: usize,
    pub ip: Option<IpLayer>,
}

/// One entry in the session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRecord {
    /// ISO-8601 wall-clock time, stamped at classification.
    pub timestamp: String,
    /// `"{ip}:{port}"`, or `"{ip}:"` when the packet has no transport port.
    pub source: String,
    pub destination: String,
    pub size: usize,
    #[serde(rename = "protocol_label")]
    pub protocol: Protocol,
}

impl fmt::Display for PacketRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} -> {} {}B {}",
            self.timestamp, self.source, self.destination, self.size, self.protocol
        )
    }
}

/// Append-only ordered log of one capture session.
///
/// Owned by main, mutated only by the logger loop, handed to the exporter
/// after capture stops.
#[derive(Debug, Default)]
pub struct SessionLog {
    records: Vec<PacketRecord>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: PacketRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[PacketRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
