//! Packet classification and session logging.
//!
//! The logger loop consumes parsed packet descriptors from the capture
//! thread, classifies each into a record, appends it to the session log,
//! and echoes it to stdout. All appends happen here, sequentially.

pub mod record;

pub use record::{IpLayer, PacketDescriptor, PacketRecord, Protocol, SessionLog, Transport};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use chrono::Local;

/// HTTP Upgrade header that marks a WebSocket handshake. Matched exact-case
/// against the raw TCP payload of a single packet.
const WS_UPGRADE_MARKER: &[u8] = b"Upgrade: websocket";

/// Run the logger loop. Consumes descriptors from the channel until the
/// stop flag clears or the capture thread hangs up.
///
/// This function blocks and should be called from the main thread.
pub fn logger_loop(
    rx: mpsc::Receiver<PacketDescriptor>,
    session: &mut SessionLog,
    service_port: u16,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        // Receive with a short timeout so the stop flag is observed promptly
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(desc) => {
                if let Some(record) = classify(&desc, service_port) {
                    println!("{record}");
                    session.push(record);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Classify one packet descriptor into a record, or `None` for frames
/// without an IP layer.
///
/// TCP packets touching `service_port` in either direction are refined into
/// `WebSocket-Handshake` (payload carries the Upgrade header) or
/// `WebSocket-Data`. The refinement never applies to UDP, even on a port
/// match.
pub fn classify(desc: &PacketDescriptor, service_port: u16) -> Option<PacketRecord> {
    let ip = desc.ip.as_ref()?;

    let (protocol, source, destination) = match &ip.transport {
        Transport::Tcp {
            sport,
            dport,
            payload,
        } => {
            let protocol = if *sport == service_port || *dport == service_port {
                if contains_upgrade_marker(payload) {
                    Protocol::WebSocketHandshake
                } else {
                    Protocol::WebSocketData
                }
            } else {
                Protocol::Tcp
            };
            (
                protocol,
                format!("{}:{}", ip.src, sport),
                format!("{}:{}", ip.dst, dport),
            )
        }
        Transport::Udp { sport, dport } => (
            Protocol::Udp,
            format!("{}:{}", ip.src, sport),
            format!("{}:{}", ip.dst, dport),
        ),
        Transport::Other => (
            Protocol::Other,
            format!("{}:", ip.src),
            format!("{}:", ip.dst),
        ),
    };

    Some(PacketRecord {
        timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        source,
        destination,
        size: desc.wire_len,
        protocol,
    })
}

fn contains_upgrade_marker(payload: &[u8]) -> bool {
    payload
        .windows(WS_UPGRADE_MARKER.len())
        .any(|w| w == WS_UPGRADE_MARKER)
}
