//! Live packet capture: pcap device → PacketDescriptor channel.

pub mod packet;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use anyhow::{bail, Context, Result};
use pcap::{Active, Capture};

use crate::session::PacketDescriptor;

/// Read timeout so the capture loop can observe the stop flag between reads.
const READ_TIMEOUT_MS: i32 = 250;

/// Open a capture on `device` with `filter` applied, and verify the
/// datalink is one the frame parser understands.
pub fn open_capture(device: &str, filter: &str) -> Result<Capture<Active>> {
    let mut cap = Capture::from_device(device)
        .with_context(|| format!("Failed to open capture device {device}"))?
        .immediate_mode(true)
        .snaplen(65535)
        .timeout(READ_TIMEOUT_MS)
        .open()
        .context("Failed to activate capture. Capturing usually requires elevated privileges.")?;

    cap.filter(filter, true)
        .with_context(|| format!("Invalid capture filter {filter:?}"))?;

    let datalink = cap.get_datalink();
    match datalink.0 {
        packet::DLT_EN10MB
        | packet::DLT_NULL
        | packet::DLT_LOOP
        | packet::DLT_RAW
        | packet::LINKTYPE_RAW => {}
        _ => bail!("Unsupported datalink {datalink:?} on device {device}"),
    }

    Ok(cap)
}

/// Run the capture loop, sending one descriptor per captured frame.
/// Exits when the stop flag clears or the receiver hangs up.
///
/// This function blocks and should be called from a dedicated thread.
pub fn capture_loop(
    mut cap: Capture<Active>,
    tx: mpsc::Sender<PacketDescriptor>,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let datalink = cap.get_datalink().0;

    while running.load(Ordering::SeqCst) {
        match cap.next_packet() {
            Ok(pkt) => {
                let desc = packet::parse_frame(datalink, pkt.data, pkt.header.len as usize);
                // If the receiver hung up, exit gracefully
                if tx.send(desc).is_err() {
                    break;
                }
            }
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
