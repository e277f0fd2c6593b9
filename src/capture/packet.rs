//! Frame parsing: raw capture data → PacketDescriptor.
//!
//! Handles the datalinks a port-filtered capture realistically lands on:
//! ethernet, BSD loopback (4-byte family header), and raw IP. Frames with
//! no IP layer produce a descriptor with `ip: None`; frames whose headers
//! are truncated are skipped with a warning.

use std::net::IpAddr;

use pnet_packet::ethernet::{EtherTypes, EthernetPacket};
use pnet_packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::ipv6::Ipv6Packet;
use pnet_packet::tcp::TcpPacket;
use pnet_packet::udp::UdpPacket;
use tracing::warn;

use crate::session::{IpLayer, PacketDescriptor, Transport};

/// DLT_NULL (BSD loopback, 4-byte protocol family header)
pub const DLT_NULL: i32 = 0;
/// DLT_EN10MB (ethernet)
pub const DLT_EN10MB: i32 = 1;
/// DLT_RAW (raw IP, no link-layer header)
pub const DLT_RAW: i32 = 12;
/// LINKTYPE_RAW as reported by newer libpcap builds
pub const LINKTYPE_RAW: i32 = 101;
/// DLT_LOOP (OpenBSD loopback)
pub const DLT_LOOP: i32 = 108;

/// Ethernet header length
const ETH_HEADER_LEN: usize = 14;

/// Parse one captured frame into a PacketDescriptor.
///
/// `wire_len` is the packet's original on-wire length from the capture
/// header, which may exceed `data.len()` if the snaplen truncated it.
pub fn parse_frame(datalink: i32, data: &[u8], wire_len: usize) -> PacketDescriptor {
    PacketDescriptor {
        wire_len,
        ip: ip_layer(datalink, data),
    }
}

/// Strip the link-layer header and parse the IP layer, if any.
fn ip_layer(datalink: i32, data: &[u8]) -> Option<IpLayer> {
    let ip_data = match datalink {
        DLT_EN10MB => {
            let eth = EthernetPacket::new(data)?;
            match eth.get_ethertype() {
                EtherTypes::Ipv4 | EtherTypes::Ipv6 => &data[ETH_HEADER_LEN..],
                // ARP and friends carry no IP layer
                _ => return None,
            }
        }
        DLT_NULL | DLT_LOOP => data.get(4..)?,
        // DLT_RAW / LINKTYPE_RAW: the frame is the IP packet
        _ => data,
    };

    if ip_data.is_empty() {
        return None;
    }

    match ip_data[0] >> 4 {
        4 => parse_ipv4(ip_data),
        6 => parse_ipv6(ip_data),
        _ => None,
    }
}

fn parse_ipv4(data: &[u8]) -> Option<IpLayer> {
    let Some(ipv4) = Ipv4Packet::new(data) else {
        warn!("truncated IPv4 header ({} bytes), skipping packet", data.len());
        return None;
    };

    let header_len = ipv4.get_header_length() as usize * 4;
    if header_len < 20 || header_len > data.len() {
        warn!("bad IPv4 header length {header_len}, skipping packet");
        return None;
    }

    let transport = transport_layer(ipv4.get_next_level_protocol(), &data[header_len..])?;

    Some(IpLayer {
        src: IpAddr::V4(ipv4.get_source()),
        dst: IpAddr::V4(ipv4.get_destination()),
        transport,
    })
}

fn parse_ipv6(data: &[u8]) -> Option<IpLayer> {
    let Some(ipv6) = Ipv6Packet::new(data) else {
        warn!("truncated IPv6 header ({} bytes), skipping packet", data.len());
        return None;
    };

    // Fixed header only; anything behind an extension header classifies as Other
    let transport = transport_layer(ipv6.get_next_header(), &data[40..])?;

    Some(IpLayer {
        src: IpAddr::V6(ipv6.get_source()),
        dst: IpAddr::V6(ipv6.get_destination()),
        transport,
    })
}

fn transport_layer(proto: IpNextHeaderProtocol, data: &[u8]) -> Option<Transport> {
    match proto {
        IpNextHeaderProtocols::Tcp => {
            let Some(tcp) = TcpPacket::new(data) else {
                warn!("truncated TCP header ({} bytes), skipping packet", data.len());
                return None;
            };
            let header_len = tcp.get_data_offset() as usize * 4;
            if header_len < 20 || header_len > data.len() {
                warn!("bad TCP data offset {header_len}, skipping packet");
                return None;
            }
            Some(Transport::Tcp {
                sport: tcp.get_source(),
                dport: tcp.get_destination(),
                payload: data[header_len..].to_vec(),
            })
        }
        IpNextHeaderProtocols::Udp => {
            let Some(udp) = UdpPacket::new(data) else {
                warn!("truncated UDP header ({} bytes), skipping packet", data.len());
                return None;
            };
            Some(Transport::Udp {
                sport: udp.get_source(),
                dport: udp.get_destination(),
            })
        }
        _ => Some(Transport::Other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ethernet_header(ethertype: u16) -> Vec<u8> {
        let mut buf = vec![0u8; 12]; // dst + src MAC, irrelevant here
        buf.extend_from_slice(&ethertype.to_be_bytes());
        buf
    }

    fn ipv4_header(src: [u8; 4], dst: [u8; 4], proto: u8, payload_len: usize) -> Vec<u8> {
        let mut buf = Vec::with_capacity(20);
        buf.push(0x45); // version 4, IHL 5
        buf.push(0);
        buf.extend_from_slice(&((20 + payload_len) as u16).to_be_bytes());
        buf.extend_from_slice(&[0, 0, 0, 0]); // id, flags/frag
        buf.push(64); // ttl
        buf.push(proto);
        buf.extend_from_slice(&[0, 0]); // checksum, unchecked
        buf.extend_from_slice(&src);
        buf.extend_from_slice(&dst);
        buf
    }

    fn tcp_header(sport: u16, dport: u16) -> Vec<u8> {
        let mut buf = Vec::with_capacity(20);
        buf.extend_from_slice(&sport.to_be_bytes());
        buf.extend_from_slice(&dport.to_be_bytes());
        buf.extend_from_slice(&[0; 8]); // seq + ack
        buf.push(0x50); // data offset 5
        buf.push(0x18); // PSH|ACK
        buf.extend_from_slice(&[0; 6]); // window, checksum, urgent ptr
        buf
    }

    fn tcp_frame(src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = ethernet_header(0x0800);
        buf.extend_from_slice(&ipv4_header(src, dst, 6, 20 + payload.len()));
        buf.extend_from_slice(&tcp_header(sport, dport));
        buf.extend_from_slice(payload);
        buf
    }

    fn udp_frame(src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = ethernet_header(0x0800);
        buf.extend_from_slice(&ipv4_header(src, dst, 17, 8 + payload.len()));
        buf.extend_from_slice(&sport.to_be_bytes());
        buf.extend_from_slice(&dport.to_be_bytes());
        buf.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
        buf.extend_from_slice(&[0, 0]); // checksum
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn test_parse_tcp_frame() {
        let data = tcp_frame([10, 0, 0, 5], [10, 0, 0, 2], 54321, 3001, b"hello");
        let desc = parse_frame(DLT_EN10MB, &data, data.len());
        assert_eq!(desc.wire_len, data.len());

        let ip = desc.ip.expect("IP layer");
        assert_eq!(ip.src.to_string(), "10.0.0.5");
        assert_eq!(ip.dst.to_string(), "10.0.0.2");
        match ip.transport {
            Transport::Tcp {
                sport,
                dport,
                payload,
            } => {
                assert_eq!(sport, 54321);
                assert_eq!(dport, 3001);
                assert_eq!(payload, b"hello");
            }
            other => panic!("expected TCP, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_udp_frame() {
        let data = udp_frame([10, 0, 0, 5], [10, 0, 0, 2], 3001, 9999, &[0xde, 0xad]);
        let desc = parse_frame(DLT_EN10MB, &data, data.len());
        let ip = desc.ip.expect("IP layer");
        match ip.transport {
            Transport::Udp { sport, dport } => {
                assert_eq!(sport, 3001);
                assert_eq!(dport, 9999);
            }
            other => panic!("expected UDP, got {other:?}"),
        }
    }

    #[test]
    fn test_icmp_frame_is_other() {
        let mut data = ethernet_header(0x0800);
        data.extend_from_slice(&ipv4_header([192, 168, 1, 10], [192, 168, 1, 1], 1, 8));
        data.extend_from_slice(&[8, 0, 0, 0, 0, 1, 0, 1]); // echo request
        let desc = parse_frame(DLT_EN10MB, &data, data.len());
        let ip = desc.ip.expect("IP layer");
        assert!(matches!(ip.transport, Transport::Other));
    }

    #[test]
    fn test_arp_frame_has_no_ip_layer() {
        let mut data = ethernet_header(0x0806);
        data.extend_from_slice(&[0u8; 28]);
        let desc = parse_frame(DLT_EN10MB, &data, data.len());
        assert!(desc.ip.is_none());
    }

    #[test]
    fn test_truncated_tcp_header_skipped() {
        // IPv4 header claims TCP but only 4 transport bytes follow
        let mut data = ethernet_header(0x0800);
        data.extend_from_slice(&ipv4_header([10, 0, 0, 5], [10, 0, 0, 2], 6, 4));
        data.extend_from_slice(&[0xd4, 0x31, 0x0b, 0xb9]);
        let desc = parse_frame(DLT_EN10MB, &data, data.len());
        assert!(desc.ip.is_none());
    }

    #[test]
    fn test_bad_tcp_data_offset_skipped() {
        let mut data = tcp_frame([10, 0, 0, 5], [10, 0, 0, 2], 1, 2, b"");
        // Patch the data offset nibble to claim a 60-byte header
        let doff_index = ETH_HEADER_LEN + 20 + 12;
        data[doff_index] = 0xf0;
        let desc = parse_frame(DLT_EN10MB, &data, data.len());
        assert!(desc.ip.is_none());
    }

    #[test]
    fn test_raw_datalink_parses_bare_ip() {
        let full = tcp_frame([10, 0, 0, 5], [10, 0, 0, 2], 1234, 80, b"x");
        let bare = &full[ETH_HEADER_LEN..];
        let desc = parse_frame(DLT_RAW, bare, bare.len());
        assert!(desc.ip.is_some());
    }

    #[test]
    fn test_null_datalink_skips_family_header() {
        let full = tcp_frame([127, 0, 0, 1], [127, 0, 0, 1], 4000, 3001, b"");
        let mut data = vec![2, 0, 0, 0]; // AF_INET, host order
        data.extend_from_slice(&full[ETH_HEADER_LEN..]);
        let desc = parse_frame(DLT_NULL, &data, data.len());
        let ip = desc.ip.expect("IP layer");
        assert_eq!(ip.src.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_parse_ipv6_tcp_frame() {
        let mut data = ethernet_header(0x86dd);
        let tcp = tcp_header(5000, 3001);
        data.extend_from_slice(&[0x60, 0, 0, 0]); // version 6
        data.extend_from_slice(&(tcp.len() as u16).to_be_bytes());
        data.push(6); // next header: TCP
        data.push(64); // hop limit
        data.extend_from_slice(&[0u8; 15]);
        data.push(1); // src ::1
        data.extend_from_slice(&[0u8; 15]);
        data.push(2); // dst ::2
        data.extend_from_slice(&tcp);
        let desc = parse_frame(DLT_EN10MB, &data, data.len());
        let ip = desc.ip.expect("IP layer");
        assert_eq!(ip.src.to_string(), "::1");
        assert!(matches!(ip.transport, Transport::Tcp { dport: 3001, .. }));
    }

    #[test]
    fn test_empty_and_garbage_frames() {
        assert!(parse_frame(DLT_RAW, &[], 0).ip.is_none());
        assert!(parse_frame(DLT_RAW, &[0x00, 0x01], 2).ip.is_none());
        assert!(parse_frame(DLT_EN10MB, &[0u8; 6], 6).ip.is_none());
    }

    #[test]
    fn test_wire_len_survives_snaplen_truncation() {
        let data = tcp_frame([10, 0, 0, 5], [10, 0, 0, 2], 1, 2, b"");
        let desc = parse_frame(DLT_EN10MB, &data, 1514);
        assert_eq!(desc.wire_len, 1514);
    }
}
