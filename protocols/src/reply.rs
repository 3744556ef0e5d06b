//! Classification of captured frames.
//!
//! A frame qualifies as a liveness reply when it is one of:
//! * an ARP reply,
//! * an ICMPv4 echo reply,
//! * an ICMPv6 echo reply or neighbor advertisement,
//! * a TCP segment sent to the probe source port carrying SYN+ACK or RST.
//!
//! Frames sent by the local station are never replies.

use std::fmt;
use std::net::IpAddr;

use pnet::packet::Packet;
use pnet::packet::arp::{ArpOperations, ArpPacket};
use pnet::packet::ethernet::EtherTypes;
use pnet::packet::icmp::{IcmpPacket, IcmpTypes};
use pnet::packet::icmpv6::ndp::NeighborAdvertPacket;
use pnet::packet::icmpv6::{Icmpv6Packet, Icmpv6Types};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::{TcpFlags, TcpPacket};
use pnet::util::MacAddr;

use crate::{PacketError, ethernet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    ArpReply,
    IcmpEchoReply,
    Icmpv6EchoReply,
    NeighborAdvert,
    TcpSynAck,
    TcpReset,
}

/// A qualifying reply and the host it proves alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub source: IpAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyFilter {
    probe_port: u16,
    local_mac: Option<MacAddr>,
}

impl ReplyFilter {
    pub fn new(probe_port: u16) -> Self {
        Self {
            probe_port,
            local_mac: None,
        }
    }

    /// Drops frames whose source is `local_mac`. An all-zero address (loopback)
    /// is not treated as a station address.
    pub fn ignoring(mut self, local_mac: Option<MacAddr>) -> Self {
        self.local_mac = local_mac.filter(|mac| *mac != MacAddr::zero());
        self
    }

    pub fn probe_port(&self) -> u16 {
        self.probe_port
    }

    /// `Ok(None)` for well-formed frames that are not replies, `Err` for frames
    /// too short to be what their headers claim.
    pub fn classify(&self, frame: &[u8]) -> Result<Option<Reply>, PacketError> {
        let eth = ethernet::get_packet_from_u8(frame)?;

        if self.local_mac == Some(eth.get_source()) {
            return Ok(None);
        }

        match eth.get_ethertype() {
            EtherTypes::Arp => classify_arp(eth.payload()),
            EtherTypes::Ipv4 => self.classify_ipv4(eth.payload()),
            EtherTypes::Ipv6 => self.classify_ipv6(eth.payload()),
            _ => Ok(None),
        }
    }

    fn classify_ipv4(&self, bytes: &[u8]) -> Result<Option<Reply>, PacketError> {
        let ipv4 = Ipv4Packet::new(bytes).ok_or(PacketError::Truncated {
            layer: "IPv4",
            len: bytes.len(),
        })?;
        let source = IpAddr::V4(ipv4.get_source());

        match ipv4.get_next_level_protocol() {
            IpNextHeaderProtocols::Icmp => {
                let icmp = IcmpPacket::new(ipv4.payload()).ok_or(PacketError::Truncated {
                    layer: "ICMP",
                    len: ipv4.payload().len(),
                })?;
                Ok((icmp.get_icmp_type() == IcmpTypes::EchoReply).then_some(Reply {
                    kind: ReplyKind::IcmpEchoReply,
                    source,
                }))
            }
            IpNextHeaderProtocols::Tcp => self.classify_tcp(ipv4.payload(), source),
            _ => Ok(None),
        }
    }

    fn classify_ipv6(&self, bytes: &[u8]) -> Result<Option<Reply>, PacketError> {
        let ipv6 = Ipv6Packet::new(bytes).ok_or(PacketError::Truncated {
            layer: "IPv6",
            len: bytes.len(),
        })?;
        let source = IpAddr::V6(ipv6.get_source());

        match ipv6.get_next_header() {
            IpNextHeaderProtocols::Icmpv6 => classify_icmpv6(ipv6.payload(), source),
            IpNextHeaderProtocols::Tcp => self.classify_tcp(ipv6.payload(), source),
            _ => Ok(None),
        }
    }

    fn classify_tcp(&self, bytes: &[u8], source: IpAddr) -> Result<Option<Reply>, PacketError> {
        let segment = TcpPacket::new(bytes).ok_or(PacketError::Truncated {
            layer: "TCP",
            len: bytes.len(),
        })?;
        if segment.get_destination() != self.probe_port {
            return Ok(None);
        }

        let flags = segment.get_flags();
        let kind = if flags & TcpFlags::RST != 0 {
            ReplyKind::TcpReset
        } else if flags & (TcpFlags::SYN | TcpFlags::ACK) == TcpFlags::SYN | TcpFlags::ACK {
            ReplyKind::TcpSynAck
        } else {
            return Ok(None);
        };
        Ok(Some(Reply { kind, source }))
    }
}

fn classify_arp(bytes: &[u8]) -> Result<Option<Reply>, PacketError> {
    let arp = ArpPacket::new(bytes).ok_or(PacketError::Truncated {
        layer: "ARP",
        len: bytes.len(),
    })?;
    Ok((arp.get_operation() == ArpOperations::Reply).then(|| Reply {
        kind: ReplyKind::ArpReply,
        source: IpAddr::V4(arp.get_sender_proto_addr()),
    }))
}

fn classify_icmpv6(bytes: &[u8], source: IpAddr) -> Result<Option<Reply>, PacketError> {
    let truncated = PacketError::Truncated {
        layer: "ICMPv6",
        len: bytes.len(),
    };
    let icmp = Icmpv6Packet::new(bytes).ok_or(truncated.clone())?;

    match icmp.get_icmpv6_type() {
        Icmpv6Types::EchoReply => Ok(Some(Reply {
            kind: ReplyKind::Icmpv6EchoReply,
            source,
        })),
        Icmpv6Types::NeighborAdvert => {
            let advert = NeighborAdvertPacket::new(bytes).ok_or(truncated)?;
            Ok(Some(Reply {
                kind: ReplyKind::NeighborAdvert,
                source: IpAddr::V6(advert.get_target_addr()),
            }))
        }
        _ => Ok(None),
    }
}

/// Renders the filter as a capture expression, for logs.
impl fmt::Display for ReplyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(mac) = self.local_mac {
            write!(f, "not ether src {mac} and (")?;
        }
        write!(
            f,
            "(arp[6:2] = 2) or (icmp[icmptype] = icmp-echoreply) or \
             (icmp6 and (ip6[40] = 129 or ip6[40] = 136)) or \
             (tcp dst port {} and (tcp[tcpflags] & tcp-rst != 0 or \
             tcp[tcpflags] & (tcp-syn|tcp-ack) = (tcp-syn|tcp-ack)))",
            self.probe_port
        )?;
        if self.local_mac.is_some() {
            f.write_str(")")?;
        }
        Ok(())
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
