//! Neighbor solicitation, the IPv6 counterpart of an ARP who-has.

use std::net::Ipv6Addr;

use pnet::packet::ethernet::EtherTypes;
use pnet::packet::icmpv6::ndp::MutableNeighborSolicitPacket;
use pnet::packet::icmpv6::{self, Icmpv6Code, Icmpv6Packet, Icmpv6Types};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv6::MutableIpv6Packet;
use pnet::util::MacAddr;

use crate::{ETH_HDR_LEN, IP_V6_HDR_LEN, PacketError, ethernet};

const NS_LEN: usize = 24;
const SOURCE_LL_OPTION_LEN: usize = 8;
const NDP_HOP_LIMIT: u8 = 255;

/// Solicited-node multicast group of `target` (ff02::1:ffXX:XXXX).
pub fn solicited_node_multicast(target: Ipv6Addr) -> Ipv6Addr {
    let o = target.octets();
    Ipv6Addr::new(
        0xff02,
        0,
        0,
        0,
        0,
        1,
        0xff00 | u16::from(o[13]),
        u16::from_be_bytes([o[14], o[15]]),
    )
}

/// Full Ethernet frame soliciting `target`, with a source link-layer option.
pub fn create_solicitation(
    src_mac: MacAddr,
    src_addr: Ipv6Addr,
    target: Ipv6Addr,
) -> Result<Vec<u8>, PacketError> {
    const ICMP_LEN: usize = NS_LEN + SOURCE_LL_OPTION_LEN;
    const ICMP_START: usize = ETH_HDR_LEN + IP_V6_HDR_LEN;

    let group = solicited_node_multicast(target);
    let mut pkt = [0u8; ICMP_START + ICMP_LEN];

    ethernet::make_header(
        &mut pkt,
        src_mac,
        ethernet::ipv6_multicast_mac(group),
        EtherTypes::Ipv6,
    )?;

    {
        let mut ip = MutableIpv6Packet::new(&mut pkt[ETH_HDR_LEN..ICMP_START])
            .ok_or(PacketError::Buffer("IPv6"))?;
        ip.set_version(6);
        ip.set_traffic_class(0);
        ip.set_flow_label(0);
        ip.set_payload_length(ICMP_LEN as u16);
        ip.set_next_header(IpNextHeaderProtocols::Icmpv6);
        ip.set_hop_limit(NDP_HOP_LIMIT);
        ip.set_source(src_addr);
        ip.set_destination(group);
    }

    {
        let mut ns = MutableNeighborSolicitPacket::new(&mut pkt[ICMP_START..ICMP_START + NS_LEN])
            .ok_or(PacketError::Buffer("neighbor solicitation"))?;
        ns.set_icmpv6_type(Icmpv6Types::NeighborSolicit);
        ns.set_icmpv6_code(Icmpv6Code(0));
        ns.set_reserved(0);
        ns.set_target_addr(target);
    }

    // Source link-layer address option: type 1, length in 8-octet units.
    let MacAddr(a, b, c, d, e, f) = src_mac;
    pkt[ICMP_START + NS_LEN..].copy_from_slice(&[1, 1, a, b, c, d, e, f]);

    let csm = Icmpv6Packet::new(&pkt[ICMP_START..])
        .map(|imm| icmpv6::checksum(&imm, &src_addr, &group))
        .ok_or(PacketError::Buffer("ICMPv6"))?;
    pkt[ICMP_START + 2..ICMP_START + 4].copy_from_slice(&csm.to_be_bytes());

    Ok(Vec::from(pkt))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
