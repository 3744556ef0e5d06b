//! Builders for frames as they come off the wire, addressed to [`LOCAL_MAC`].

use std::net::{Ipv4Addr, Ipv6Addr};

use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, MutableArpPacket};
use pnet::packet::ethernet::{EtherType, EtherTypes, MutableEthernetPacket};
use pnet::packet::icmp::{IcmpType, IcmpTypes, MutableIcmpPacket};
use pnet::packet::icmpv6::{Icmpv6Types, MutableIcmpv6Packet};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::MutableIpv4Packet;
use pnet::packet::ipv6::MutableIpv6Packet;
use pnet::packet::tcp::MutableTcpPacket;
use pnet::util::MacAddr;

use crate::{ARP_LEN, ETH_HDR_LEN, IP_V4_HDR_LEN, IP_V6_HDR_LEN, TCP_HDR_LEN};

pub const LOCAL_MAC: MacAddr = MacAddr(0x02, 0, 0, 0, 0, 0x0a);
pub const REMOTE_MAC: MacAddr = MacAddr(0x02, 0, 0, 0, 0, 0x0b);

pub fn ethernet_frame(src_mac: MacAddr, et: EtherType, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; ETH_HDR_LEN + payload.len()];
    let mut eth = MutableEthernetPacket::new(&mut buf).expect("ethernet buffer");
    eth.set_source(src_mac);
    eth.set_destination(LOCAL_MAC);
    eth.set_ethertype(et);
    eth.set_payload(payload);
    buf
}

pub fn ipv4_frame(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    proto: IpNextHeaderProtocol,
    payload: &[u8],
) -> Vec<u8> {
    let mut buf = vec![0u8; IP_V4_HDR_LEN + payload.len()];
    let mut ip = MutableIpv4Packet::new(&mut buf).expect("ipv4 buffer");
    ip.set_version(4);
    ip.set_header_length(5);
    ip.set_total_length((IP_V4_HDR_LEN + payload.len()) as u16);
    ip.set_ttl(64);
    ip.set_next_level_protocol(proto);
    ip.set_source(src);
    ip.set_destination(dst);
    ip.set_payload(payload);
    ethernet_frame(REMOTE_MAC, EtherTypes::Ipv4, &buf)
}

pub fn ipv6_frame(
    src: Ipv6Addr,
    dst: Ipv6Addr,
    proto: IpNextHeaderProtocol,
    payload: &[u8],
) -> Vec<u8> {
    let mut buf = vec![0u8; IP_V6_HDR_LEN + payload.len()];
    let mut ip = MutableIpv6Packet::new(&mut buf).expect("ipv6 buffer");
    ip.set_version(6);
    ip.set_payload_length(payload.len() as u16);
    ip.set_next_header(proto);
    ip.set_hop_limit(255);
    ip.set_source(src);
    ip.set_destination(dst);
    ip.set_payload(payload);
    ethernet_frame(REMOTE_MAC, EtherTypes::Ipv6, &buf)
}

pub fn icmp_v4(src: Ipv4Addr, dst: Ipv4Addr, icmp_type: IcmpType) -> Vec<u8> {
    let mut buf = vec![0u8; 8];
    MutableIcmpPacket::new(&mut buf)
        .expect("icmp buffer")
        .set_icmp_type(icmp_type);
    ipv4_frame(src, dst, IpNextHeaderProtocols::Icmp, &buf)
}

pub fn echo_reply_v4(src: Ipv4Addr, dst: Ipv4Addr) -> Vec<u8> {
    icmp_v4(src, dst, IcmpTypes::EchoReply)
}

pub fn tcp_v4(src: Ipv4Addr, dst: Ipv4Addr, dst_port: u16, flags: u8) -> Vec<u8> {
    let mut buf = vec![0u8; TCP_HDR_LEN];
    let mut seg = MutableTcpPacket::new(&mut buf).expect("tcp buffer");
    seg.set_source(80);
    seg.set_destination(dst_port);
    seg.set_data_offset(5);
    seg.set_flags(flags);
    ipv4_frame(src, dst, IpNextHeaderProtocols::Tcp, &buf)
}

pub fn arp_reply(sender: Ipv4Addr, target: Ipv4Addr) -> Vec<u8> {
    let mut buf = vec![0u8; ARP_LEN];
    let mut arp = MutableArpPacket::new(&mut buf).expect("arp buffer");
    arp.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp.set_protocol_type(EtherTypes::Ipv4);
    arp.set_hw_addr_len(6);
    arp.set_proto_addr_len(4);
    arp.set_operation(ArpOperations::Reply);
    arp.set_sender_hw_addr(REMOTE_MAC);
    arp.set_sender_proto_addr(sender);
    arp.set_target_hw_addr(LOCAL_MAC);
    arp.set_target_proto_addr(target);
    ethernet_frame(REMOTE_MAC, EtherTypes::Arp, &buf)
}

pub fn echo_reply_v6(src: Ipv6Addr, dst: Ipv6Addr) -> Vec<u8> {
    let mut buf = vec![0u8; 8];
    MutableIcmpv6Packet::new(&mut buf)
        .expect("icmpv6 buffer")
        .set_icmpv6_type(Icmpv6Types::EchoReply);
    ipv6_frame(src, dst, IpNextHeaderProtocols::Icmpv6, &buf)
}

pub fn neighbor_advert(target: Ipv6Addr, dst: Ipv6Addr) -> Vec<u8> {
    let mut buf = vec![0u8; 24];
    buf[0] = 136;
    buf[8..24].copy_from_slice(&target.octets());
    ipv6_frame(target, dst, IpNextHeaderProtocols::Icmpv6, &buf)
}
