use pnet::packet::Packet;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{self, IcmpCode, IcmpPacket, IcmpTypes};
use pnet::packet::icmpv6::echo_request::MutableEchoRequestPacket as MutableEchoRequestV6Packet;
use pnet::packet::icmpv6::{Icmpv6Code, Icmpv6Types};

use crate::{ICMP_ECHO_LEN, PacketError};

/// ICMPv4 echo request for a raw `IPPROTO_ICMP` socket, checksum included.
pub fn create_echo_request_v4(identifier: u16, sequence: u16) -> Result<Vec<u8>, PacketError> {
    let mut pkt = [0u8; ICMP_ECHO_LEN];
    let mut icmp =
        MutableEchoRequestPacket::new(&mut pkt).ok_or(PacketError::Buffer("ICMP echo"))?;

    icmp.set_icmp_type(IcmpTypes::EchoRequest);
    icmp.set_icmp_code(IcmpCode(0));
    icmp.set_identifier(identifier);
    icmp.set_sequence_number(sequence);

    icmp.set_checksum(0);
    let csm = IcmpPacket::new(icmp.packet())
        .map(|imm| icmp::checksum(&imm))
        .ok_or(PacketError::Buffer("ICMP"))?;
    icmp.set_checksum(csm);

    Ok(Vec::from(pkt))
}

/// ICMPv6 echo request for a raw `IPPROTO_ICMPV6` socket.
///
/// The checksum is left zero: it covers the IPv6 pseudo-header, which the
/// kernel fills in for raw ICMPv6 sockets.
pub fn create_echo_request_v6(identifier: u16, sequence: u16) -> Result<Vec<u8>, PacketError> {
    let mut pkt = [0u8; ICMP_ECHO_LEN];
    let mut icmp = MutableEchoRequestV6Packet::new(&mut pkt)
        .ok_or(PacketError::Buffer("ICMPv6 echo"))?;

    icmp.set_icmpv6_type(Icmpv6Types::EchoRequest);
    icmp.set_icmpv6_code(Icmpv6Code(0));
    icmp.set_identifier(identifier);
    icmp.set_sequence_number(sequence);
    icmp.set_checksum(0);

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
