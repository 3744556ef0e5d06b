use std::net::IpAddr;

use pnet::packet::tcp::{self, MutableTcpPacket};

use crate::{PacketError, TCP_HDR_LEN};

const PROBE_WINDOW: u16 = 1024;

/// Bare TCP header (no options, no payload) for a raw `IPPROTO_TCP` socket.
///
/// The checksum covers the pseudo-header built from `src` and `dst`, so both
/// must be of the same family.
pub fn create_probe(
    src: IpAddr,
    dst: IpAddr,
    src_port: u16,
    dst_port: u16,
    flags: u8,
    sequence: u32,
) -> Result<Vec<u8>, PacketError> {
    if src.is_ipv4() != dst.is_ipv4() {
        return Err(PacketError::FamilyMismatch { src, dst });
    }

    let mut pkt = [0u8; TCP_HDR_LEN];
    let mut segment = MutableTcpPacket::new(&mut pkt).ok_or(PacketError::Buffer("TCP"))?;
    segment.set_source(src_port);
    segment.set_destination(dst_port);
    segment.set_sequence(sequence);
    segment.set_acknowledgement(0);
    segment.set_data_offset((TCP_HDR_LEN / 4) as u8);
    segment.set_reserved(0);
    segment.set_flags(flags);
    segment.set_window(PROBE_WINDOW);
    segment.set_urgent_ptr(0);

    let csm = match (src, dst) {
        (IpAddr::V4(s), IpAddr::V4(d)) => tcp::ipv4_checksum(&segment.to_immutable(), &s, &d),
        (IpAddr::V6(s), IpAddr::V6(d)) => tcp::ipv6_checksum(&segment.to_immutable(), &s, &d),
        _ => return Err(PacketError::FamilyMismatch { src, dst }),
    };
    segment.set_checksum(csm);

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

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::tcp::{TcpFlags, TcpPacket};
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn syn_probe_v4_fields_and_checksum() {
        let src = Ipv4Addr::new(192, 168, 1, 10);
        let dst = Ipv4Addr::new(192, 168, 1, 20);
        let bytes =
            create_probe(src.into(), dst.into(), 9910, 80, TcpFlags::SYN, 0xdead_beef).unwrap();

        let seg = TcpPacket::new(&bytes).unwrap();
        assert_eq!(seg.get_source(), 9910);
        assert_eq!(seg.get_destination(), 80);
        assert_eq!(seg.get_flags(), TcpFlags::SYN);
        assert_eq!(seg.get_sequence(), 0xdead_beef);
        assert_eq!(seg.get_data_offset(), 5);
        assert_eq!(tcp::ipv4_checksum(&seg, &src, &dst), seg.get_checksum());
    }

    #[test]
    fn ack_probe_v6_checksum() {
        let src: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let dst: Ipv6Addr = "2001:db8::2".parse().unwrap();
        let bytes = create_probe(src.into(), dst.into(), 9910, 443, TcpFlags::ACK, 1).unwrap();

        let seg = TcpPacket::new(&bytes).unwrap();
        assert_eq!(seg.get_flags(), TcpFlags::ACK);
        assert_eq!(tcp::ipv6_checksum(&seg, &src, &dst), seg.get_checksum());
    }

    #[test]
    fn mixed_families_are_rejected() {
        let src: IpAddr = "10.0.0.1".parse().unwrap();
        let dst: IpAddr = "::1".parse().unwrap();
        assert_eq!(
            create_probe(src, dst, 9910, 80, TcpFlags::SYN, 0),
            Err(PacketError::FamilyMismatch { src, dst })
        );
    }
}
