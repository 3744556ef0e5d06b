use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use pnet::datalink::NetworkInterface;
use pnet::packet::tcp::TcpFlags;
use pnet::util::MacAddr;
use thiserror::Error;
use vigil_common::network::interface::NetworkInterfaceExtension;
use vigil_common::{DetectionConfig, PortSelection, ProbeMethod};
use vigil_protocols::{self as protocol, PacketError};

use crate::network::sockets::SocketKind;

/// One datagram or frame ready for its socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub kind: SocketKind,
    pub destination: IpAddr,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CraftError {
    #[error("no route source address towards {0}")]
    NoSourceAddress(IpAddr),
    #[error("capture interface has no {0}")]
    MissingLinkAddress(&'static str),
    #[error("no TCP ports configured")]
    NoPorts,
    #[error(transparent)]
    Packet(#[from] PacketError),
}

/// Addresses of the capture interface, used for link-layer probes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkInfo {
    pub mac: Option<MacAddr>,
    pub ipv4: Option<Ipv4Addr>,
    pub link_local: Option<Ipv6Addr>,
}

impl From<&NetworkInterface> for LinkInfo {
    fn from(intf: &NetworkInterface) -> Self {
        Self {
            mac: intf.mac,
            ipv4: intf.first_ipv4(),
            link_local: intf.link_local_ipv6(),
        }
    }
}

pub struct PacketCrafter {
    link: LinkInfo,
    ports: Vec<u16>,
    port_selection: PortSelection,
    port_cursor: usize,
    source_port: u16,
    icmp_identifier: u16,
    icmp_sequence: u16,
}

impl PacketCrafter {
    pub fn new(config: &DetectionConfig, link: LinkInfo) -> Self {
        Self {
            link,
            ports: config.ports.clone(),
            port_selection: config.port_selection,
            port_cursor: 0,
            source_port: config.probe_source_port,
            icmp_identifier: rand::random(),
            icmp_sequence: 0,
        }
    }

    pub fn with_icmp_identifier(mut self, identifier: u16) -> Self {
        self.icmp_identifier = identifier;
        self
    }

    pub fn link(&self) -> &LinkInfo {
        &self.link
    }

    /// Builds the probes `method` sends to `target`. `source` is asked for the
    /// route source address only when a TCP pseudo-header needs one.
    pub fn craft(
        &mut self,
        target: IpAddr,
        method: ProbeMethod,
        source: impl FnOnce() -> Option<IpAddr>,
    ) -> Result<Vec<Probe>, CraftError> {
        let kind = SocketKind::for_method(method, target.is_ipv6());
        match method {
            ProbeMethod::Icmp => Ok(vec![self.echo_request(kind, target)?]),
            ProbeMethod::Arp => Ok(vec![self.link_request(kind, target)?]),
            ProbeMethod::TcpAck => self.tcp_probes(kind, target, TcpFlags::ACK, source),
            ProbeMethod::TcpSyn => self.tcp_probes(kind, target, TcpFlags::SYN, source),
        }
    }

    fn echo_request(&mut self, kind: SocketKind, target: IpAddr) -> Result<Probe, CraftError> {
        self.icmp_sequence = self.icmp_sequence.wrapping_add(1);
        let bytes = match target {
            IpAddr::V4(_) => {
                protocol::icmp::create_echo_request_v4(self.icmp_identifier, self.icmp_sequence)?
            }
            IpAddr::V6(_) => {
                protocol::icmp::create_echo_request_v6(self.icmp_identifier, self.icmp_sequence)?
            }
        };
        Ok(Probe {
            kind,
            destination: target,
            bytes,
        })
    }

    fn link_request(&self, kind: SocketKind, target: IpAddr) -> Result<Probe, CraftError> {
        let mac = self.link.mac.ok_or(CraftError::MissingLinkAddress("MAC address"))?;
        let bytes = match target {
            IpAddr::V4(dst) => {
                let src = self.link.ipv4.ok_or(CraftError::MissingLinkAddress("IPv4 address"))?;
                protocol::arp::create_request(mac, src, dst)?
            }
            IpAddr::V6(dst) => {
                let src = self
                    .link
                    .link_local
                    .ok_or(CraftError::MissingLinkAddress("IPv6 link-local address"))?;
                protocol::ndp::create_solicitation(mac, src, dst)?
            }
        };
        Ok(Probe {
            kind,
            destination: target,
            bytes,
        })
    }

    fn tcp_probes(
        &mut self,
        kind: SocketKind,
        target: IpAddr,
        flags: u8,
        source: impl FnOnce() -> Option<IpAddr>,
    ) -> Result<Vec<Probe>, CraftError> {
        if self.ports.is_empty() {
            return Err(CraftError::NoPorts);
        }
        let src = source().ok_or(CraftError::NoSourceAddress(target))?;

        let ports: Vec<u16> = match self.port_selection {
            PortSelection::Exhaustive => self.ports.clone(),
            PortSelection::RoundRobin => {
                let port = self.ports[self.port_cursor % self.ports.len()];
                self.port_cursor = (self.port_cursor + 1) % self.ports.len();
                vec![port]
            }
        };

        ports
            .into_iter()
            .map(|port| {
                let bytes = protocol::tcp::create_probe(
                    src,
                    target,
                    self.source_port,
                    port,
                    flags,
                    rand::random(),
                )?;
                Ok(Probe {
                    kind,
                    destination: target,
                    bytes,
                })
            })
            .collect()
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

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::icmp::echo_request::EchoRequestPacket;
    use pnet::packet::tcp::TcpPacket;
    use vigil_common::AliveTests;

    const LOCAL: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);

    fn link() -> LinkInfo {
        LinkInfo {
            mac: Some(MacAddr::new(0x02, 0, 0, 0, 0, 0x0a)),
            ipv4: Some(LOCAL),
            link_local: Some("fe80::a".parse().unwrap()),
        }
    }

    fn crafter(selection: PortSelection) -> PacketCrafter {
        let config = DetectionConfig {
            methods: AliveTests::TCP_SYN,
            ports: vec![22, 80, 443],
            port_selection: selection,
            ..Default::default()
        };
        PacketCrafter::new(&config, link())
    }

    fn local_source() -> Option<IpAddr> {
        Some(IpAddr::V4(LOCAL))
    }

    fn dst_ports(probes: &[Probe]) -> Vec<u16> {
        probes
            .iter()
            .map(|p| TcpPacket::new(&p.bytes).unwrap().get_destination())
            .collect()
    }

    #[test]
    fn exhaustive_selection_probes_every_port() {
        let mut crafter = crafter(PortSelection::Exhaustive);
        let target: IpAddr = "192.168.1.20".parse().unwrap();

        let probes = crafter.craft(target, ProbeMethod::TcpSyn, local_source).unwrap();
        assert_eq!(dst_ports(&probes), vec![22, 80, 443]);
        assert!(probes.iter().all(|p| p.kind == SocketKind::TcpV4));

        let seg = TcpPacket::new(&probes[0].bytes).unwrap();
        assert_eq!(seg.get_source(), 9910);
        assert_eq!(seg.get_flags(), TcpFlags::SYN);
    }

    #[test]
    fn round_robin_advances_across_targets() {
        let mut crafter = crafter(PortSelection::RoundRobin);
        let ports: Vec<u16> = (1..=4)
            .flat_map(|last| {
                let target = IpAddr::V4(Ipv4Addr::new(192, 168, 1, last));
                dst_ports(&crafter.craft(target, ProbeMethod::TcpAck, local_source).unwrap())
            })
            .collect();
        assert_eq!(ports, vec![22, 80, 443, 22]);
    }

    #[test]
    fn tcp_without_route_is_skipped() {
        let mut crafter = crafter(PortSelection::Exhaustive);
        let target: IpAddr = "192.168.1.20".parse().unwrap();
        assert_eq!(
            crafter.craft(target, ProbeMethod::TcpSyn, || None),
            Err(CraftError::NoSourceAddress(target))
        );
    }

    #[test]
    fn source_lookup_only_for_tcp() {
        let mut crafter = crafter(PortSelection::Exhaustive);
        let target: IpAddr = "192.168.1.20".parse().unwrap();
        let probes = crafter
            .craft(target, ProbeMethod::Icmp, || panic!("no lookup expected"))
            .unwrap();
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].kind, SocketKind::IcmpV4);
    }

    #[test]
    fn echo_requests_carry_identifier_and_rising_sequence() {
        let mut crafter = crafter(PortSelection::Exhaustive).with_icmp_identifier(0x4242);
        let target: IpAddr = "192.168.1.20".parse().unwrap();

        let first = crafter.craft(target, ProbeMethod::Icmp, || None).unwrap();
        let second = crafter.craft(target, ProbeMethod::Icmp, || None).unwrap();

        let first = EchoRequestPacket::new(&first[0].bytes).unwrap();
        let second = EchoRequestPacket::new(&second[0].bytes).unwrap();
        assert_eq!(first.get_identifier(), 0x4242);
        assert_eq!(second.get_sequence_number(), first.get_sequence_number() + 1);
    }

    #[test]
    fn arp_picks_family_specific_frame() {
        let mut crafter = crafter(PortSelection::Exhaustive);

        let v4 = crafter
            .craft("192.168.1.20".parse().unwrap(), ProbeMethod::Arp, || None)
            .unwrap();
        assert_eq!(v4[0].kind, SocketKind::ArpV4);
        assert_eq!(v4[0].bytes.len(), protocol::MIN_ETH_FRAME_NO_FCS);

        let v6 = crafter
            .craft("fe80::20".parse().unwrap(), ProbeMethod::Arp, || None)
            .unwrap();
        assert_eq!(v6[0].kind, SocketKind::ArpV6);
    }

    #[test]
    fn arp_needs_interface_addresses() {
        let config = DetectionConfig::default();
        let mut crafter = PacketCrafter::new(&config, LinkInfo::default());
        assert_eq!(
            crafter.craft("10.0.0.1".parse().unwrap(), ProbeMethod::Arp, || None),
            Err(CraftError::MissingLinkAddress("MAC address"))
        );
    }
}
