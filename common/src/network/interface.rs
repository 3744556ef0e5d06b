use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, UdpSocket};

use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::IpNetwork;

pub trait NetworkInterfaceExtension {
    fn first_ipv4(&self) -> Option<Ipv4Addr>;
    fn link_local_ipv6(&self) -> Option<Ipv6Addr>;
    fn owns_addr(&self, addr: IpAddr) -> bool;
    fn contains_addr(&self, addr: IpAddr) -> bool;
}

impl NetworkInterfaceExtension for NetworkInterface {
    fn first_ipv4(&self) -> Option<Ipv4Addr> {
        self.ips.iter().find_map(|net| match net {
            IpNetwork::V4(v4) => Some(v4.ip()),
            IpNetwork::V6(_) => None,
        })
    }

    fn link_local_ipv6(&self) -> Option<Ipv6Addr> {
        self.ips.iter().find_map(|net| match net {
            IpNetwork::V6(v6) if v6.ip().is_unicast_link_local() => Some(v6.ip()),
            _ => None,
        })
    }

    fn owns_addr(&self, addr: IpAddr) -> bool {
        self.ips.iter().any(|net| net.ip() == addr)
    }

    /// Whether `addr` sits inside one of the interface's on-link networks.
    fn contains_addr(&self, addr: IpAddr) -> bool {
        self.ips.iter().any(|net| match (addr, net) {
            (IpAddr::V4(_), IpNetwork::V4(_)) | (IpAddr::V6(_), IpNetwork::V6(_)) => {
                net.contains(addr)
            }
            _ => false,
        })
    }
}

/// Binds an unconnected UDP socket used only to ask the kernel for routes.
pub fn bind_route_probe(ipv6: bool) -> io::Result<UdpSocket> {
    let bind_addr = if ipv6 { "[::]:0" } else { "0.0.0.0:0" };
    UdpSocket::bind(bind_addr)
}

/// Local address the kernel would use to reach `target`.
///
/// Connecting a UDP socket sends nothing; it only fixes the route.
pub fn route_source_ip(socket: &UdpSocket, target: IpAddr) -> Option<IpAddr> {
    socket.connect((target, 53)).ok()?;
    socket.local_addr().ok().map(|s| s.ip())
}

/// Picks the interface replies for `targets` will arrive on.
///
/// An explicit `name` always wins. Otherwise the first target decides: an
/// interface whose network contains it, then the interface owning the route
/// source address, then the first usable non-loopback interface.
pub fn select_capture_interface(
    interfaces: &[NetworkInterface],
    name: Option<&str>,
    targets: &[IpAddr],
    route_source: impl Fn(IpAddr) -> Option<IpAddr>,
) -> anyhow::Result<NetworkInterface> {
    if let Some(name) = name {
        return interfaces
            .iter()
            .find(|intf| intf.name == name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no interface named '{name}'"));
    }

    let usable = |intf: &&NetworkInterface| intf.is_up() && !intf.ips.is_empty();

    if let Some(&target) = targets.first() {
        if let Some(intf) = interfaces
            .iter()
            .filter(usable)
            .find(|intf| intf.contains_addr(target))
        {
            return Ok(intf.clone());
        }

        if let Some(source) = route_source(target) {
            if let Some(intf) = interfaces
                .iter()
                .filter(usable)
                .find(|intf| intf.owns_addr(source))
            {
                return Ok(intf.clone());
            }
        }
    }

    interfaces
        .iter()
        .filter(usable)
        .find(|intf| !intf.is_loopback())
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("no usable network interface found"))
}

/// [`select_capture_interface`] against the host's real interfaces and routes.
pub fn capture_interface(
    name: Option<&str>,
    targets: &[IpAddr],
) -> anyhow::Result<NetworkInterface> {
    let interfaces: Vec<NetworkInterface> = datalink::interfaces();
    let probe_v4: Option<UdpSocket> = bind_route_probe(false).ok();
    let probe_v6: Option<UdpSocket> = bind_route_probe(true).ok();

    select_capture_interface(&interfaces, name, targets, |target| {
        let socket = if target.is_ipv4() {
            probe_v4.as_ref()
        } else {
            probe_v6.as_ref()
        }?;
        route_source_ip(socket, target)
    })
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
    use pnet::ipnetwork::{Ipv4Network, Ipv6Network};
    use pnet::util::MacAddr;

    const IFF_UP: u32 = 1;
    const IFF_BROADCAST: u32 = 1 << 1;
    const IFF_LOOPBACK: u32 = 1 << 3;

    fn ni(name: &str, ips: &[IpNetwork], flags: u32) -> NetworkInterface {
        NetworkInterface {
            name: name.into(),
            description: "".into(),
            index: 0,
            mac: Some(MacAddr(0x1, 0x2, 0x3, 0x4, 0x5, 0x6)),
            ips: ips.to_vec(),
            flags,
        }
    }

    fn v4(a: u8, b: u8, c: u8, d: u8, p: u8) -> IpNetwork {
        IpNetwork::V4(Ipv4Network::new(Ipv4Addr::new(a, b, c, d), p).unwrap())
    }

    fn v6(s: &str, p: u8) -> IpNetwork {
        IpNetwork::V6(Ipv6Network::new(s.parse::<Ipv6Addr>().unwrap(), p).unwrap())
    }

    fn host_interfaces() -> Vec<NetworkInterface> {
        vec![
            ni("lo", &[v4(127, 0, 0, 1, 8)], IFF_UP | IFF_LOOPBACK),
            ni(
                "eth0",
                &[v4(192, 168, 1, 10, 24), v6("fe80::aa:1", 64)],
                IFF_UP | IFF_BROADCAST,
            ),
            ni("wg0", &[v4(10, 8, 0, 2, 24)], IFF_UP),
        ]
    }

    fn no_route(_: IpAddr) -> Option<IpAddr> {
        None
    }

    #[test]
    fn extension_reads_addresses() {
        let intf = &host_interfaces()[1];
        assert_eq!(intf.first_ipv4(), Some(Ipv4Addr::new(192, 168, 1, 10)));
        assert_eq!(intf.link_local_ipv6(), Some("fe80::aa:1".parse().unwrap()));
        assert!(intf.owns_addr("192.168.1.10".parse().unwrap()));
        assert!(intf.contains_addr("192.168.1.99".parse().unwrap()));
        assert!(!intf.contains_addr("192.168.2.1".parse().unwrap()));
    }

    #[test]
    fn explicit_name_wins() {
        let chosen = select_capture_interface(
            &host_interfaces(),
            Some("wg0"),
            &["192.168.1.5".parse().unwrap()],
            no_route,
        )
        .unwrap();
        assert_eq!(chosen.name, "wg0");

        let missing =
            select_capture_interface(&host_interfaces(), Some("eth9"), &[], no_route);
        assert!(missing.is_err());
    }

    #[test]
    fn on_link_target_selects_its_network() {
        let chosen = select_capture_interface(
            &host_interfaces(),
            None,
            &["10.8.0.77".parse().unwrap()],
            no_route,
        )
        .unwrap();
        assert_eq!(chosen.name, "wg0");
    }

    #[test]
    fn routed_target_selects_route_source_owner() {
        let chosen = select_capture_interface(
            &host_interfaces(),
            None,
            &["8.8.8.8".parse().unwrap()],
            |_| Some("10.8.0.2".parse().unwrap()),
        )
        .unwrap();
        assert_eq!(chosen.name, "wg0");
    }

    #[test]
    fn falls_back_to_first_non_loopback() {
        let chosen = select_capture_interface(
            &host_interfaces(),
            None,
            &["8.8.8.8".parse().unwrap()],
            no_route,
        )
        .unwrap();
        assert_eq!(chosen.name, "eth0");

        let only_lo = vec![ni("lo", &[v4(127, 0, 0, 1, 8)], IFF_UP | IFF_LOOPBACK)];
        assert!(select_capture_interface(&only_lo, None, &[], no_route).is_err());
    }
}
