use std::net::{IpAddr, Ipv4Addr};

use pnet::ipnetwork::Ipv4Network;

use crate::network::target::TargetError;

/// An inclusive run of IPv4 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Result<Self, TargetError> {
        if start_addr > end_addr {
            return Err(TargetError::InvalidRange(
                format!("{start_addr}-{end_addr}"),
                "start address is above end address".to_string(),
            ));
        }
        Ok(Self {
            start_addr,
            end_addr,
        })
    }

    pub fn len(&self) -> u64 {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        u64::from(end - start) + 1
    }

    pub fn to_iter(&self) -> impl Iterator<Item = IpAddr> {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        (start..=end).map(|ip| IpAddr::V4(Ipv4Addr::from(ip)))
    }
}

/// Host addresses of an IPv4 block. Network and broadcast addresses are
/// left out unless the block is a /31 or /32.
pub fn cidr_hosts(network: Ipv4Network) -> Ipv4Range {
    let start = network.network();
    let end = network.broadcast();
    if network.prefix() >= 31 {
        return Ipv4Range {
            start_addr: start,
            end_addr: end,
        };
    }
    Ipv4Range {
        start_addr: Ipv4Addr::from(u32::from(start) + 1),
        end_addr: Ipv4Addr::from(u32::from(end) - 1),
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
