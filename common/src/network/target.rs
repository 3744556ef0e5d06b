//! # Target Lists
//!
//! Parses the host specification handed to a detection run into a flat,
//! de-duplicated list of addresses. Supported forms, comma separated:
//! * A single IPv4/IPv6 address (`192.168.1.5`, `fe80::1`).
//! * An IPv4 range (`192.168.1.1-50`, `192.168.1.1-192.168.1.50`).
//! * A CIDR block (`192.168.1.0/24`, `2001:db8::/120`).

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use pnet::ipnetwork::IpNetwork;
use thiserror::Error;

use crate::network::range::{self, Ipv4Range};

/// Upper bound on how many addresses a single specification may expand to.
pub const MAX_TARGETS: usize = 1 << 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("invalid target '{0}'")]
    Invalid(String),
    #[error("invalid range '{0}': {1}")]
    InvalidRange(String, String),
    #[error("invalid CIDR block '{0}': {1}")]
    InvalidCidr(String, String),
    #[error("'{spec}' expands to {size} addresses, more than allowed per run")]
    TooLarge { spec: String, size: u128 },
    #[error("no targets given")]
    Empty,
}

/// Ordered set of target addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetList {
    addrs: Vec<IpAddr>,
    seen: HashSet<IpAddr>,
}

impl TargetList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `addr` unless already present. Returns whether it was new.
    pub fn push(&mut self, addr: IpAddr) -> bool {
        if !self.seen.insert(addr) {
            return false;
        }
        self.addrs.push(addr);
        true
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IpAddr> {
        self.addrs.iter()
    }

    pub fn as_slice(&self) -> &[IpAddr] {
        &self.addrs
    }

    pub fn into_vec(self) -> Vec<IpAddr> {
        self.addrs
    }

    pub fn has_ipv4(&self) -> bool {
        self.addrs.iter().any(IpAddr::is_ipv4)
    }

    pub fn has_ipv6(&self) -> bool {
        self.addrs.iter().any(IpAddr::is_ipv6)
    }

    fn extend_checked(
        &mut self,
        spec: &str,
        addrs: impl Iterator<Item = IpAddr>,
    ) -> Result<(), TargetError> {
        for addr in addrs {
            self.push(addr);
            if self.len() > MAX_TARGETS {
                return Err(TargetError::TooLarge {
                    spec: spec.to_string(),
                    size: self.len() as u128,
                });
            }
        }
        Ok(())
    }
}

impl FromIterator<IpAddr> for TargetList {
    fn from_iter<I: IntoIterator<Item = IpAddr>>(iter: I) -> Self {
        let mut list = TargetList::new();
        for addr in iter {
            list.push(addr);
        }
        list
    }
}

impl FromStr for TargetList {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut list = TargetList::new();

        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Ok(addr) = part.parse::<IpAddr>() {
                list.push(addr);
            } else if part.contains('/') {
                parse_cidr(part, &mut list)?;
            } else if part.contains('-') {
                let range = parse_ip_range(part)?;
                list.extend_checked(part, range.to_iter())?;
            } else {
                return Err(TargetError::Invalid(part.to_string()));
            }
        }

        if list.is_empty() {
            return Err(TargetError::Empty);
        }
        Ok(list)
    }
}

fn parse_cidr(s: &str, list: &mut TargetList) -> Result<(), TargetError> {
    let network: IpNetwork = s
        .parse()
        .map_err(|e: pnet::ipnetwork::IpNetworkError| {
            TargetError::InvalidCidr(s.to_string(), e.to_string())
        })?;

    match network {
        IpNetwork::V4(net) => {
            let hosts = range::cidr_hosts(net);
            if hosts.len() > MAX_TARGETS as u64 {
                return Err(TargetError::TooLarge {
                    spec: s.to_string(),
                    size: u128::from(hosts.len()),
                });
            }
            list.extend_checked(s, hosts.to_iter())
        }
        IpNetwork::V6(net) => {
            let size: u128 = net.size();
            if size > MAX_TARGETS as u128 {
                return Err(TargetError::TooLarge {
                    spec: s.to_string(),
                    size,
                });
            }
            list.extend_checked(s, net.iter().map(IpAddr::V6))
        }
    }
}

/// Parses a range string like "1.1.1.1-2.2.2.2" or "1.1.1.1-50".
fn parse_ip_range(s: &str) -> Result<Ipv4Range, TargetError> {
    let invalid = |reason: String| TargetError::InvalidRange(s.to_string(), reason);

    let Some((start_str, end_str)) = s.split_once('-') else {
        return Err(invalid("missing '-'".to_string()));
    };

    let start_addr = start_str
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|e| invalid(format!("start address: {e}")))?;

    let end_addr = parse_range_end_addr(end_str.trim(), &start_addr).map_err(invalid)?;

    Ipv4Range::new(start_addr, end_addr).map_err(|_| invalid("start is above end".to_string()))
}

/// Handles abbreviated forms like "192.168.1.1-50" (implies 192.168.1.50)
/// and full forms like "192.168.1.1-192.168.1.255".
fn parse_range_end_addr(end_str: &str, start_addr: &Ipv4Addr) -> Result<Ipv4Addr, String> {
    if let Ok(full_addr) = end_str.parse::<Ipv4Addr>() {
        return Ok(full_addr);
    }

    let partial_octets: Vec<u8> = end_str
        .split('.')
        .map(|octet_str| octet_str.parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|e| format!("end '{end_str}': {e}"))?;

    if partial_octets.len() > 4 {
        return Err(format!("end '{end_str}' has too many octets"));
    }

    let mut end_octets = start_addr.octets();
    let start_index = 4 - partial_octets.len();
    end_octets[start_index..].copy_from_slice(&partial_octets);

    Ok(Ipv4Addr::from(end_octets))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
