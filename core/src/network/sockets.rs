//! # Socket Pool
//!
//! One raw sending socket per (protocol, address family) the run needs.
//! Which sockets that is follows from the enabled methods and the families
//! present among the targets; see [`SocketPlan`]. ICMP and TCP probes go out
//! through layer-4 raw sockets, ARP and neighbor solicitation through an
//! Ethernet channel on the capture interface.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::net::{IpAddr, UdpSocket};

use pnet::datalink::{self, Channel, Config, DataLinkSender, NetworkInterface};
use pnet::packet::Packet;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::transport::{self, TransportChannelType, TransportProtocol, TransportSender};
use thiserror::Error;
use vigil_common::network::interface;
use vigil_common::{AliveTests, ProbeMethod, warn};

use crate::network::channel;
use crate::scanner::Transmit;
use crate::scanner::crafter::Probe;

const TRANSPORT_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SocketKind {
    TcpV4,
    TcpV6,
    IcmpV4,
    IcmpV6,
    ArpV4,
    /// Neighbor solicitation; plays the part of ARP for IPv6 targets.
    ArpV6,
}

impl SocketKind {
    pub fn for_method(method: ProbeMethod, ipv6: bool) -> Self {
        match (method, ipv6) {
            (ProbeMethod::TcpAck | ProbeMethod::TcpSyn, false) => SocketKind::TcpV4,
            (ProbeMethod::TcpAck | ProbeMethod::TcpSyn, true) => SocketKind::TcpV6,
            (ProbeMethod::Icmp, false) => SocketKind::IcmpV4,
            (ProbeMethod::Icmp, true) => SocketKind::IcmpV6,
            (ProbeMethod::Arp, false) => SocketKind::ArpV4,
            (ProbeMethod::Arp, true) => SocketKind::ArpV6,
        }
    }

    pub fn is_link_layer(self) -> bool {
        matches!(self, SocketKind::ArpV4 | SocketKind::ArpV6)
    }

    fn channel_type(self) -> Option<TransportChannelType> {
        use TransportChannelType::Layer4;
        use TransportProtocol::{Ipv4, Ipv6};

        match self {
            SocketKind::TcpV4 => Some(Layer4(Ipv4(IpNextHeaderProtocols::Tcp))),
            SocketKind::TcpV6 => Some(Layer4(Ipv6(IpNextHeaderProtocols::Tcp))),
            SocketKind::IcmpV4 => Some(Layer4(Ipv4(IpNextHeaderProtocols::Icmp))),
            SocketKind::IcmpV6 => Some(Layer4(Ipv6(IpNextHeaderProtocols::Icmpv6))),
            SocketKind::ArpV4 | SocketKind::ArpV6 => None,
        }
    }
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocketKind::TcpV4 => "TCPv4",
            SocketKind::TcpV6 => "TCPv6",
            SocketKind::IcmpV4 => "ICMPv4",
            SocketKind::IcmpV6 => "ICMPv6",
            SocketKind::ArpV4 => "ARPv4",
            SocketKind::ArpV6 => "ARPv6",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("failed to open {kind} socket: {source}")]
    Open {
        kind: SocketKind,
        #[source]
        source: io::Error,
    },
    #[error("failed to open link-layer channel on {interface}: {source}")]
    Link {
        interface: String,
        #[source]
        source: io::Error,
    },
    #[error("link-layer channel on {interface} is not Ethernet")]
    NotEthernet { interface: String },
    #[error("{0} socket needs a capture interface")]
    NoInterface(SocketKind),
    #[error("{0} socket is not open")]
    NotOpen(SocketKind),
    #[error("sending to {destination} over {kind} failed: {source}")]
    Send {
        kind: SocketKind,
        destination: IpAddr,
        #[source]
        source: io::Error,
    },
}

/// The sockets a run needs, worked out before anything is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocketPlan {
    kinds: BTreeSet<SocketKind>,
}

impl SocketPlan {
    pub fn new(methods: AliveTests, targets: &[IpAddr]) -> Self {
        if methods.contains(AliveTests::CONSIDER_ALIVE) {
            return Self::default();
        }
        let has_v4 = targets.iter().any(IpAddr::is_ipv4);
        let has_v6 = targets.iter().any(IpAddr::is_ipv6);

        let kinds = methods
            .probing_methods()
            .into_iter()
            .flat_map(|method| {
                [
                    has_v4.then(|| SocketKind::for_method(method, false)),
                    has_v6.then(|| SocketKind::for_method(method, true)),
                ]
            })
            .flatten()
            .collect();
        Self { kinds }
    }

    pub fn contains(&self, kind: SocketKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = SocketKind> + '_ {
        self.kinds.iter().copied()
    }

    /// TCP probes need a route lookup for the pseudo-header source address.
    pub fn needs_route_probe(&self, ipv6: bool) -> bool {
        let kind = if ipv6 { SocketKind::TcpV6 } else { SocketKind::TcpV4 };
        self.contains(kind)
    }
}

/// Raw bytes handed to a layer-4 sender as-is.
struct WireBytes<'a>(&'a [u8]);

impl Packet for WireBytes<'_> {
    fn packet(&self) -> &[u8] {
        self.0
    }

    fn payload(&self) -> &[u8] {
        &[]
    }
}

pub struct SocketPool {
    transport: BTreeMap<SocketKind, TransportSender>,
    link: BTreeMap<SocketKind, Box<dyn DataLinkSender>>,
    route_v4: Option<UdpSocket>,
    route_v6: Option<UdpSocket>,
}

impl SocketPool {
    pub fn open(plan: &SocketPlan, intf: Option<&NetworkInterface>) -> Result<Self, SocketError> {
        Self::open_with(plan, intf, datalink::channel)
    }

    /// Opens every socket in `plan`. On failure the sockets opened so far are
    /// closed before the error is returned.
    pub fn open_with<F>(
        plan: &SocketPlan,
        intf: Option<&NetworkInterface>,
        mut channel_opener: F,
    ) -> Result<Self, SocketError>
    where
        F: FnMut(&NetworkInterface, Config) -> io::Result<Channel>,
    {
        let mut pool = SocketPool {
            transport: BTreeMap::new(),
            link: BTreeMap::new(),
            route_v4: None,
            route_v6: None,
        };

        for kind in plan.kinds() {
            match kind.channel_type() {
                Some(channel_type) => {
                    let (tx, _rx) =
                        transport::transport_channel(TRANSPORT_BUFFER_SIZE, channel_type)
                            .map_err(|source| SocketError::Open { kind, source })?;
                    pool.transport.insert(kind, tx);
                }
                None => {
                    let intf = intf.ok_or(SocketError::NoInterface(kind))?;
                    let tx = channel::open_link_sender(intf, &mut channel_opener)?;
                    pool.link.insert(kind, tx);
                }
            }
            tracing::debug!(%kind, "socket opened");
        }

        pool.route_v4 = open_route_probe(plan, false);
        pool.route_v6 = open_route_probe(plan, true);

        Ok(pool)
    }

    pub fn is_open(&self, kind: SocketKind) -> bool {
        self.transport.contains_key(&kind) || self.link.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.transport.len() + self.link.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn open_route_probe(plan: &SocketPlan, ipv6: bool) -> Option<UdpSocket> {
    if !plan.needs_route_probe(ipv6) {
        return None;
    }
    match interface::bind_route_probe(ipv6) {
        Ok(socket) => Some(socket),
        Err(e) => {
            warn!("Route lookups unavailable, TCP probes will be skipped: {e}");
            None
        }
    }
}

impl Transmit for SocketPool {
    fn source_addr(&self, target: IpAddr) -> Option<IpAddr> {
        let socket = if target.is_ipv4() {
            self.route_v4.as_ref()
        } else {
            self.route_v6.as_ref()
        }?;
        interface::route_source_ip(socket, target)
    }

    fn transmit(&mut self, probe: &Probe) -> Result<(), SocketError> {
        let kind = probe.kind;
        let send_error = |source: io::Error| SocketError::Send {
            kind,
            destination: probe.destination,
            source,
        };

        if kind.is_link_layer() {
            let tx = self.link.get_mut(&kind).ok_or(SocketError::NotOpen(kind))?;
            return match tx.send_to(&probe.bytes, None) {
                Some(result) => result.map_err(send_error),
                None => Err(send_error(io::Error::other("link-layer send buffer unavailable"))),
            };
        }

        let tx = self
            .transport
            .get_mut(&kind)
            .ok_or(SocketError::NotOpen(kind))?;
        tx.send_to(WireBytes(&probe.bytes), probe.destination)
            .map(|_| ())
            .map_err(send_error)
    }
}

impl Drop for SocketPool {
    fn drop(&mut self) {
        let open: Vec<String> = self
            .transport
            .keys()
            .chain(self.link.keys())
            .map(SocketKind::to_string)
            .collect();
        if !open.is_empty() {
            tracing::debug!(sockets = %open.join(","), "sockets closed");
        }
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
