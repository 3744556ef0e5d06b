//! Fakes standing in for the wire.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

use pnet::datalink::{MacAddr, NetworkInterface};
use pnet::ipnetwork::{IpNetwork, Ipv4Network};
use pnet::packet::tcp::TcpFlags;
use tokio::sync::mpsc::{self, UnboundedSender};
use vigil_common::DetectionConfig;
use vigil_core::detection::ScannerContext;
use vigil_core::network::sockets::{SocketError, SocketKind};
use vigil_core::scanner::Transmit;
use vigil_core::scanner::crafter::{LinkInfo, PacketCrafter, Probe};
use vigil_protocols::reply::ReplyFilter;
use vigil_protocols::testing;

pub const LOCAL: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 254);

pub fn v4(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, last)
}

pub fn ip(last: u8) -> IpAddr {
    IpAddr::V4(v4(last))
}

pub type SentLog = Arc<Mutex<Vec<Probe>>>;

/// Answers probes aimed at `responders` by pushing the matching reply frame
/// into the capture channel, as a live host would.
pub struct ReplyingTransmitter {
    frames: UnboundedSender<Vec<u8>>,
    responders: HashSet<Ipv4Addr>,
    probe_port: u16,
    sent: SentLog,
}

impl Transmit for ReplyingTransmitter {
    fn source_addr(&self, _target: IpAddr) -> Option<IpAddr> {
        Some(IpAddr::V4(LOCAL))
    }

    fn transmit(&mut self, probe: &Probe) -> Result<(), SocketError> {
        self.sent.lock().unwrap().push(probe.clone());

        let IpAddr::V4(dst) = probe.destination else {
            return Ok(());
        };
        if !self.responders.contains(&dst) {
            return Ok(());
        }
        let reply = match probe.kind {
            SocketKind::IcmpV4 => testing::echo_reply_v4(dst, LOCAL),
            SocketKind::TcpV4 => {
                testing::tcp_v4(dst, LOCAL, self.probe_port, TcpFlags::SYN | TcpFlags::ACK)
            }
            SocketKind::ArpV4 => testing::arp_reply(dst, LOCAL),
            _ => return Ok(()),
        };
        // The correlator may already have stopped listening.
        let _ = self.frames.send(reply);
        Ok(())
    }
}

pub struct FakeWire {
    pub context: ScannerContext,
    /// Keeps the capture channel open; dropping it simulates a capture fault.
    pub capture: UnboundedSender<Vec<u8>>,
    pub sent: SentLog,
}

pub fn fake_wire(config: &DetectionConfig, responders: &[u8]) -> FakeWire {
    let (frame_tx, frames) = mpsc::unbounded_channel();
    let sent = SentLog::default();
    let transmitter = ReplyingTransmitter {
        frames: frame_tx.clone(),
        responders: responders.iter().map(|last| v4(*last)).collect(),
        probe_port: config.probe_source_port,
        sent: sent.clone(),
    };

    let link = LinkInfo {
        mac: Some(testing::LOCAL_MAC),
        ipv4: Some(LOCAL),
        link_local: None,
    };
    let crafter = PacketCrafter::new(config, link);
    let filter = ReplyFilter::new(config.probe_source_port).ignoring(Some(testing::LOCAL_MAC));

    FakeWire {
        context: ScannerContext::from_parts(Box::new(transmitter), frames, crafter, filter),
        capture: frame_tx,
        sent,
    }
}

pub fn ni(name: &str, index: u32, mac: Option<MacAddr>, ips: &[IpNetwork], flags: u32) -> NetworkInterface {
    NetworkInterface {
        name: name.into(),
        description: "".into(),
        index,
        mac,
        ips: ips.to_vec(),
        flags,
    }
}

pub fn net_v4(addr: Ipv4Addr, prefix: u8) -> IpNetwork {
    IpNetwork::V4(Ipv4Network::new(addr, prefix).unwrap())
}
