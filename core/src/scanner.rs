//! The probing side of a run.
//!
//! [`crafter`] turns (target, method) pairs into wire bytes, [`burst`] paces
//! them onto a [`Transmit`] implementation and [`correlator`] matches captured
//! replies back to targets.
//!
//! **Architectural Note:**
//! The scheduler only sees the [`Transmit`] abstraction. The socket pool is the
//! production implementation; tests plug in transmitters that loop replies
//! straight back into the capture channel.

use std::net::IpAddr;

use crate::network::sockets::SocketError;
use crate::scanner::crafter::Probe;

pub mod burst;
pub mod correlator;
pub mod crafter;

/// Puts crafted probes on the wire.
pub trait Transmit: Send {
    /// Local address the kernel would use towards `target`, needed for the
    /// TCP pseudo-header checksum.
    fn source_addr(&self, target: IpAddr) -> Option<IpAddr>;

    fn transmit(&mut self, probe: &Probe) -> Result<(), SocketError>;
}
