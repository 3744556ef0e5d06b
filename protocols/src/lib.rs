//! Wire formats for liveness probes and the replies they provoke.
//!
//! Builders take addresses and return bytes; the classifier takes captured
//! bytes and says which host answered. Nothing here touches a socket.

pub mod arp;
pub mod error;
pub mod ethernet;
pub mod icmp;
pub mod ndp;
pub mod reply;
pub mod tcp;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::PacketError;

pub const ETH_HDR_LEN: usize = 14;
pub const MIN_ETH_FRAME_NO_FCS: usize = 60;
pub const ARP_LEN: usize = 28;
pub const IP_V4_HDR_LEN: usize = 20;
pub const IP_V6_HDR_LEN: usize = 40;
pub const ICMP_ECHO_LEN: usize = 8;
pub const TCP_HDR_LEN: usize = 20;
