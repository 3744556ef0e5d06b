use std::net::IpAddr;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("buffer too small for {0} packet")]
    Buffer(&'static str),
    #[error("truncated or invalid {layer} packet (payload len {len})")]
    Truncated { layer: &'static str, len: usize },
    #[error("source {src} and destination {dst} are not the same address family")]
    FamilyMismatch { src: IpAddr, dst: IpAddr },
}
