//! # Alive-Test Methods
//!
//! The set of liveness probes enabled for a run, expressed as a bitmask with
//! the same values the scanner preferences use:
//!
//! | method          | bit |
//! |-----------------|-----|
//! | `tcp-ack`       | 1   |
//! | `icmp`          | 2   |
//! | `arp`           | 4   |
//! | `consider-alive`| 8   |
//! | `tcp-syn`       | 16  |

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AliveTests(u8);

impl AliveTests {
    pub const TCP_ACK: Self = Self(1);
    pub const ICMP: Self = Self(2);
    pub const ARP: Self = Self(4);
    pub const CONSIDER_ALIVE: Self = Self(8);
    pub const TCP_SYN: Self = Self(16);

    const KNOWN_BITS: u8 = 0b1_1111;

    const NAMES: [(Self, &'static str); 5] = [
        (Self::TCP_ACK, "tcp-ack"),
        (Self::ICMP, "icmp"),
        (Self::ARP, "arp"),
        (Self::CONSIDER_ALIVE, "consider-alive"),
        (Self::TCP_SYN, "tcp-syn"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns `None` when `bits` carries a value outside the known methods.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::KNOWN_BITS != 0 {
            None
        } else {
            Some(Self(bits))
        }
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// The wire-probing methods enabled, in the order probes are sent per target.
    /// Consider-alive is not a probe and never appears here.
    pub fn probing_methods(self) -> Vec<ProbeMethod> {
        ProbeMethod::ALL
            .into_iter()
            .filter(|method| self.contains(method.flag()))
            .collect()
    }

    pub fn uses_tcp(self) -> bool {
        self.contains(Self::TCP_ACK) || self.contains(Self::TCP_SYN)
    }

    pub fn names() -> impl Iterator<Item = (&'static str, u8)> {
        Self::NAMES.into_iter().map(|(flag, name)| (name, flag.0))
    }
}

impl BitOr for AliveTests {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AliveTests {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

impl FromStr for AliveTests {
    type Err = ConfigError;

    /// Accepts either a raw bitmask ("18") or a comma separated list of
    /// method names ("icmp,tcp-syn").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(bits) = s.parse::<u8>() {
            return Self::from_bits(bits).ok_or(ConfigError::UnknownMethodBits(bits));
        }

        let mut tests = Self::empty();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let lower = part.to_ascii_lowercase();
            let (flag, _) = Self::NAMES
                .iter()
                .find(|(_, name)| *name == lower)
                .ok_or_else(|| ConfigError::UnknownMethod(part.to_string()))?;
            tests |= *flag;
        }
        Ok(tests)
    }
}

impl fmt::Display for AliveTests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join(","))
    }
}

/// A single kind of liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeMethod {
    TcpAck,
    Icmp,
    Arp,
    TcpSyn,
}

impl ProbeMethod {
    pub const ALL: [ProbeMethod; 4] = [
        ProbeMethod::TcpAck,
        ProbeMethod::Icmp,
        ProbeMethod::Arp,
        ProbeMethod::TcpSyn,
    ];

    pub fn flag(self) -> AliveTests {
        match self {
            ProbeMethod::TcpAck => AliveTests::TCP_ACK,
            ProbeMethod::Icmp => AliveTests::ICMP,
            ProbeMethod::Arp => AliveTests::ARP,
            ProbeMethod::TcpSyn => AliveTests::TCP_SYN,
        }
    }

    pub fn is_tcp(self) -> bool {
        matches!(self, ProbeMethod::TcpAck | ProbeMethod::TcpSyn)
    }

    pub fn name(self) -> &'static str {
        match self {
            ProbeMethod::TcpAck => "tcp-ack",
            ProbeMethod::Icmp => "icmp",
            ProbeMethod::Arp => "arp",
            ProbeMethod::TcpSyn => "tcp-syn",
        }
    }
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
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
