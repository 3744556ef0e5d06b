use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::methods::AliveTests;

pub const DEFAULT_BURST_SIZE: usize = 100;
pub const DEFAULT_BURST_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_REPLY_WAIT: Duration = Duration::from_secs(5);
/// Source port stamped on every TCP probe; replies are recognised by it.
pub const DEFAULT_PROBE_SOURCE_PORT: u16 = 9910;
pub const DEFAULT_TCP_PORTS: [u16; 5] = [80, 137, 587, 3128, 8081];

pub const RESULT_QUEUE: &str = "alive_detection";
pub const FINISHED_SENTINEL: &str = "alive_detection_finished";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown alive-test method '{0}'")]
    UnknownMethod(String),
    #[error("alive-test bitmask {0} contains unknown methods")]
    UnknownMethodBits(u8),
    #[error("no alive-test method enabled")]
    NoMethods,
    #[error("TCP probing requested but no TCP ports configured")]
    EmptyPortList,
    #[error("port 0 is not a valid {0}")]
    ZeroPort(&'static str),
    #[error("unknown port selection '{0}', expected 'exhaustive' or 'round-robin'")]
    UnknownPortSelection(String),
    #[error("result queue name must not be empty")]
    EmptyQueue,
}

/// How TCP probes spread over the configured port list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortSelection {
    /// Every target gets one probe per port.
    #[default]
    Exhaustive,
    /// Every target gets one probe; the port advances across targets.
    RoundRobin,
}

impl FromStr for PortSelection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exhaustive" | "all" => Ok(PortSelection::Exhaustive),
            "round-robin" | "roundrobin" | "rr" => Ok(PortSelection::RoundRobin),
            _ => Err(ConfigError::UnknownPortSelection(s.to_string())),
        }
    }
}

impl fmt::Display for PortSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSelection::Exhaustive => f.write_str("exhaustive"),
            PortSelection::RoundRobin => f.write_str("round-robin"),
        }
    }
}

/// Everything a detection run needs besides its targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionConfig {
    pub methods: AliveTests,
    pub ports: Vec<u16>,
    pub port_selection: PortSelection,
    /// (target, method) pairs per burst; 0 disables pacing. An exhaustive TCP
    /// pair sends one segment per configured port.
    pub burst_size: usize,
    pub burst_delay: Duration,
    /// How long to keep capturing after the last probe went out.
    pub reply_wait: Duration,
    pub probe_source_port: u16,
    /// Maximum number of hosts handed to the result queue; 0 means unlimited.
    pub max_scan_hosts: usize,
    /// Capture interface override.
    pub interface: Option<String>,
    pub queue: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            methods: AliveTests::ICMP,
            ports: DEFAULT_TCP_PORTS.to_vec(),
            port_selection: PortSelection::default(),
            burst_size: DEFAULT_BURST_SIZE,
            burst_delay: DEFAULT_BURST_DELAY,
            reply_wait: DEFAULT_REPLY_WAIT,
            probe_source_port: DEFAULT_PROBE_SOURCE_PORT,
            max_scan_hosts: 0,
            interface: None,
            queue: RESULT_QUEUE.to_string(),
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.methods.is_empty() {
            return Err(ConfigError::NoMethods);
        }
        if self.queue.is_empty() {
            return Err(ConfigError::EmptyQueue);
        }
        if self.methods.contains(AliveTests::CONSIDER_ALIVE) {
            return Ok(());
        }
        if self.methods.uses_tcp() {
            if self.ports.is_empty() {
                return Err(ConfigError::EmptyPortList);
            }
            if self.ports.contains(&0) {
                return Err(ConfigError::ZeroPort("destination port"));
            }
            if self.probe_source_port == 0 {
                return Err(ConfigError::ZeroPort("probe source port"));
            }
        }
        Ok(())
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
