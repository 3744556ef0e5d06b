pub mod detect;
pub mod methods;

use clap::{Args, Parser, Subcommand};
use vigil_common::config::{
    DEFAULT_PROBE_SOURCE_PORT, DEFAULT_TCP_PORTS, RESULT_QUEUE,
};
use vigil_common::network::target::TargetList;
use vigil_common::{AliveTests, PortSelection};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Finds out which hosts of a target list are alive.")]
pub struct CommandLine {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe targets and report the alive ones
    #[command(alias = "d")]
    Detect(DetectArgs),
    /// List the available alive-test methods
    #[command(alias = "m")]
    Methods,
}

#[derive(Args)]
pub struct DetectArgs {
    /// Addresses, ranges (10.0.0.1-20) and CIDR blocks, comma separated
    pub targets: TargetList,

    /// Method names (icmp,tcp-syn,...) or a raw bitmask
    #[arg(short, long, default_value = "icmp")]
    pub methods: AliveTests,

    /// TCP destination ports
    #[arg(short, long, value_delimiter = ',', default_values_t = DEFAULT_TCP_PORTS)]
    pub ports: Vec<u16>,

    /// exhaustive or round-robin
    #[arg(long, default_value = "exhaustive")]
    pub port_selection: PortSelection,

    /// (target, method) pairs per burst, 0 disables pacing
    #[arg(long, default_value_t = 100)]
    pub burst_size: usize,

    #[arg(long, default_value_t = 100)]
    pub burst_delay_ms: u64,

    /// Time to keep listening after the last probe
    #[arg(long, default_value_t = 5000)]
    pub reply_wait_ms: u64,

    #[arg(long, default_value_t = DEFAULT_PROBE_SOURCE_PORT)]
    pub source_port: u16,

    /// Report at most this many alive hosts, 0 for no limit
    #[arg(long, default_value_t = 0)]
    pub max_hosts: usize,

    /// Capture interface, chosen by route when omitted
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Result queue name
    #[arg(long, default_value = RESULT_QUEUE)]
    pub queue: String,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
