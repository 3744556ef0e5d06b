//! Shared types for the vigil alive-detection engine: probing methods,
//! run configuration, target parsing and interface selection.

pub mod config;
pub mod log;
pub mod methods;
pub mod network;

pub use config::{ConfigError, DetectionConfig, PortSelection};
pub use methods::{AliveTests, ProbeMethod};
