//! The vigil alive-detection engine.
//!
//! A run sends paced probes over raw sockets, captures replies on the chosen
//! interface, records every answering target in a [`ledger::HostLedger`] and
//! finally hands the alive hosts to a result queue.

pub mod detection;
pub mod ledger;
pub mod network;
pub mod publisher;
pub mod scanner;
pub mod store;

pub use detection::{AliveDetection, DetectionError, DetectionSummary};
pub use ledger::{HostLedger, Promotion};
pub use publisher::{MemoryChannel, PublishError, ResultChannel, ResultPublisher};
