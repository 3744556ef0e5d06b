//! Hands the outcome of a run to the result queue.
//!
//! The consumer on the other side reads host entries until it sees the
//! finished sentinel, so the sentinel goes out exactly once per run whatever
//! happened before.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use vigil_common::config::FINISHED_SENTINEL;
use vigil_common::{success, warn};

use crate::ledger::HostLedger;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("result channel closed")]
    Closed,
    #[error("could not push to queue '{queue}': {reason}")]
    Push { queue: String, reason: String },
}

/// Outbound port for detection results.
#[async_trait]
pub trait ResultChannel: Send {
    async fn push(&mut self, queue: &str, entry: &str) -> Result<(), PublishError>;
}

#[async_trait]
impl<T: ResultChannel + ?Sized> ResultChannel for &mut T {
    async fn push(&mut self, queue: &str, entry: &str) -> Result<(), PublishError> {
        (**self).push(queue, entry).await
    }
}

#[async_trait]
impl<T: ResultChannel + ?Sized> ResultChannel for Box<T> {
    async fn push(&mut self, queue: &str, entry: &str) -> Result<(), PublishError> {
        (**self).push(queue, entry).await
    }
}

/// In-process result channel. Clones share the same queues.
#[derive(Debug, Clone, Default)]
pub struct MemoryChannel {
    queues: Arc<Mutex<HashMap<String, Vec<String>>>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self, queue: &str) -> Vec<String> {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ResultChannel for MemoryChannel {
    async fn push(&mut self, queue: &str, entry: &str) -> Result<(), PublishError> {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(queue.to_string())
            .or_default()
            .push(entry.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Hosts pushed, in promotion order.
    pub published: Vec<IpAddr>,
    /// Alive hosts held back by the scan-host cap.
    pub withheld: Vec<IpAddr>,
    pub failed: usize,
    pub sentinel_sent: bool,
}

pub struct ResultPublisher<C> {
    channel: C,
    queue: String,
}

impl<C: ResultChannel> ResultPublisher<C> {
    pub fn new(channel: C, queue: impl Into<String>) -> Self {
        Self {
            channel,
            queue: queue.into(),
        }
    }

    /// Seals the ledger, pushes every deliverable host and then the sentinel.
    /// Consumes the publisher so the sentinel cannot be sent twice.
    pub async fn publish(mut self, ledger: &HostLedger) -> PublishReport {
        let snapshot = ledger.seal();
        let mut report = PublishReport {
            withheld: snapshot.over_cap,
            ..Default::default()
        };

        for host in snapshot.deliverable {
            match self.channel.push(&self.queue, &host.to_string()).await {
                Ok(()) => {
                    success!("{host} is alive");
                    report.published.push(host);
                }
                Err(e) => {
                    warn!("Dropping result for {host}: {e}");
                    report.failed += 1;
                }
            }
        }

        if !report.withheld.is_empty() {
            warn!(
                "{} alive host(s) over the scan limit of {} were not reported",
                report.withheld.len(),
                ledger.max_scan_hosts()
            );
        }

        match self.channel.push(&self.queue, FINISHED_SENTINEL).await {
            Ok(()) => report.sentinel_sent = true,
            Err(e) => warn!("Could not signal the end of alive detection: {e}"),
        }
        report
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
