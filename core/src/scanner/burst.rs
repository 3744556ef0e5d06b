//! Paced transmission of probes.
//!
//! Work is a sequence of (target, method) pairs in target-major order, cut into
//! bursts of `burst_size` pairs with `burst_delay` between consecutive bursts.

use std::net::IpAddr;
use std::time::Duration;

use tracing::debug;
use vigil_common::{AliveTests, DetectionConfig, info};

use crate::ledger::HostLedger;
use crate::scanner::Transmit;
use crate::scanner::crafter::PacketCrafter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReport {
    pub bursts: usize,
    pub packets_sent: usize,
    pub packets_failed: usize,
    pub probes_skipped: usize,
    pub forced_alive: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstScheduler {
    burst_size: usize,
    burst_delay: Duration,
}

impl BurstScheduler {
    /// A `burst_size` of 0 or a zero delay sends everything without pausing.
    pub fn new(burst_size: usize, burst_delay: Duration) -> Self {
        Self {
            burst_size,
            burst_delay,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.burst_size, config.burst_delay)
    }

    fn paced(&self) -> bool {
        self.burst_size > 0 && !self.burst_delay.is_zero()
    }

    /// Number of bursts needed for `pairs` (target, method) pairs.
    pub fn burst_count(&self, pairs: usize) -> usize {
        match (pairs, self.burst_size) {
            (0, _) => 0,
            (_, 0) => 1,
            (n, size) => n.div_ceil(size),
        }
    }

    pub async fn run(
        &self,
        targets: &[IpAddr],
        methods: AliveTests,
        crafter: &mut PacketCrafter,
        transmitter: &mut dyn Transmit,
        ledger: &HostLedger,
    ) -> SendReport {
        if methods.contains(AliveTests::CONSIDER_ALIVE) {
            return mark_all_alive(targets, ledger);
        }

        let probing = methods.probing_methods();
        let pairs = targets.len() * probing.len();
        let mut report = SendReport {
            bursts: self.burst_count(pairs),
            ..Default::default()
        };
        info!(
            "Sending {} probe pairs in {} burst(s) of {}",
            pairs, report.bursts, self.burst_size
        );

        let work = targets
            .iter()
            .flat_map(|target| probing.iter().map(move |method| (*target, *method)));

        for (index, (target, method)) in work.enumerate() {
            if index > 0 && self.burst_size > 0 && index % self.burst_size == 0 && self.paced() {
                tokio::time::sleep(self.burst_delay).await;
            }

            let probes = match crafter.craft(target, method, || transmitter.source_addr(target)) {
                Ok(probes) => probes,
                Err(e) => {
                    debug!(%target, %method, error = %e, "probe skipped");
                    report.probes_skipped += 1;
                    continue;
                }
            };

            for probe in &probes {
                match transmitter.transmit(probe) {
                    Ok(()) => report.packets_sent += 1,
                    Err(e) => {
                        debug!(%target, %method, error = %e, "send failed");
                        report.packets_failed += 1;
                    }
                }
            }
        }

        if report.packets_failed > 0 {
            vigil_common::warn!("{} probe(s) could not be sent", report.packets_failed);
        }
        report
    }
}

/// Consider-alive: every target is alive and nothing is transmitted.
pub fn mark_all_alive(targets: &[IpAddr], ledger: &HostLedger) -> SendReport {
    let forced_alive = targets
        .iter()
        .filter(|target| ledger.mark_alive(**target).is_new())
        .count();
    info!("Considering {forced_alive} target(s) alive without probing");
    SendReport {
        forced_alive,
        ..Default::default()
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
