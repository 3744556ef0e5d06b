//! One alive-detection run from start to finish.
//!
//! The order matters: capture is running before the first probe leaves, the
//! correlator drains for `reply_wait` after the last one, and the publisher
//! always gets the final word so the consumer sees the sentinel even when the
//! run could not start.

use std::net::IpAddr;
use std::sync::Arc;

use is_root::is_root;
use thiserror::Error;
use tokio::sync::{mpsc::UnboundedReceiver, oneshot};
use vigil_common::network::interface;
use vigil_common::network::target::TargetList;
use vigil_common::{AliveTests, ConfigError, DetectionConfig, error, info, warn};
use vigil_protocols::reply::ReplyFilter;

use crate::ledger::HostLedger;
use crate::network::channel::{self, CaptureHandle};
use crate::network::sockets::{SocketError, SocketPlan, SocketPool};
use crate::publisher::{PublishReport, ResultChannel, ResultPublisher};
use crate::scanner::Transmit;
use crate::scanner::burst::{self, BurstScheduler, SendReport};
use crate::scanner::correlator::{Correlator, CorrelatorReport};
use crate::scanner::crafter::{LinkInfo, PacketCrafter};

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("no capture interface: {0}")]
    Interface(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionSummary {
    pub sent: SendReport,
    pub capture: CorrelatorReport,
    pub published: PublishReport,
}

/// Everything the probing phase needs, opened up front.
pub struct ScannerContext {
    transmitter: Box<dyn Transmit>,
    frames: UnboundedReceiver<Vec<u8>>,
    crafter: PacketCrafter,
    filter: ReplyFilter,
    capture: Option<CaptureHandle>,
}

impl ScannerContext {
    /// Picks the capture interface, starts capturing and opens the sockets the
    /// run needs, in that order.
    pub fn open(targets: &[IpAddr], config: &DetectionConfig) -> Result<Self, DetectionError> {
        if !is_root() {
            warn!("Not running as root, raw sockets will most likely fail to open");
        }

        let intf = interface::capture_interface(config.interface.as_deref(), targets)
            .map_err(|e| DetectionError::Interface(format!("{e:#}")))?;
        info!("Capturing replies on {}", intf.name);

        let (capture, frames) = channel::start_capture(&intf)?;
        let plan = SocketPlan::new(config.methods, targets);
        let pool = SocketPool::open(&plan, Some(&intf))?;

        let filter = ReplyFilter::new(config.probe_source_port).ignoring(intf.mac);
        let crafter = PacketCrafter::new(config, LinkInfo::from(&intf));
        Ok(Self {
            transmitter: Box::new(pool),
            frames,
            crafter,
            filter,
            capture: Some(capture),
        })
    }

    /// A context around an arbitrary transmitter and frame source.
    pub fn from_parts(
        transmitter: Box<dyn Transmit>,
        frames: UnboundedReceiver<Vec<u8>>,
        crafter: PacketCrafter,
        filter: ReplyFilter,
    ) -> Self {
        Self {
            transmitter,
            frames,
            crafter,
            filter,
            capture: None,
        }
    }

    /// Ties a running capture to the context; it is released once the reply
    /// window closes.
    pub fn with_capture(mut self, capture: CaptureHandle) -> Self {
        self.capture = Some(capture);
        self
    }
}

pub struct AliveDetection {
    targets: Vec<IpAddr>,
    config: DetectionConfig,
    ledger: Arc<HostLedger>,
}

impl AliveDetection {
    pub fn new(targets: TargetList, config: DetectionConfig) -> Result<Self, DetectionError> {
        config.validate()?;
        let targets = targets.into_vec();
        let ledger = Arc::new(HostLedger::new(
            targets.iter().copied(),
            config.max_scan_hosts,
        ));
        Ok(Self {
            targets,
            config,
            ledger,
        })
    }

    /// Shared view of the run's progress; readable while [`Self::run`] is in
    /// flight. Every run starts by resetting it, so the handle stays valid
    /// across runs.
    pub fn ledger(&self) -> Arc<HostLedger> {
        self.ledger.clone()
    }

    pub fn targets(&self) -> &[IpAddr] {
        &self.targets
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub async fn run<C: ResultChannel>(
        &self,
        channel: C,
    ) -> Result<DetectionSummary, DetectionError> {
        self.run_using(channel, ScannerContext::open).await
    }

    /// Like [`Self::run`] with a custom way of opening the probing context.
    pub async fn run_using<C, F>(
        &self,
        channel: C,
        open: F,
    ) -> Result<DetectionSummary, DetectionError>
    where
        C: ResultChannel,
        F: FnOnce(&[IpAddr], &DetectionConfig) -> Result<ScannerContext, DetectionError>,
    {
        let publisher = ResultPublisher::new(channel, self.config.queue.clone());
        self.ledger.reset();

        if self.config.methods.contains(AliveTests::CONSIDER_ALIVE) {
            let sent = burst::mark_all_alive(&self.targets, &self.ledger);
            let published = publisher.publish(&self.ledger).await;
            return Ok(DetectionSummary {
                sent,
                published,
                ..Default::default()
            });
        }

        match open(&self.targets, &self.config) {
            Ok(context) => Ok(self.run_with(context, publisher).await),
            Err(e) => {
                error!("Alive detection could not start: {e}");
                publisher.publish(&self.ledger).await;
                Err(e)
            }
        }
    }

    pub async fn run_with<C: ResultChannel>(
        &self,
        context: ScannerContext,
        publisher: ResultPublisher<C>,
    ) -> DetectionSummary {
        self.ledger.reset();
        let ScannerContext {
            mut transmitter,
            frames,
            mut crafter,
            filter,
            capture,
        } = context;

        let (done_tx, done_rx) = oneshot::channel();
        let correlator = Correlator::new(filter, self.ledger.clone(), self.config.reply_wait);
        let correlating = tokio::spawn(correlator.run(frames, done_rx));

        let sent = BurstScheduler::from_config(&self.config)
            .run(
                &self.targets,
                self.config.methods,
                &mut crafter,
                transmitter.as_mut(),
                &self.ledger,
            )
            .await;
        drop(transmitter);
        // The correlator may already be gone after a capture fault.
        let _ = done_tx.send(());

        let capture_report = match correlating.await {
            Ok(report) => report,
            Err(e) => {
                error!("Reply correlation aborted: {e}");
                CorrelatorReport {
                    capture_fault: true,
                    ..Default::default()
                }
            }
        };
        drop(capture);

        let published = publisher.publish(&self.ledger).await;
        DetectionSummary {
            sent,
            capture: capture_report,
            published,
        }
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
