//! Matches captured frames to targets.
//!
//! The correlator owns the receiving end of the capture channel. It runs until
//! the scheduler reports that sending is complete and the reply window has
//! elapsed, or until the capture source goes away.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc::UnboundedReceiver, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::debug;
use vigil_common::{info, warn};
use vigil_protocols::reply::ReplyFilter;

use crate::ledger::{HostLedger, Promotion};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaptureState {
    #[default]
    Idle,
    Capturing,
    Draining,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelatorReport {
    pub frames_seen: usize,
    pub frames_malformed: usize,
    pub replies: usize,
    /// Replies from addresses that were never targeted.
    pub unsolicited: usize,
    pub newly_alive: usize,
    /// The capture source closed before the reply window ended.
    pub capture_fault: bool,
    /// State the correlator left for `Done`: `Draining` after a full reply
    /// window, `Capturing` when the capture closed while probes were still
    /// going out.
    pub stopped_in: CaptureState,
}

pub struct Correlator {
    filter: ReplyFilter,
    ledger: Arc<HostLedger>,
    reply_wait: Duration,
    state: CaptureState,
    report: CorrelatorReport,
}

impl Correlator {
    pub fn new(filter: ReplyFilter, ledger: Arc<HostLedger>, reply_wait: Duration) -> Self {
        Self {
            filter,
            ledger,
            reply_wait,
            state: CaptureState::Idle,
            report: CorrelatorReport::default(),
        }
    }

    pub fn report(&self) -> CorrelatorReport {
        self.report
    }

    fn enter(&mut self, next: CaptureState) {
        debug!(from = ?self.state, to = ?next, "capture state");
        self.state = next;
    }

    /// Classifies one frame and promotes its sender. `None` when the frame is
    /// not a reply or could not be parsed.
    pub fn process_frame(&mut self, frame: &[u8]) -> Option<Promotion> {
        self.report.frames_seen += 1;

        let reply = match self.filter.classify(frame) {
            Ok(Some(reply)) => reply,
            Ok(None) => return None,
            Err(e) => {
                self.report.frames_malformed += 1;
                debug!(error = %e, "discarding malformed frame");
                return None;
            }
        };
        self.report.replies += 1;

        let promotion = self.ledger.mark_alive(reply.source);
        match promotion {
            Promotion::NotTarget => self.report.unsolicited += 1,
            p if p.is_new() => {
                self.report.newly_alive += 1;
                debug!(host = %reply.source, kind = ?reply.kind, outcome = ?p, "host alive");
            }
            _ => {}
        }
        Some(promotion)
    }

    /// Consumes frames until `reply_wait` after `sending_done` fires (or its
    /// sender is dropped), or until the frame channel closes.
    pub async fn run(
        mut self,
        mut frames: UnboundedReceiver<Vec<u8>>,
        mut sending_done: oneshot::Receiver<()>,
    ) -> CorrelatorReport {
        self.enter(CaptureState::Capturing);
        debug!(filter = %self.filter, "correlator capturing");
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                frame = frames.recv() => match frame {
                    Some(frame) => {
                        self.process_frame(&frame);
                    }
                    None => {
                        warn!("Capture closed early, publishing what was seen so far");
                        self.report.capture_fault = true;
                        break;
                    }
                },
                _ = &mut sending_done, if deadline.is_none() => {
                    deadline = Some(Instant::now() + self.reply_wait);
                    self.enter(CaptureState::Draining);
                    info!("Waiting {:?} for late replies", self.reply_wait);
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    break;
                }
            }
        }

        self.report.stopped_in = self.state;
        self.enter(CaptureState::Done);
        debug!(report = ?self.report, "correlator done");
        self.report
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
