use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use vigil_common::DetectionConfig;
use vigil_common::config::FINISHED_SENTINEL;
use vigil_core::{AliveDetection, MemoryChannel};

use crate::commands::DetectArgs;
use crate::terminal::{print, spinner};

impl From<&DetectArgs> for DetectionConfig {
    fn from(args: &DetectArgs) -> Self {
        Self {
            methods: args.methods,
            ports: args.ports.clone(),
            port_selection: args.port_selection,
            burst_size: args.burst_size,
            burst_delay: Duration::from_millis(args.burst_delay_ms),
            reply_wait: Duration::from_millis(args.reply_wait_ms),
            probe_source_port: args.source_port,
            max_scan_hosts: args.max_hosts,
            interface: args.interface.clone(),
            queue: args.queue.clone(),
        }
    }
}

pub async fn detect(args: DetectArgs) -> anyhow::Result<()> {
    let config = DetectionConfig::from(&args);
    vigil_common::info!(
        "{} target(s), methods {}, burst {} every {:?}",
        args.targets.len(),
        config.methods,
        config.burst_size,
        config.burst_delay
    );

    let detection =
        AliveDetection::new(args.targets, config).context("invalid detection settings")?;
    let channel = MemoryChannel::new();

    let running: Arc<AtomicBool> = Arc::new(AtomicBool::new(true));
    let spinner_handle = spinner::start_detection_spinner(detection.ledger(), running.clone());

    let start_time: Instant = Instant::now();
    let outcome = detection.run(channel.clone()).await;

    running.store(false, Ordering::Relaxed);
    let _ = spinner_handle.join();

    let summary = outcome.context("alive detection failed")?;

    let hosts: Vec<String> = channel
        .entries(&detection.config().queue)
        .into_iter()
        .filter(|entry| entry != FINISHED_SENTINEL)
        .collect();

    if hosts.is_empty() {
        print::header("zero hosts alive");
        print::no_results();
        return Ok(());
    }

    print::header("alive hosts");
    print::alive_hosts(&hosts);
    print::summary(&summary, start_time.elapsed());
    Ok(())
}
