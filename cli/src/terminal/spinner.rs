use std::io::{self, Write};
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use vigil_core::HostLedger;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

static SPINNER: OnceLock<ProgressBar> = OnceLock::new();

pub fn get_spinner() -> &'static ProgressBar {
    SPINNER.get_or_init(init_spinner)
}

fn init_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&[
            "▁▁▁▁▁",
            "▁▂▂▂▁",
            "▁▄▂▄▁",
            "▂▄▆▄▂",
            "▄▆█▆▄",
            "▂▄▆▄▂",
            "▁▄▂▄▁",
            "▁▂▂▂▁",
        ]);
    pb.set_style(style);
    pb
}

/// Shows the running alive count until `running` is cleared.
pub fn start_detection_spinner(
    ledger: Arc<HostLedger>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    let pb = get_spinner().clone();
    pb.enable_steady_tick(POLL_INTERVAL);

    thread::spawn(move || {
        let targets = ledger.target_count();
        while running.load(Ordering::Relaxed) {
            let mut msg = format!(
                "Probing {} targets, {} alive so far",
                targets,
                ledger.alive_hosts_count().to_string().green().bold()
            );
            if ledger.max_scan_hosts_reached() {
                msg.push_str(&format!(" {}", "(scan limit reached)".yellow()));
            }
            pb.set_message(msg);
            thread::sleep(POLL_INTERVAL);
        }
        pb.finish_and_clear();
    })
}

/// Log sink that keeps lines from tearing the spinner.
pub struct SpinnerWriter;

impl Write for SpinnerWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        get_spinner().suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}
