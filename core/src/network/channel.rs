//! Link-layer channels: the capture listener and the senders used for
//! ARP and neighbor solicitation probes.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use pnet::datalink::{self, Channel, Config, DataLinkReceiver, DataLinkSender, NetworkInterface};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use vigil_common::warn;

use crate::network::sockets::SocketError;

/// Bounds how long the listener blocks before re-checking its stop flag.
const CAPTURE_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Keeps the capture listener alive. Dropping it stops and joins the thread.
pub struct CaptureHandle {
    interface: String,
    stop: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(listener) = self.listener.take() {
            if listener.join().is_err() {
                warn!("Capture listener on {} panicked", self.interface);
            }
        }
        tracing::debug!(interface = %self.interface, "capture released");
    }
}

/// Opens an Ethernet capture on `intf` and forwards every frame addressed to
/// the station into the returned receiver.
pub fn start_capture(
    intf: &NetworkInterface,
) -> Result<(CaptureHandle, UnboundedReceiver<Vec<u8>>), SocketError> {
    start_capture_with(intf, datalink::channel)
}

pub fn start_capture_with<F>(
    intf: &NetworkInterface,
    channel_opener: F,
) -> Result<(CaptureHandle, UnboundedReceiver<Vec<u8>>), SocketError>
where
    F: FnOnce(&NetworkInterface, Config) -> io::Result<Channel>,
{
    let (_tx, rx) = open_eth_channel(intf, &capture_config(), channel_opener)?;
    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    let stop = Arc::new(AtomicBool::new(false));
    let listener = spawn_listener(rx, frame_tx, stop.clone());

    tracing::debug!(interface = %intf.name, "capture started");
    let handle = CaptureHandle {
        interface: intf.name.clone(),
        stop,
        listener: Some(listener),
    };
    Ok((handle, frame_rx))
}

/// Sender half of a fresh Ethernet channel, for link-layer probes.
pub fn open_link_sender<F>(
    intf: &NetworkInterface,
    channel_opener: F,
) -> Result<Box<dyn DataLinkSender>, SocketError>
where
    F: FnOnce(&NetworkInterface, Config) -> io::Result<Channel>,
{
    let (tx, _rx) = open_eth_channel(intf, &Config::default(), channel_opener)?;
    Ok(tx)
}

fn spawn_listener(
    mut rx: Box<dyn DataLinkReceiver>,
    frame_tx: UnboundedSender<Vec<u8>>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            match rx.next() {
                Ok(frame) => {
                    if frame_tx.send(frame.to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if is_transient(&e) => continue,
                Err(e) => {
                    warn!("Capture stopped: {e}");
                    break;
                }
            }
        }
    })
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

fn open_eth_channel<F>(
    intf: &NetworkInterface,
    cfg: &Config,
    channel_opener: F,
) -> Result<(Box<dyn DataLinkSender>, Box<dyn DataLinkReceiver>), SocketError>
where
    F: FnOnce(&NetworkInterface, Config) -> io::Result<Channel>,
{
    let ch: Channel = channel_opener(intf, *cfg).map_err(|source| SocketError::Link {
        interface: intf.name.clone(),
        source,
    })?;
    match ch {
        Channel::Ethernet(tx, rx) => Ok((tx, rx)),
        _ => Err(SocketError::NotEthernet {
            interface: intf.name.clone(),
        }),
    }
}

fn capture_config() -> Config {
    Config {
        read_timeout: Some(CAPTURE_READ_TIMEOUT),
        promiscuous: false,
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

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::datalink::dummy;

    fn mock_opener_fail(_: &NetworkInterface, _: Config) -> io::Result<Channel> {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "Mock I/O Error",
        ))
    }

    #[test]
    fn open_eth_channel_should_fail_on_io_error() {
        let dummy_intf: NetworkInterface = dummy::dummy_interface(0);
        let result = open_eth_channel(&dummy_intf, &Config::default(), mock_opener_fail);

        match result {
            Err(SocketError::Link { interface, source }) => {
                assert_eq!(interface, "eth0");
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
                assert_eq!(source.to_string(), "Mock I/O Error");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("Test failed: expected Err, got Ok"),
        }
    }

    #[test]
    fn capture_stays_out_of_promiscuous_mode() {
        let cfg = capture_config();
        assert!(!cfg.promiscuous);
        assert_eq!(cfg.read_timeout, Some(CAPTURE_READ_TIMEOUT));
    }

    #[test]
    fn open_link_sender_should_succeed_on_ethernet_channel() {
        let dummy_intf: NetworkInterface = dummy::dummy_interface(0);
        let opener = |i: &NetworkInterface, _cfg: Config| -> io::Result<Channel> {
            dummy::channel(i, dummy::Config::default())
        };
        assert!(open_link_sender(&dummy_intf, opener).is_ok());
    }

    #[tokio::test]
    async fn capture_forwards_frames_until_the_source_fails() {
        let dummy_intf: NetworkInterface = dummy::dummy_interface(1);
        let mut dummy_cfg = dummy::Config::default();
        let inject = dummy_cfg.inject_handle().expect("inject handle");
        let opener = move |i: &NetworkInterface, _cfg: Config| -> io::Result<Channel> {
            dummy::channel(i, dummy_cfg)
        };

        let (handle, mut frames) = start_capture_with(&dummy_intf, opener).unwrap();
        assert_eq!(handle.interface(), "eth1");

        inject.send(Ok(vec![1, 2, 3].into_boxed_slice())).unwrap();
        inject.send(Ok(vec![4, 5].into_boxed_slice())).unwrap();
        inject
            .send(Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone")))
            .unwrap();

        assert_eq!(frames.recv().await, Some(vec![1, 2, 3]));
        assert_eq!(frames.recv().await, Some(vec![4, 5]));
        // The listener exits on the hard error and drops its sender.
        assert_eq!(frames.recv().await, None);
        drop(handle);
    }

    #[tokio::test]
    async fn capture_skips_timeouts() {
        let dummy_intf: NetworkInterface = dummy::dummy_interface(2);
        let mut dummy_cfg = dummy::Config::default();
        let inject = dummy_cfg.inject_handle().expect("inject handle");
        let opener = move |i: &NetworkInterface, _cfg: Config| -> io::Result<Channel> {
            dummy::channel(i, dummy_cfg)
        };

        let (handle, mut frames) = start_capture_with(&dummy_intf, opener).unwrap();

        inject
            .send(Err(io::Error::new(io::ErrorKind::TimedOut, "idle")))
            .unwrap();
        inject.send(Ok(vec![9].into_boxed_slice())).unwrap();
        inject
            .send(Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone")))
            .unwrap();

        assert_eq!(frames.recv().await, Some(vec![9]));
        assert_eq!(frames.recv().await, None);
        drop(handle);
    }
}
