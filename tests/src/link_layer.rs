//! A run over the real socket pool and capture listener, both bound to
//! in-memory datalink channels.

use std::io;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use pnet::datalink::{Channel, Config, MacAddr, NetworkInterface, dummy};
use pnet::packet::arp::{ArpOperations, ArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::Packet;
use vigil_common::config::{FINISHED_SENTINEL, RESULT_QUEUE};
use vigil_common::network::target::TargetList;
use vigil_common::{AliveTests, DetectionConfig};
use vigil_core::AliveDetection;
use vigil_core::detection::ScannerContext;
use vigil_core::network::channel;
use vigil_core::network::sockets::{SocketKind, SocketPlan, SocketPool};
use vigil_core::publisher::{MemoryChannel, ResultPublisher};
use vigil_core::scanner::crafter::{LinkInfo, PacketCrafter};
use vigil_protocols::reply::ReplyFilter;
use vigil_protocols::testing;

use crate::support::{LOCAL, net_v4, ni, v4};

fn lan0() -> NetworkInterface {
    ni(
        "lan0",
        2,
        Some(testing::LOCAL_MAC),
        &[net_v4(LOCAL, 24)],
        0,
    )
}

#[tokio::test]
async fn arp_run_over_datalink_channels() {
    let intf = lan0();
    let config = DetectionConfig {
        methods: AliveTests::ARP,
        reply_wait: Duration::from_millis(200),
        ..Default::default()
    };
    let targets: TargetList = "10.0.0.1-3".parse().unwrap();

    // Capture side: replies from .1 and .3, then the source goes away.
    let mut capture_cfg = dummy::Config::default();
    let inject = capture_cfg.inject_handle().unwrap();
    inject.send(Ok(testing::arp_reply(v4(1), LOCAL).into_boxed_slice())).unwrap();
    inject.send(Ok(testing::arp_reply(v4(3), LOCAL).into_boxed_slice())).unwrap();
    inject
        .send(Err(io::Error::new(io::ErrorKind::BrokenPipe, "link down")))
        .unwrap();
    let (capture, frames) = channel::start_capture_with(&intf, move |i: &NetworkInterface, _: Config| {
        dummy::channel(i, capture_cfg)
    })
    .unwrap();

    // Send side: keep the read handle to inspect what went out.
    let mut wire: Option<Receiver<Box<[u8]>>> = None;
    let plan = SocketPlan::new(config.methods, targets.as_slice());
    let pool = SocketPool::open_with(&plan, Some(&intf), |i: &NetworkInterface, _: Config| -> io::Result<Channel> {
        let mut cfg = dummy::Config::default();
        wire = cfg.read_handle();
        dummy::channel(i, cfg)
    })
    .unwrap();
    assert!(pool.is_open(SocketKind::ArpV4));
    assert_eq!(pool.len(), 1);

    let context = ScannerContext::from_parts(
        Box::new(pool),
        frames,
        PacketCrafter::new(&config, LinkInfo::from(&intf)),
        ReplyFilter::new(config.probe_source_port).ignoring(intf.mac),
    )
    .with_capture(capture);

    let detection = AliveDetection::new(targets, config).unwrap();
    let results = MemoryChannel::new();
    let summary = detection
        .run_with(context, ResultPublisher::new(results.clone(), RESULT_QUEUE))
        .await;

    assert_eq!(summary.sent.packets_sent, 3);
    assert!(summary.capture.capture_fault);
    assert_eq!(
        results.entries(RESULT_QUEUE),
        vec!["10.0.0.1", "10.0.0.3", FINISHED_SENTINEL]
    );

    let wire = wire.expect("link sender opened");
    let requests: Vec<_> = wire.try_iter().collect();
    assert_eq!(requests.len(), 3);
    for (frame, last) in requests.iter().zip(1..=3) {
        let eth = EthernetPacket::new(frame).unwrap();
        assert_eq!(eth.get_destination(), MacAddr::broadcast());
        assert_eq!(eth.get_source(), testing::LOCAL_MAC);
        assert_eq!(eth.get_ethertype(), EtherTypes::Arp);
        let arp = ArpPacket::new(eth.payload()).unwrap();
        assert_eq!(arp.get_operation(), ArpOperations::Request);
        assert_eq!(arp.get_sender_proto_addr(), LOCAL);
        assert_eq!(arp.get_target_proto_addr(), v4(last));
    }
}
