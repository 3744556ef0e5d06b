use std::time::Duration;

use pnet::packet::tcp::TcpFlags;
use tokio::time::Instant;
use vigil_common::config::{FINISHED_SENTINEL, RESULT_QUEUE};
use vigil_common::network::target::TargetList;
use vigil_common::{AliveTests, DetectionConfig};
use vigil_core::publisher::{MemoryChannel, ResultPublisher};
use vigil_core::{AliveDetection, Promotion};
use vigil_protocols::testing;

use crate::support::{LOCAL, fake_wire, ip, v4};

fn three_targets() -> TargetList {
    "10.0.0.1,10.0.0.2,10.0.0.3".parse().unwrap()
}

fn icmp_config(max_scan_hosts: usize) -> DetectionConfig {
    DetectionConfig {
        methods: AliveTests::ICMP,
        max_scan_hosts,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn replies_within_cap_are_all_published() {
    let config = icmp_config(2);
    let wire = fake_wire(&config, &[1, 2]);
    let detection = AliveDetection::new(three_targets(), config).unwrap();
    let channel = MemoryChannel::new();

    let summary = detection
        .run_with(wire.context, ResultPublisher::new(channel.clone(), RESULT_QUEUE))
        .await;

    assert_eq!(
        channel.entries(RESULT_QUEUE),
        vec!["10.0.0.1", "10.0.0.2", FINISHED_SENTINEL]
    );
    assert!(summary.published.withheld.is_empty());
    assert_eq!(summary.sent.packets_sent, 3);
    assert!(!summary.capture.capture_fault);

    let ledger = detection.ledger();
    assert_eq!(ledger.alive_hosts_count(), 2);
    assert!(ledger.max_scan_hosts_reached());
    assert!(!ledger.is_alive(ip(3)));
}

#[tokio::test(start_paused = true)]
async fn cap_overflow_keeps_first_promoted_host() {
    let config = icmp_config(1);
    let wire = fake_wire(&config, &[1, 2, 3]);
    let detection = AliveDetection::new(three_targets(), config).unwrap();
    let channel = MemoryChannel::new();

    let summary = detection
        .run_with(wire.context, ResultPublisher::new(channel.clone(), RESULT_QUEUE))
        .await;

    assert_eq!(
        channel.entries(RESULT_QUEUE),
        vec!["10.0.0.1", FINISHED_SENTINEL]
    );
    assert_eq!(summary.published.withheld, vec![ip(2), ip(3)]);
    assert_eq!(detection.ledger().alive_count(), 3);
    assert_eq!(detection.ledger().alive_hosts_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn consider_alive_transmits_nothing() {
    let config = DetectionConfig {
        methods: AliveTests::CONSIDER_ALIVE,
        ..Default::default()
    };
    let detection = AliveDetection::new(three_targets(), config).unwrap();
    let channel = MemoryChannel::new();

    let summary = detection
        .run_using(channel.clone(), |_, _| panic!("nothing may be opened"))
        .await
        .unwrap();

    assert_eq!(summary.sent.packets_sent, 0);
    assert_eq!(
        channel.entries(RESULT_QUEUE),
        vec!["10.0.0.1", "10.0.0.2", "10.0.0.3", FINISHED_SENTINEL]
    );
}

#[tokio::test(start_paused = true)]
async fn strangers_and_non_replies_are_ignored() {
    let config = icmp_config(0);
    let wire = fake_wire(&config, &[2]);
    let detection = AliveDetection::new(three_targets(), config).unwrap();
    let channel = MemoryChannel::new();

    // Already queued when capture starts.
    wire.capture.send(testing::echo_reply_v4(v4(99), LOCAL)).unwrap();
    wire.capture
        .send(testing::tcp_v4(v4(1), LOCAL, 443, TcpFlags::SYN | TcpFlags::ACK))
        .unwrap();

    let summary = detection
        .run_with(wire.context, ResultPublisher::new(channel.clone(), RESULT_QUEUE))
        .await;

    assert_eq!(summary.capture.unsolicited, 1);
    assert_eq!(summary.capture.newly_alive, 1);
    assert_eq!(
        channel.entries(RESULT_QUEUE),
        vec!["10.0.0.2", FINISHED_SENTINEL]
    );
    assert_eq!(detection.ledger().mark_alive(ip(99)), Promotion::Sealed);
}

#[tokio::test(start_paused = true)]
async fn host_answering_several_methods_is_published_once() {
    let config = DetectionConfig {
        methods: AliveTests::ICMP | AliveTests::TCP_SYN,
        ports: vec![22, 80],
        ..Default::default()
    };
    let wire = fake_wire(&config, &[3]);
    let detection = AliveDetection::new(three_targets(), config).unwrap();
    let channel = MemoryChannel::new();

    let summary = detection
        .run_with(wire.context, ResultPublisher::new(channel.clone(), RESULT_QUEUE))
        .await;

    // One echo reply and two SYN-ACKs from the same host.
    assert_eq!(summary.capture.replies, 3);
    assert_eq!(summary.capture.newly_alive, 1);
    assert_eq!(
        channel.entries(RESULT_QUEUE),
        vec!["10.0.0.3", FINISHED_SENTINEL]
    );
    // 3 targets x (1 echo + 2 SYNs).
    assert_eq!(wire.sent.lock().unwrap().len(), 9);
}

#[tokio::test(start_paused = true)]
async fn run_lasts_pacing_plus_reply_wait() {
    let config = DetectionConfig {
        methods: AliveTests::ICMP,
        burst_size: 1,
        burst_delay: Duration::from_millis(100),
        reply_wait: Duration::from_secs(5),
        ..Default::default()
    };
    let wire = fake_wire(&config, &[]);
    let detection = AliveDetection::new(three_targets(), config).unwrap();

    let start = Instant::now();
    let summary = detection
        .run_with(wire.context, ResultPublisher::new(MemoryChannel::new(), RESULT_QUEUE))
        .await;

    assert_eq!(summary.sent.bursts, 3);
    assert_eq!(Instant::now() - start, Duration::from_millis(5200));
}

#[tokio::test(start_paused = true)]
async fn capture_fault_still_publishes() {
    let config = icmp_config(0);
    let wire = fake_wire(&config, &[1]);
    let detection = AliveDetection::new(three_targets(), config).unwrap();
    let channel = MemoryChannel::new();

    drop(wire.capture);
    let start = Instant::now();
    let summary = detection
        .run_with(wire.context, ResultPublisher::new(channel.clone(), RESULT_QUEUE))
        .await;

    assert!(summary.capture.capture_fault);
    assert!(Instant::now() - start < Duration::from_secs(5));
    assert_eq!(
        channel.entries(RESULT_QUEUE).last().map(String::as_str),
        Some(FINISHED_SENTINEL)
    );
    assert_eq!(
        channel
            .entries(RESULT_QUEUE)
            .iter()
            .filter(|e| *e == FINISHED_SENTINEL)
            .count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn second_run_reports_only_its_own_replies() {
    let detection = AliveDetection::new(three_targets(), icmp_config(0)).unwrap();

    let first = MemoryChannel::new();
    let wire = fake_wire(detection.config(), &[1]);
    detection
        .run_with(wire.context, ResultPublisher::new(first.clone(), RESULT_QUEUE))
        .await;
    assert_eq!(first.entries(RESULT_QUEUE), vec!["10.0.0.1", FINISHED_SENTINEL]);

    let second = MemoryChannel::new();
    let wire = fake_wire(detection.config(), &[2]);
    let summary = detection
        .run_with(wire.context, ResultPublisher::new(second.clone(), RESULT_QUEUE))
        .await;

    assert_eq!(summary.capture.newly_alive, 1);
    assert_eq!(summary.published.published, vec![ip(2)]);
    assert_eq!(second.entries(RESULT_QUEUE), vec!["10.0.0.2", FINISHED_SENTINEL]);
    assert!(!detection.ledger().is_alive(ip(1)));
}
