use netsentry_core::alerts::{AlertLevel, AlertManager};
use netsentry_core::anomalies::{AnomalyReport, AnomalyType};
use netsentry_core::config::DetectorConfig;
use netsentry_core::detector::AnomalyDetector;
use netsentry_core::monitor::NetworkMonitor;
use netsentry_core::packet::{Packet, Protocol};
use netsentry_core::parser::PacketProcessor;

use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

// Helper to build a monitor writing its log into a temp dir.
fn create_monitor(dir: &TempDir, config: DetectorConfig) -> NetworkMonitor {
    NetworkMonitor::new(
        Arc::new(AnomalyDetector::new(config)),
        Arc::new(AlertManager::new(dir.path().join("alerts.log"))),
    )
}

// Packet `seq` from producer `producer`; latency and protocol are varied so every rule fires.
fn producer_packet(producer: usize, seq: usize) -> Packet {
    let src = format!("192.168.{}.{}", producer + 1, seq % 3 + 1);
    let latency = if seq % 7 == 0 { 180.0 + producer as f64 } else { 5.0 };
    let (dst_port, protocol) = if seq % 11 == 0 { (9999, Protocol::Unknown) } else { (80, Protocol::Tcp) };
    Packet::new(src, "10.0.0.1", 4000 + seq as u16, dst_port, protocol, 256, latency)
}

fn verdict_key(report: &AnomalyReport) -> (AnomalyType, String, String) {
    (report.anomaly_type, report.source_ip.clone(), report.description.clone())
}

#[test]
fn test_concurrent_producers_match_sequential_replay() {
    const PRODUCERS: usize = 6;
    const PER_PRODUCER: usize = 200;

    let dir = TempDir::new().unwrap();
    let config = DetectorConfig { flood_threshold: 20, ..Default::default() };
    let monitor = Arc::new(create_monitor(&dir, config.clone()));

    // Record arrival order as seen by the queue: one global order, taken under a lock
    // that wraps feed_packet so the log matches the queue exactly.
    let arrival = Arc::new(order_log::OrderLog::default());

    monitor.start().unwrap();
    let barrier = Arc::new(Barrier::new(PRODUCERS));
    let handles: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let monitor = Arc::clone(&monitor);
            let arrival = Arc::clone(&arrival);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for seq in 0..PER_PRODUCER {
                    let packet = producer_packet(producer, seq);
                    arrival.feed(&monitor, packet);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    monitor.stop();

    assert_eq!(monitor.processed(), (PRODUCERS * PER_PRODUCER) as u64);
    assert_eq!(monitor.pending(), 0);

    let order = arrival.take();
    assert_eq!(order.len(), PRODUCERS * PER_PRODUCER);

    // Per-producer submission order is preserved inside the merged order.
    for producer in 0..PRODUCERS {
        let seqs: Vec<u16> = order
            .iter()
            .filter(|p| p.src_ip.starts_with(&format!("192.168.{}.", producer + 1)))
            .map(|p| p.src_port)
            .collect();
        assert!(seqs.windows(2).all(|w| w[0] < w[1]), "producer {} reordered", producer);
    }

    // Replaying the same arrival order through a fresh detector gives the same verdicts, in order.
    let replay = AnomalyDetector::new(config);
    let expected: Vec<_> = replay.analyze_batch(&order).iter().map(verdict_key).collect();
    let actual: Vec<_> = monitor.alert_manager().alerts().iter().map(|a| verdict_key(&a.report)).collect();
    assert_eq!(actual, expected);

    let types: std::collections::HashSet<_> = actual.iter().map(|k| k.0).collect();
    assert!(types.contains(&AnomalyType::HighLatency));
    assert!(types.contains(&AnomalyType::Flood));
    assert!(types.contains(&AnomalyType::UnknownProtocol));
}

#[test]
fn test_parsed_lines_flow_through_monitor_to_export() {
    let dir = TempDir::new().unwrap();
    let monitor = create_monitor(&dir, DetectorConfig::default());
    let processor = PacketProcessor::new();

    let lines = [
        "192.168.1.1:5000->10.0.0.1:80|1024|12.5",   // normal
        "192.168.1.2:5000->10.0.0.1:80|1024|950.0",  // latency ratio 9.5 -> 0.95, critical
        "192.168.1.3:5000->10.0.0.1:443|1024|650.0", // 0.65, high
        "192.168.1.4:5000->10.0.0.1:9999|64|1.0",    // unknown protocol, medium
        "192.168.1.5:5000->10.0.0.1:80|64|150.0",    // 0.15, low
        "broken line",
    ];
    monitor.start().unwrap();
    for packet in processor.process_batch(&lines[..]) {
        monitor.feed_packet(packet);
    }
    monitor.stop();

    let alerts = monitor.alert_manager();
    assert_eq!(monitor.processed(), 5);
    assert_eq!(alerts.count(), 4);
    assert_eq!(alerts.alerts_by_level(AlertLevel::Critical).len(), 1);
    assert_eq!(alerts.alerts_by_level(AlertLevel::High).len(), 1);
    assert_eq!(alerts.alerts_by_level(AlertLevel::Medium)[0].report.source_ip, "192.168.1.4");
    assert_eq!(alerts.alerts_by_level(AlertLevel::Low)[0].report.source_ip, "192.168.1.5");

    let export = dir.path().join("alerts.json");
    alerts.export_to_json(&export).unwrap();
    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&export).unwrap()).unwrap();
    let levels: Vec<_> = value.as_array().unwrap().iter().map(|e| e["level"].as_str().unwrap().to_string()).collect();
    assert_eq!(levels, vec!["CRITICAL", "HIGH", "MEDIUM", "LOW"]);

    alerts.clear_alerts();
    alerts.export_to_json(&export).unwrap();
    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&export).unwrap()).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 0);
    let log = std::fs::read_to_string(alerts.log_file()).unwrap();
    assert_eq!(log.lines().count(), 4);
}

#[test]
fn test_config_update_is_not_retroactive() {
    let dir = TempDir::new().unwrap();
    let monitor = create_monitor(&dir, DetectorConfig::default());
    monitor.start().unwrap();
    monitor.feed_packet(Packet::new("192.168.1.1", "10.0.0.1", 1, 80, Protocol::Tcp, 64, 150.0));
    monitor.stop();
    assert_eq!(monitor.alert_manager().count(), 1);

    monitor.detector().update_config(DetectorConfig { max_latency_ms: 1000.0, ..Default::default() });
    monitor.start().unwrap();
    monitor.feed_packet(Packet::new("192.168.1.1", "10.0.0.1", 1, 80, Protocol::Tcp, 64, 150.0));
    monitor.stop();

    let alerts = monitor.alert_manager().alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].level, AlertLevel::Low);
    assert!(alerts[0].message.contains("threshold: 100.00 ms"));
}

// Serializes feeding so the test knows the exact order the queue saw.
mod order_log {
    use netsentry_core::monitor::NetworkMonitor;
    use netsentry_core::packet::Packet;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct OrderLog {
        order: Mutex<Vec<Packet>>,
    }

    impl OrderLog {
        pub fn feed(&self, monitor: &NetworkMonitor, packet: Packet) {
            let mut order = self.order.lock().unwrap();
            order.push(packet.clone());
            monitor.feed_packet(packet);
        }

        pub fn take(&self) -> Vec<Packet> {
            std::mem::take(&mut *self.order.lock().unwrap())
        }
    }
}
