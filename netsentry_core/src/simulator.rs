// Synthetic traffic for demos and soak tests

use crate::config::SimulationConfig;
use crate::monitor::NetworkMonitor;
use crate::packet::{Packet, Protocol};
use rand::Rng;

const ANOMALY_LATENCY_BASE_MS: f64 = 250.0;

/// Builds a random TCP packet towards port 80. Anomalous packets get 250ms of extra latency.
pub fn generate_packet<R: Rng>(rng: &mut R, inject_anomaly: bool) -> Packet {
    let src_ip = format!("192.168.{}.{}", rng.gen_range(1..=254), rng.gen_range(1..=254));
    let dst_ip = format!("10.0.{}.{}", rng.gen_range(1..=254), rng.gen_range(1..=254));
    let jitter: f64 = rng.gen_range(1.0..50.0);
    let latency_ms = if inject_anomaly { ANOMALY_LATENCY_BASE_MS + jitter } else { jitter };

    Packet::new(
        src_ip,
        dst_ip,
        rng.gen_range(1024..=9999),
        80,
        Protocol::Tcp,
        rng.gen_range(64..=1500),
        latency_ms,
    )
}

/// Feeds `config.packet_count` generated packets into the monitor, one per tick.
/// Returns how many packets were fed.
pub async fn simulate_traffic(monitor: &NetworkMonitor, config: &SimulationConfig) -> usize {
    log::info!("Simulating {} packets", config.packet_count);
    let mut interval = config.tick_interval().map(tokio::time::interval);

    for i in 0..config.packet_count {
        if let Some(interval) = interval.as_mut() {
            interval.tick().await;
        }
        // ThreadRng is not Send, keep it out of the await
        let packet = generate_packet(&mut rand::thread_rng(), config.is_anomalous(i));
        monitor.feed_packet(packet);
    }
    config.packet_count
}
