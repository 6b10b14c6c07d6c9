// Stateful rule engine: one packet in, at most one verdict out

use crate::anomalies::{AnomalyReport, AnomalyType};
use crate::config::DetectorConfig;
use crate::packet::{Packet, Protocol};
use parking_lot::Mutex;
use std::collections::HashMap;

const UNKNOWN_PROTOCOL_SEVERITY: f64 = 0.3;
const PACKET_LOSS_SEVERITY: f64 = 0.6;

#[derive(Debug, Default)]
struct DetectorState {
    config: DetectorConfig,
    packet_counts: HashMap<String, u32>, // src_ip -> observations that reached the flood rule
    sent_packets: HashMap<String, u32>,
    lost_packets: HashMap<String, u32>,
}

impl DetectorState {
    fn is_high_latency(&self, packet: &Packet) -> bool {
        packet.latency_ms > self.config.max_latency_ms
    }

    /// Bumps the source counter, then compares the post-increment value.
    fn bump_and_check_flood(&mut self, src_ip: &str) -> Option<u32> {
        let count = self.packet_counts.entry(src_ip.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        if *count > self.config.flood_threshold {
            Some(*count)
        } else {
            None
        }
    }

    fn latency_severity(&self, latency_ms: f64) -> f64 {
        let ratio = latency_ms / self.config.max_latency_ms;
        (ratio / 10.0).min(1.0)
    }

    fn flood_severity(&self, count: u32) -> f64 {
        let ratio = count as f64 / self.config.flood_threshold as f64;
        (ratio / 2.0).min(1.0)
    }
}

/// Fixed-threshold anomaly detector.
///
/// Rules are evaluated in order and the first match wins:
/// high latency, then flood, then unknown protocol. The flood counter for a
/// source only advances when evaluation reaches the flood rule, so packets
/// already flagged for latency never count toward a flood.
///
/// All state sits behind a single lock; `analyze` holds it for the whole
/// evaluation, so concurrent callers serialize.
#[derive(Debug, Default)]
pub struct AnomalyDetector {
    state: Mutex<DetectorState>,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        AnomalyDetector {
            state: Mutex::new(DetectorState { config, ..Default::default() }),
        }
    }

    /// Analyzes one packet.
    ///
    /// # Panics
    /// If `packet.latency_ms` is negative or NaN. Records are expected to be
    /// validated before they get here.
    pub fn analyze(&self, packet: &Packet) -> Option<AnomalyReport> {
        assert!(
            packet.latency_ms >= 0.0,
            "packet from {} has invalid latency {}",
            packet.src_ip,
            packet.latency_ms
        );

        let mut state = self.state.lock();

        if state.is_high_latency(packet) {
            let description = format!(
                "High latency detected: {:.2} ms (threshold: {:.2} ms)",
                packet.latency_ms, state.config.max_latency_ms
            );
            let severity = state.latency_severity(packet.latency_ms);
            return Some(AnomalyReport::new(AnomalyType::HighLatency, packet.src_ip.as_str(), description, severity));
        }

        if let Some(count) = state.bump_and_check_flood(&packet.src_ip) {
            let description = format!("Possible flood attack from {} ({} packets)", packet.src_ip, count);
            let severity = state.flood_severity(count);
            return Some(AnomalyReport::new(AnomalyType::Flood, packet.src_ip.as_str(), description, severity));
        }

        if packet.protocol == Protocol::Unknown {
            let description = format!("Unknown protocol on port {}", packet.dst_port);
            return Some(AnomalyReport::new(
                AnomalyType::UnknownProtocol,
                packet.src_ip.as_str(),
                description,
                UNKNOWN_PROTOCOL_SEVERITY,
            ));
        }

        None
    }

    /// Runs `analyze` over the batch in order, keeping only the verdicts.
    pub fn analyze_batch(&self, packets: &[Packet]) -> Vec<AnomalyReport> {
        packets.iter().filter_map(|p| self.analyze(p)).collect()
    }

    /// Accumulates delivery counts for a source and checks the loss ratio.
    ///
    /// This is separate from `analyze`; the per-packet rule order never
    /// reaches the loss rule.
    pub fn record_delivery(&self, src_ip: &str, sent: u32, lost: u32) -> Option<AnomalyReport> {
        let mut state = self.state.lock();

        let total_sent = {
            let entry = state.sent_packets.entry(src_ip.to_string()).or_insert(0);
            *entry = entry.saturating_add(sent);
            *entry
        };
        let total_lost = {
            let entry = state.lost_packets.entry(src_ip.to_string()).or_insert(0);
            *entry = entry.saturating_add(lost);
            *entry
        };

        if total_sent == 0 {
            return None;
        }
        let loss_rate = total_lost as f64 / total_sent as f64;
        if loss_rate <= state.config.packet_loss_threshold {
            return None;
        }

        let description = format!(
            "Packet loss from {}: {:.2}% (threshold: {:.2}%)",
            src_ip,
            loss_rate * 100.0,
            state.config.packet_loss_threshold * 100.0
        );
        Some(AnomalyReport::new(AnomalyType::PacketLoss, src_ip, description, PACKET_LOSS_SEVERITY))
    }

    /// Clears every per-source counter. The configuration is kept.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.packet_counts.clear();
        state.sent_packets.clear();
        state.lost_packets.clear();
        log::debug!("Detector counters reset");
    }

    pub fn update_config(&self, config: DetectorConfig) {
        log::info!(
            "Detector config updated: max_latency={}ms flood_threshold={}",
            config.max_latency_ms, config.flood_threshold
        );
        self.state.lock().config = config;
    }

    pub fn config(&self) -> DetectorConfig {
        self.state.lock().config.clone()
    }

    pub fn tracked_sources(&self) -> usize {
        self.state.lock().packet_counts.len()
    }
}
