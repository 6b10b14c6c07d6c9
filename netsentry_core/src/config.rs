// Detector and simulator configuration structures

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub max_latency_ms: f64,
    pub flood_threshold: u32,        // Observations per source before flagging
    pub packet_loss_threshold: f64,  // Ratio, only used by record_delivery
    pub window_size_secs: u64,       // Carried but not enforced, counters never decay
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            max_latency_ms: 100.0,
            flood_threshold: 100,
            packet_loss_threshold: 0.05, // 5%
            window_size_secs: 10,
        }
    }
}

impl DetectorConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_size_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub packet_count: usize,
    pub tick_rate_hz: u32, // 0 = as fast as possible
    pub anomaly_every: usize, // Every Nth packet gets injected latency, 0 disables injection
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            packet_count: 50,
            tick_rate_hz: 100, // 10ms between packets
            anomaly_every: 10,
        }
    }
}

impl SimulationConfig {
    pub fn tick_interval(&self) -> Option<Duration> {
        if self.tick_rate_hz == 0 {
            None
        } else {
            // Rates past ~2 GHz would round to a zero period
            Some(Duration::from_secs_f64(1.0 / self.tick_rate_hz as f64).max(Duration::from_nanos(1)))
        }
    }

    pub fn is_anomalous(&self, index: usize) -> bool {
        self.anomaly_every != 0 && index % self.anomaly_every == 0
    }
}
