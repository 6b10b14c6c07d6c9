// Anomaly verdicts produced by the detector

use crate::packet::now_ms;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnomalyType {
    HighLatency,
    PacketLoss,
    Flood,
    UnknownProtocol,
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnomalyType::HighLatency => "high-latency",
            AnomalyType::PacketLoss => "packet-loss",
            AnomalyType::Flood => "flood",
            AnomalyType::UnknownProtocol => "unknown-protocol",
        };
        f.write_str(name)
    }
}

/// A single anomaly verdict. "No anomaly" is represented by `Option::None`
/// at the call site, never by a placeholder report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub anomaly_type: AnomalyType,
    pub description: String,
    pub source_ip: String,
    pub severity: f64, // Always within [0.0, 1.0]
    pub detected_at_ms: u64,
}

impl AnomalyReport {
    pub fn new(
        anomaly_type: AnomalyType,
        source_ip: impl Into<String>,
        description: impl Into<String>,
        severity: f64,
    ) -> Self {
        AnomalyReport {
            anomaly_type,
            description: description.into(),
            source_ip: source_ip.into(),
            severity: severity.clamp(0.0, 1.0),
            detected_at_ms: now_ms(),
        }
    }
}
