// Observation record definitions
use serde::{Serialize, Deserialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Transport protocol tag attached to every observed packet.
/// `Unknown` is what the processor assigns when the destination port maps to nothing it recognizes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    #[default]
    Unknown,
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0) // Clock before 1970, treat as epoch
}

/// One observed unit of traffic metadata. Immutable once built; the detector only reads it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Packet {
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: Protocol,
    pub size_bytes: u32,
    pub latency_ms: f64,
    pub timestamp_ms: u64, // Creation time, Unix epoch millis
}

impl Packet {
    pub fn new(
        src_ip: impl Into<String>,
        dst_ip: impl Into<String>,
        src_port: u16,
        dst_port: u16,
        protocol: Protocol,
        size_bytes: u32,
        latency_ms: f64,
    ) -> Self {
        Packet {
            src_ip: src_ip.into(),
            dst_ip: dst_ip.into(),
            src_port,
            dst_port,
            protocol,
            size_bytes,
            latency_ms,
            timestamp_ms: now_ms(),
        }
    }
}
