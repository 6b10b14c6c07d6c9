// Core library crate for netsentry.
// Packet observations go in, heuristic anomaly verdicts come out and are
// recorded as leveled alerts by a background monitor.

pub mod alerts;     // Alert ledger: leveling, append-only log, JSON export
pub mod anomalies;  // Anomaly verdict types
pub mod config;     // Detector and simulator configuration structures
pub mod detector;   // Stateful fixed-threshold rule engine
pub mod monitor;    // Queue + single background worker
pub mod packet;     // Observation record definitions
pub mod parser;     // Raw text -> Packet parsing and validation
pub mod simulator;  // Synthetic traffic for demos

pub use alerts::{severity_to_level, Alert, AlertError, AlertLevel, AlertManager};
pub use anomalies::{AnomalyReport, AnomalyType};
pub use config::{DetectorConfig, SimulationConfig};
pub use detector::AnomalyDetector;
pub use monitor::NetworkMonitor;
pub use packet::{Packet, Protocol};
pub use parser::{PacketProcessor, ParseError};
