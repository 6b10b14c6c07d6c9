// Alert ledger
//
// Turns anomaly verdicts into leveled, timestamped alerts. Every raise is
// appended to the in-memory history, to an append-only text log and to the
// `log` facade, all under one lock.

use crate::anomalies::AnomalyReport;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_LOG_FILE: &str = "alerts.log";

/// `log` target of the per-alert console line.
pub const CONSOLE_TARGET: &str = "netsentry::alerts";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("failed to write alert export to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode alerts as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertLevel {
    pub const ALL: [AlertLevel; 4] = [AlertLevel::Low, AlertLevel::Medium, AlertLevel::High, AlertLevel::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Low => "LOW",
            AlertLevel::Medium => "MEDIUM",
            AlertLevel::High => "HIGH",
            AlertLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a severity score to its alert level. Boundaries are inclusive on the lower end.
pub fn severity_to_level(severity: f64) -> AlertLevel {
    if severity >= 0.8 {
        AlertLevel::Critical
    } else if severity >= 0.6 {
        AlertLevel::High
    } else if severity >= 0.3 {
        AlertLevel::Medium
    } else {
        AlertLevel::Low
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
    pub report: AnomalyReport,
    pub timestamp: String, // Local time, "%Y-%m-%d %H:%M:%S"
}

impl Alert {
    fn from_report(report: AnomalyReport) -> Self {
        Alert {
            level: severity_to_level(report.severity),
            message: report.description.clone(),
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            report,
        }
    }

    /// `[timestamp] [LEVEL] message`, as written to the log file.
    pub fn log_line(&self) -> String {
        format!("[{}] [{}] {}", self.timestamp, self.level, self.message)
    }
}

/// One entry of the JSON export.
#[derive(Serialize)]
struct ExportedAlert<'a> {
    timestamp: &'a str,
    level: AlertLevel,
    message: &'a str,
    source_ip: &'a str,
    severity: f64,
}

impl<'a> From<&'a Alert> for ExportedAlert<'a> {
    fn from(alert: &'a Alert) -> Self {
        ExportedAlert {
            timestamp: &alert.timestamp,
            level: alert.level,
            message: &alert.message,
            source_ip: &alert.report.source_ip,
            severity: alert.report.severity,
        }
    }
}

#[derive(Debug)]
pub struct AlertManager {
    alerts: Mutex<Vec<Alert>>,
    log_file: PathBuf,
}

impl Default for AlertManager {
    fn default() -> Self {
        AlertManager::new(DEFAULT_LOG_FILE)
    }
}

impl AlertManager {
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        AlertManager {
            alerts: Mutex::new(Vec::new()),
            log_file: log_file.into(),
        }
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Classifies and records a verdict, returning the stored alert.
    pub fn raise(&self, report: AnomalyReport) -> Alert {
        let mut alerts = self.alerts.lock();

        let alert = Alert::from_report(report);
        let line = alert.log_line();

        if let Err(e) = self.append_to_log(&line) {
            log::warn!("Could not append to alert log {:?}: {}", self.log_file, e);
        }
        log::info!(target: CONSOLE_TARGET, "{}", line);

        alerts.push(alert.clone());
        alert
    }

    fn append_to_log(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.log_file)?;
        writeln!(file, "{}", line)
    }

    /// Snapshot of the full history in raise order.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    pub fn alerts_by_level(&self, level: AlertLevel) -> Vec<Alert> {
        self.alerts.lock().iter().filter(|a| a.level == level).cloned().collect()
    }

    /// Writes every alert currently held as a JSON array, replacing any file at `path`.
    /// A failure leaves the in-memory history untouched.
    pub fn export_to_json(&self, path: impl AsRef<Path>) -> Result<(), AlertError> {
        let path = path.as_ref();
        let alerts = self.alerts.lock();

        let file = File::create(path).map_err(|source| AlertError::Io { path: path.to_path_buf(), source })?;
        let mut writer = BufWriter::new(file);

        let exported: Vec<ExportedAlert<'_>> = alerts.iter().map(ExportedAlert::from).collect();
        serde_json::to_writer_pretty(&mut writer, &exported)?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|source| AlertError::Io { path: path.to_path_buf(), source })?;

        log::debug!("Exported {} alerts to {:?}", exported.len(), path);
        Ok(())
    }

    /// Empties the in-memory history. The log file is append-only and stays as is.
    pub fn clear_alerts(&self) {
        self.alerts.lock().clear();
    }

    pub fn count(&self) -> usize {
        self.alerts.lock().len()
    }
}
