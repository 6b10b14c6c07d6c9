use anyhow::Context;
use clap::Parser;
use netsentry_core::alerts::{AlertLevel, AlertManager, DEFAULT_LOG_FILE};
use netsentry_core::config::{DetectorConfig, SimulationConfig};
use netsentry_core::detector::AnomalyDetector;
use netsentry_core::monitor::NetworkMonitor;
use netsentry_core::parser::PacketProcessor;
use netsentry_core::simulator::simulate_traffic;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Network traffic anomaly monitor.
#[derive(Debug, Parser)]
#[command(name = "netsentry", version, about)]
struct Cli {
    /// Latency above this is flagged
    #[arg(long, default_value_t = 100.0)]
    max_latency_ms: f64,

    /// Packets per source before a flood is flagged
    #[arg(long, default_value_t = 50)]
    flood_threshold: u32,

    /// Loss ratio above which a source is flagged
    #[arg(long, default_value_t = 0.05)]
    loss_threshold: f64,

    /// Counter window (recorded only, counters do not decay)
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s")]
    window: Duration,

    /// Append-only alert log
    #[arg(long, env = "NETSENTRY_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// JSON export path, defaults to a timestamped file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Read "src:port->dst:port|size|latency" lines from this file instead of simulating
    #[arg(long)]
    input: Option<PathBuf>,

    /// Simulated packets to generate
    #[arg(long, default_value_t = 50)]
    packets: usize,

    /// Simulated packets per second, 0 for as fast as possible
    #[arg(long, default_value_t = 100)]
    tick_rate_hz: u32,

    /// Every Nth simulated packet gets injected latency, 0 to disable
    #[arg(long, default_value_t = 10)]
    anomaly_every: usize,

    /// How long to let the monitor drain before stopping
    #[arg(long, value_parser = humantime::parse_duration, default_value = "2s")]
    run_for: Duration,
}

impl Cli {
    fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            max_latency_ms: self.max_latency_ms,
            flood_threshold: self.flood_threshold,
            packet_loss_threshold: self.loss_threshold,
            window_size_secs: self.window.as_secs(),
        }
    }

    fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            packet_count: self.packets,
            tick_rate_hz: self.tick_rate_hz,
            anomaly_every: self.anomaly_every,
        }
    }
}

fn feed_from_file(monitor: &NetworkMonitor, path: &Path) -> anyhow::Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read packet input {}", path.display()))?;
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();

    let packets = PacketProcessor::new().process_batch(lines.as_slice());
    if packets.len() < lines.len() {
        log::warn!("Skipped {} malformed or invalid lines", lines.len() - packets.len());
    }
    let fed = packets.len();
    for packet in packets {
        monitor.feed_packet(packet);
    }
    Ok(fed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = cli.detector_config();
    log::info!("Starting netsentry with {:?}", config);

    let detector = Arc::new(AnomalyDetector::new(config));
    let alerts = Arc::new(AlertManager::new(cli.log_file.clone()));
    let monitor = NetworkMonitor::new(Arc::clone(&detector), Arc::clone(&alerts));

    monitor.start().context("failed to start monitor worker")?;

    let fed = match &cli.input {
        Some(path) => feed_from_file(&monitor, path)?,
        None => simulate_traffic(&monitor, &cli.simulation_config()).await,
    };
    log::info!("Fed {} packets, waiting {}", fed, humantime::format_duration(cli.run_for));

    tokio::time::sleep(cli.run_for).await;
    tokio::task::block_in_place(|| monitor.stop());

    let export_path = cli.export.clone().unwrap_or_else(|| {
        PathBuf::from(format!("alerts_{}.json", chrono::Local::now().format("%Y%m%d_%H%M%S")))
    });
    match alerts.export_to_json(&export_path) {
        Ok(()) => log::info!("Alerts exported to {}", export_path.display()),
        Err(e) => log::warn!("Export skipped: {}", e),
    }

    println!("\n=== Summary ===");
    println!("Packets analyzed:    {}", monitor.processed());
    println!("Total alerts raised: {}", alerts.count());
    for level in AlertLevel::ALL.iter().rev() {
        println!("  {:<8} {}", level.as_str(), alerts.alerts_by_level(*level).len());
    }
    println!("Sources tracked:     {}", detector.tracked_sources());
    println!("Alert log:           {}", alerts.log_file().display());

    Ok(())
}
