// Background monitoring loop
//
// Producers push packets onto a FIFO queue; a single worker thread pops them
// one at a time, runs the detector and raises any verdict on the alert
// ledger. The queue lock is never held while detection or alerting runs.

use crate::alerts::AlertManager;
use crate::detector::AnomalyDetector;
use crate::packet::Packet;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const WORKER_THREAD_NAME: &str = "netsentry-monitor";

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<Packet>,
    running: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<QueueState>,
    wake: Condvar,
    processed: AtomicU64,
}

#[derive(Debug)]
pub struct NetworkMonitor {
    detector: Arc<AnomalyDetector>,
    alerts: Arc<AlertManager>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>, // Also serializes start/stop
}

impl NetworkMonitor {
    pub fn new(detector: Arc<AnomalyDetector>, alerts: Arc<AlertManager>) -> Self {
        NetworkMonitor {
            detector,
            alerts,
            shared: Arc::new(Shared::default()),
            worker: Mutex::new(None),
        }
    }

    pub fn detector(&self) -> &Arc<AnomalyDetector> {
        &self.detector
    }

    pub fn alert_manager(&self) -> &Arc<AlertManager> {
        &self.alerts
    }

    /// Spawns the worker. Does nothing if it is already running.
    ///
    /// # Panics
    /// Re-raises the panic of a previous worker that died and was never
    /// collected by `stop`.
    pub fn start(&self) -> io::Result<()> {
        let mut worker = self.worker.lock();
        if self.shared.state.lock().running {
            return Ok(());
        }
        if let Some(stale) = worker.take() {
            join_worker(stale);
        }
        self.shared.state.lock().running = true;

        let shared = Arc::clone(&self.shared);
        let detector = Arc::clone(&self.detector);
        let alerts = Arc::clone(&self.alerts);
        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || process_loop(&shared, &detector, &alerts));

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                log::info!("Monitor started");
                Ok(())
            }
            Err(e) => {
                self.shared.state.lock().running = false;
                Err(e)
            }
        }
    }

    /// Signals the worker, waits for it to drain the queue and exit.
    /// Does nothing if no worker was ever started or it was already collected.
    ///
    /// # Panics
    /// Re-raises a panic that occurred on the worker thread, including one
    /// that already took the worker down before `stop` was called.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let was_running = std::mem::replace(&mut self.shared.state.lock().running, false);
        if was_running {
            self.shared.wake.notify_all();
        }

        let Some(handle) = worker.take() else {
            return;
        };
        join_worker(handle);
        log::info!("Monitor stopped after {} packets", self.processed());
    }

    /// Queues a packet for analysis. Never blocks on detection work.
    /// Packets fed while stopped wait for the next `start`.
    pub fn feed_packet(&self, packet: Packet) {
        self.shared.state.lock().queue.push_back(packet);
        self.shared.wake.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Packets handed to the detector since construction.
    pub fn processed(&self) -> u64 {
        self.shared.processed.load(Ordering::SeqCst)
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if let Err(panic) = handle.join() {
        if !thread::panicking() {
            std::panic::resume_unwind(panic);
        }
    }
}

/// Flips the monitor back to stopped if the worker unwinds.
struct PanicGuard<'a> {
    shared: &'a Shared,
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            let pending = {
                let mut state = self.shared.state.lock();
                state.running = false;
                state.queue.len()
            };
            log::error!("Monitor worker panicked, {} packets left queued", pending);
        }
    }
}

fn process_loop(shared: &Shared, detector: &AnomalyDetector, alerts: &AlertManager) {
    let _guard = PanicGuard { shared };
    log::debug!("Monitor worker running");
    loop {
        let packet = {
            let mut state = shared.state.lock();
            while state.queue.is_empty() && state.running {
                shared.wake.wait(&mut state);
            }
            match state.queue.pop_front() {
                Some(packet) => packet,
                None => break, // Stopped with nothing left to drain
            }
        };

        if let Some(report) = detector.analyze(&packet) {
            log::debug!("{} from {} (severity {:.2})", report.anomaly_type, report.source_ip, report.severity);
            alerts.raise(report);
        }
        shared.processed.fetch_add(1, Ordering::SeqCst);
    }
    log::debug!("Monitor worker exiting");
}
