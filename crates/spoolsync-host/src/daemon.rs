//! Long-running tracker loop.
//!
//! The daemon owns the transport and the session. Each inbound report is
//! processed to completion (session cycle, then tray scan) before the next
//! one is read, so every registry mutation happens on this one task.

use serde::Serialize;
use serde_json::Value;
use spoolsync_tracker::{StageEvent, TrackerSession};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::ams::AmsScanner;
use crate::error::HostResult;
use crate::status::{TrayStatus, tray_status};
use crate::transport::{TelemetryTransport, get_version_request, pushall_request, request_topic};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DaemonStats {
    pub messages: u64,
    pub jobs_started: u64,
    pub filament_changes: u64,
    pub reconciliations: u64,
    pub grams_booked: f64,
    pub trays_assigned: u64,
}

pub struct TrackerDaemon<T> {
    transport: T,
    session: TrackerSession,
    scanner: AmsScanner,
    shutdown_rx: broadcast::Receiver<()>,
    stats: DaemonStats,
}

impl<T: TelemetryTransport> TrackerDaemon<T> {
    pub fn new(transport: T, session: TrackerSession, shutdown_rx: broadcast::Receiver<()>) -> Self {
        Self {
            transport,
            session,
            scanner: AmsScanner::new(),
            shutdown_rx,
            stats: DaemonStats::default(),
        }
    }

    pub fn session(&self) -> &TrackerSession {
        &self.session
    }

    pub fn scanner(&self) -> &AmsScanner {
        &self.scanner
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn stats(&self) -> &DaemonStats {
        &self.stats
    }

    /// Last reported trays joined with the spools active for them.
    pub fn tray_status(&self) -> Vec<TrayStatus> {
        tray_status(
            self.scanner.last_config(),
            self.session.registry(),
            &self.session.config().layout,
        )
    }

    /// Run until the telemetry stream ends or shutdown is signalled.
    pub async fn run(&mut self) -> HostResult<DaemonStats> {
        info!(printer = %self.session.config().layout.printer_id, "tracker daemon started");
        self.announce().await?;
        if let Err(err) = self.session.registry_mut().refresh().await {
            warn!(error = %err, "initial spool fetch failed");
        }

        loop {
            tokio::select! {
                msg = self.transport.next_message() => {
                    match msg? {
                        Some(doc) => self.handle(doc).await,
                        None => {
                            info!("telemetry stream ended");
                            break;
                        }
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        info!(
            messages = self.stats.messages,
            reconciliations = self.stats.reconciliations,
            "tracker daemon stopped"
        );
        Ok(self.stats.clone())
    }

    /// Ask the printer for its version and a full state push.
    async fn announce(&mut self) -> HostResult<()> {
        let topic = request_topic(&self.session.config().layout.printer_id);
        self.transport.publish(&topic, &get_version_request()).await?;
        self.transport.publish(&topic, &pushall_request()).await?;
        Ok(())
    }

    async fn handle(&mut self, doc: Value) {
        self.stats.messages += 1;
        let outcome = self.session.process_message(&doc).await;
        for event in &outcome.events {
            match event {
                StageEvent::JobStarted { .. } => self.stats.jobs_started += 1,
                StageEvent::FilamentChange { .. } => self.stats.filament_changes += 1,
            }
        }
        for report in &outcome.reconciled {
            self.stats.reconciliations += 1;
            self.stats.grams_booked += report.total_grams();
        }

        let layout = self.session.config().layout.clone();
        let scan = self
            .scanner
            .scan(self.session.registry_mut(), &layout, &doc)
            .await;
        if !scan.assigned.is_empty() {
            debug!(count = scan.assigned.len(), "trays reassigned");
        }
        self.stats.trays_assigned += scan.assigned.len() as u64;
    }
}
