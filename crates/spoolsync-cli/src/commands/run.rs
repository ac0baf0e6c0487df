use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use spoolsync_host::{
    DaemonStats, NdjsonReplay, TrackerDaemon, TrayStatus, http_inventory, open_session,
};
use spoolsync_inventory::{DynInventory, MemInventory};
use tokio::sync::broadcast;

use crate::opts::GlobalOpts;
use crate::output::print_json;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Telemetry log with one JSON report per line
    pub log: PathBuf,

    /// Book consumption even if AUTO_SPEND is off
    #[arg(long)]
    pub auto_spend: bool,

    /// Read spools from Spoolman but keep all writes in memory
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Serialize)]
struct RunSummary {
    stats: DaemonStats,
    trays: Vec<TrayStatus>,
}

pub async fn cmd_run(opts: &GlobalOpts, args: &RunArgs) -> Result<()> {
    let mut cfg = opts.host_config()?;
    if args.auto_spend {
        cfg.auto_spend = true;
    }

    let live = http_inventory(&cfg)?;
    let inventory: DynInventory = if args.dry_run {
        let spools = live
            .list_spools()
            .await
            .with_context(|| format!("list spools from {}", cfg.spoolman_api_url()))?;
        tracing::info!(spools = spools.len(), "dry run: inventory writes stay in memory");
        Arc::new(MemInventory::new(spools))
    } else {
        live
    };

    let session = open_session(&cfg, inventory, None).context("open tracker session")?;
    let transport = NdjsonReplay::open(&args.log)
        .await
        .with_context(|| format!("open telemetry log {}", args.log.display()))?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        let mut term =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, shutting down...");
            }
            _ = async {
                if let Some(ref mut t) = term { t.recv().await; }
            } => {
                tracing::info!("SIGTERM received, shutting down...");
            }
        }
        let _ = shutdown_tx.send(());
    });

    let mut daemon = TrackerDaemon::new(transport, session, shutdown_rx);
    let stats = daemon.run().await?;
    let trays = daemon.tray_status();
    for tray in trays.iter().filter(|t| t.issue) {
        tracing::warn!(tray = %tray.tray, "tray holds filament with no active spool");
    }
    print_json(opts, &RunSummary { stats, trays })
}
