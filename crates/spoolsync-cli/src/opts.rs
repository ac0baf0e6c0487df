//! Global CLI options and host configuration resolution.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use spoolsync_host::{HostConfig, load_env_file};
use tracing_subscriber::EnvFilter;

/// Options shared by every command. Unset flags fall back to the
/// environment (and the `.env` file), then to built-in defaults.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Dotenv file read before the environment (env: SPOOLSYNC_ENV_FILE)
    #[arg(long, global = true, env = "SPOOLSYNC_ENV_FILE", default_value = ".env")]
    pub env_file: PathBuf,

    /// Printer serial number
    #[arg(long, global = true)]
    pub printer_id: Option<String>,

    /// Spoolman base URL, e.g. http://spoolman:7912
    #[arg(long, global = true)]
    pub spoolman_url: Option<String>,

    /// SQLite print history database
    #[arg(long, global = true)]
    pub history_db: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalOpts {
    pub fn host_config(&self) -> Result<HostConfig> {
        load_env_file(&self.env_file).context("load env file")?;
        let mut cfg = HostConfig::from_env().context("read configuration")?;
        if let Some(id) = &self.printer_id {
            cfg.printer_id = id.clone();
        }
        if let Some(url) = &self.spoolman_url {
            cfg.spoolman_url = url.clone();
        }
        if let Some(path) = &self.history_db {
            cfg.history_db = path.clone();
        }
        Ok(cfg)
    }
}

/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();
}
