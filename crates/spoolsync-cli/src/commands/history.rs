use anyhow::{Context, Result};
use clap::Args;
use spoolsync_history::HistoryStore;

use crate::opts::GlobalOpts;
use crate::output::print_json;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Only prints that used this spool
    #[arg(long)]
    pub spool: Option<i64>,
}

pub fn cmd_history(opts: &GlobalOpts, args: &HistoryArgs) -> Result<()> {
    let cfg = opts.host_config()?;
    let store = HistoryStore::open(&cfg.history_db)
        .with_context(|| format!("open history at {}", cfg.history_db.display()))?;
    let prints = match args.spool {
        Some(spool) => store.prints_by_spool(spool)?,
        None => store.prints_with_filament()?,
    };
    print_json(opts, &prints)
}
