use anyhow::{Context, Result};
use spoolsync_host::http_inventory;

use crate::opts::GlobalOpts;
use crate::output::print_json;

pub async fn cmd_settings(opts: &GlobalOpts) -> Result<()> {
    let cfg = opts.host_config()?;
    let inventory = http_inventory(&cfg)?;
    let settings = inventory
        .settings()
        .await
        .with_context(|| format!("fetch settings from {}", cfg.spoolman_api_url()))?;
    print_json(opts, &settings)
}
