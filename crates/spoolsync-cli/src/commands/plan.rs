use anyhow::{Context, Result};
use clap::Args;
use spoolsync_plan::{ArchiveFetcher, FetchConfig, PlanSource};

use crate::opts::GlobalOpts;
use crate::output::print_json;

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Job reference: http(s) URL or local:<path>
    pub reference: String,
}

pub async fn cmd_plan(opts: &GlobalOpts, args: &PlanArgs) -> Result<()> {
    let fetcher = ArchiveFetcher::new(FetchConfig::default())?;
    let plan = fetcher
        .fetch_plan(&args.reference)
        .await
        .with_context(|| format!("extract usage plan from '{}'", args.reference))?;
    print_json(opts, &plan)
}
