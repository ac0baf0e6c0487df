mod commands;
mod opts;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::history::HistoryArgs;
use commands::plan::PlanArgs;
use commands::run::RunArgs;
use opts::GlobalOpts;

#[derive(Parser, Debug)]
#[command(name = "spoolsync", version, about = "Printer filament tracking against Spoolman")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the tracker over a recorded telemetry log
    Run(RunArgs),

    /// Extract the usage plan of a job archive
    Plan(PlanArgs),

    /// List recorded prints with their filament usage
    History(HistoryArgs),

    /// Show Spoolman settings
    Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = &cli.opts;
    opts::setup_logging(opts.verbose);

    match cli.command {
        Command::Run(args) => commands::run::cmd_run(opts, &args).await,
        Command::Plan(args) => commands::plan::cmd_plan(opts, &args).await,
        Command::History(args) => commands::history::cmd_history(opts, &args),
        Command::Settings => commands::settings::cmd_settings(opts).await,
    }
}
