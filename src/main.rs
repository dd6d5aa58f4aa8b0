use analysis_report::cli::{Command, RootArgs};
use analysis_report::workflow::{run_config, run_extract, run_run, run_steps};
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = RootArgs::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Run(args) => run_run(args, cli.verbose),
        Command::Steps(args) => run_steps(args),
        Command::Extract(args) => run_extract(args),
        Command::Config(args) => run_config(args),
    }
}

/// Logs go to stderr; stdout carries only command output.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
