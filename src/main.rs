use anyhow::Result;
use clap::Parser;
use college_enrich::cli::{Command, RootArgs};
use college_enrich::workflow;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.command.common().verbose);

    match args.command {
        Command::Serve(args) => workflow::run_serve(args),
        Command::Enrich(args) => workflow::run_enrich(args),
        Command::FillMissing(args) => workflow::run_fill_missing(args),
        Command::Status(args) => workflow::run_status(args),
    }
}

/// Install the global subscriber; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {err}");
    }
}
