//! CLI argument parsing for the enrichment service.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "cenrich",
    version,
    about = "College enrichment pipeline and query service",
    after_help = "Commands:\n  serve        Reconcile the store, enrich in the background, serve /getdata\n  enrich       Run one enrichment pass over the base list\n  fill-missing Add blank rows for base entries missing from the store\n  status       Summarize enrichment progress\n\nExamples:\n  cenrich serve --data-dir /srv/colleges\n  cenrich enrich --config settings.json\n  cenrich fill-missing --data-dir .\n  cenrich status --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Serve(ServeArgs),
    Enrich(EnrichArgs),
    FillMissing(FillMissingArgs),
    Status(StatusArgs),
}

impl Command {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Self::Serve(args) => &args.common,
            Self::Enrich(args) => &args.common,
            Self::FillMissing(args) => &args.common,
            Self::Status(args) => &args.common,
        }
    }
}

/// Flags shared by every command.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// JSON settings file (defaults apply when omitted)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory that relative paths in the settings resolve against
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Run the background worker and the query endpoint")]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Override the listen address from the settings file
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Run a single enrichment pass and exit")]
pub struct EnrichArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Emit the pass summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Append blank rows for base entries absent from the store")]
pub struct FillMissingArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Summarize enrichment progress")]
pub struct StatusArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
