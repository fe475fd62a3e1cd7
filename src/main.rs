//! ref-resolve CLI
//!
//! Resolves `$ref` pointers in YAML/JSON API descriptions across local
//! files and URLs.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ref_resolve::describe::{run_describe, DescribeArgs};
use ref_resolve::keys::{run_check_keys, CheckKeysArgs};
use ref_resolve::resolver::{run_resolve, ResolveArgs};

#[derive(Parser)]
#[command(name = "ref-resolve")]
#[command(author = "RoyalBit Inc.")]
#[command(version)]
#[command(about = "Resolve $ref pointers in YAML/JSON API descriptions")]
#[command(long_about = "Resolves '[file]#/path/to/node' references across local files and URLs.\n\nCommands:\n  resolve      Resolve references to document fragments\n  describe     Dump a document tree as indented text\n  check-keys   Report missing and unexpected mapping keys")]
struct Cli {
    /// Log resolution progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve references relative to a base document
    Resolve(ResolveArgs),
    /// Print a document (or a fragment of it) as indented text
    Describe(DescribeArgs),
    /// Check a mapping's keys against required/allowed names and patterns
    CheckKeys(CheckKeysArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Resolve(args) => run_resolve(args).await,
        Commands::Describe(args) => run_describe(args).await,
        Commands::CheckKeys(args) => run_check_keys(args).await,
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
