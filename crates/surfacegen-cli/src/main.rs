//! Surfacegen CLI
//!
//! - `generate`: descriptor set + client config → surface report JSON
//! - `check`: same pass, fails if any method is excluded
//! - `shapes`: print the resolved shape of every method variant

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "surfacegen")]
#[command(
    author,
    version,
    about = "Surfacegen: schema-driven client surface generator"
)]
struct Cli {
    /// Log at debug level (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a generation pass and write the surface report.
    Generate {
        /// Descriptor set JSON (`buf build --as-file-descriptor-set`).
        #[arg(long)]
        descriptor: PathBuf,
        /// Client config JSON (`ClientConfigV1`).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output report JSON.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Run a generation pass and fail if any method is excluded.
    Check {
        #[arg(long)]
        descriptor: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the resolved shape of every method variant.
    Shapes {
        #[arg(long)]
        descriptor: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate {
            descriptor,
            config,
            out,
        } => commands::cmd_generate(&descriptor, config.as_deref(), &out),
        Commands::Check { descriptor, config } => {
            commands::cmd_check(&descriptor, config.as_deref())
        }
        Commands::Shapes { descriptor, config } => {
            commands::cmd_shapes(&descriptor, config.as_deref())
        }
    }
}
