//! BACnet CLI - Command-line tool for BACnet data acquisition
//!
//! Reads and writes object present values, discovers devices and reports
//! connection health using a reader built from a TOML configuration file.

mod commands;
mod config;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use bacnet_reader::BacnetReader;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "bacnet-cli")]
#[command(author, version, about = "BACnet data acquisition CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "BACNET_CONFIG")]
    config: Option<PathBuf>,

    /// Override the device address from the config file
    #[arg(short, long)]
    address: Option<String>,

    /// Override the UDP port from the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read object present values
    Read {
        /// Object keys (e.g. analogInput_1) or names; all objects if omitted
        names: Vec<String>,
    },

    /// Write an object's present value
    Write {
        /// Object key or name
        name: String,

        /// Value to write (number, boolean, or string)
        value: String,
    },

    /// Discover devices on the network (Who-Is)
    Discover {
        /// Lowest device instance to ask for
        #[arg(long, requires = "high")]
        low: Option<u32>,

        /// Highest device instance to ask for
        #[arg(long, requires = "low")]
        high: Option<u32>,
    },

    /// Show reader status
    Status,

    /// Run a health check
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "bacnet_cli=info,bacnet_reader=info".into())
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let ctx = OutputContext::new(cli.output, cli.no_color, cli.quiet);

    match run(&cli, &ctx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ctx.error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, ctx: &OutputContext) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;
    let config = config::merge_with_args(config, cli.address.as_deref(), cli.port);
    let reader = BacnetReader::new(config).context("Failed to create BACnet reader")?;

    match &cli.command {
        Commands::Read { names } => commands::read(&reader, names, ctx).await,
        Commands::Write { name, value } => commands::write(&reader, name, value, ctx).await,
        Commands::Discover { low, high } => {
            let range = (*low).zip(*high);
            commands::discover(&reader, range, ctx).await
        }
        Commands::Status => commands::status(&reader, ctx).await,
        Commands::Health => commands::health(&reader, ctx).await,
    }
}
