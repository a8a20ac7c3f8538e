//! Touchscreen instrument launcher
//!
//! Single binary that brings up the instrument's audio stack:
//! - `start` launches the audio server and instrument, patches ports, and
//!   supervises both until shutdown
//! - `ports` and `connect` inspect and patch the running audio graph
//! - `config` manages the configuration file

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use touchscreen_launcher::commands::{self, StartArgs};

#[derive(Parser)]
#[command(name = "touchscreen-launcher")]
#[command(author, version, about = "Touchscreen instrument launcher")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the audio server and instrument, then supervise them
    Start {
        #[command(flatten)]
        args: StartArgs,
    },

    /// List ports registered with the audio server
    Ports {
        /// Print ports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Connect an output port to an input port
    Connect {
        /// Output port, e.g. touchscreen-instrument:left-output
        source: String,
        /// Input port, e.g. system:playback_1
        destination: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Show the configuration file path
    Path,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Start { args } => {
            let config = commands::load_launcher_config(cli.config.as_ref())?;
            commands::start_command(config, &args).await?;
        }

        Commands::Ports { json } => {
            let config = commands::load_launcher_config(cli.config.as_ref())?;
            commands::ports_command(&config, json).await?;
        }

        Commands::Connect {
            source,
            destination,
        } => {
            let config = commands::load_launcher_config(cli.config.as_ref())?;
            commands::connect_command(&config, &source, &destination).await?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(cli.config.as_ref())?,
            ConfigAction::Path => commands::config_path(cli.config.as_ref()),
            ConfigAction::Init { force } => commands::config_init(cli.config.as_ref(), force)?,
        },
    }

    Ok(())
}
