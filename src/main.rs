//! agent-relay: streams multi-agent pipeline progress over Server-Sent Events

use agent_relay::config::{ConfigError, RelayConfig};
use agent_relay::observability::init_default_logging;
use agent_relay::observability::logging::verbosity_level;
use agent_relay::transport::serve;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Config files probed when `--config` is not given
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["agent-relay.toml", "config/agent-relay.toml"];

/// Multi-agent pipeline relay over Server-Sent Events
#[derive(Parser)]
#[command(name = "agent-relay")]
#[command(about = "Streams planner/executor pipeline progress over Server-Sent Events")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen host, overrides [server].host
    #[arg(long, env = "RELAY_HOST")]
    host: Option<String>,

    /// Listen port, overrides [server].port
    #[arg(long, env = "RELAY_PORT")]
    port: Option<u16>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the SSE endpoints (default)
    Serve,
    /// Validate configuration
    Config {
        /// Print the resolved configuration as TOML
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(verbosity_level(cli.verbose));

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(cli: &Cli) -> Result<RelayConfig, ConfigError> {
    let mut config = match config_path(cli.config.as_deref()) {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            RelayConfig::load_from_file(&path)?
        }
        None => {
            info!("No configuration file found, using defaults");
            RelayConfig::default()
        }
    };

    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;
    Ok(config)
}

/// Explicit path, or the first default location that exists
fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    DEFAULT_CONFIG_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

async fn run_server(config: RelayConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting agent-relay v{}", env!("CARGO_PKG_VERSION"));

    let shutdown = CancellationToken::new();
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
        }
        signal_token.cancel();
    });

    serve(&config, shutdown).await?;
    info!("Application shutdown complete");
    Ok(())
}

fn handle_config_command(
    config: &RelayConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
