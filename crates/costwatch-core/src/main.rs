//! Costwatch CLI
//!
//! Command-line interface for the Costwatch spend monitor.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use costwatch::api::HttpServer;
use costwatch::monitor::CostMonitor;
use costwatch::Config;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Costwatch - Azure month-to-date spend alerts
#[derive(Parser)]
#[command(name = "costwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Load environment variables from this file before reading configuration
    #[arg(long, global = true, env = "COSTWATCH_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the status endpoint (default)
    Serve {
        /// Address to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run a single cost check and print the result as JSON
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Populate the environment before anything reads it
    let env_loaded = match &cli.env_file {
        Some(path) => dotenvy::from_path(path).map(|()| Some(path.clone())),
        None => dotenvy::dotenv().map(Some).or_else(|e| {
            if e.not_found() {
                Ok(None)
            } else {
                Err(e)
            }
        }),
    };

    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    match env_loaded {
        Ok(Some(path)) => info!(path = %path.display(), "Loaded environment file"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Could not load environment file"),
    }

    // Execute command
    let result = match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    }) {
        Commands::Serve { host, port } => run_serve(config, host, port).await,
        Commands::Check => run_check(&config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` is already folded into `config.logging.level`; `--verbose` wins over it
fn log_filter(configured: &str, verbose: bool) -> EnvFilter {
    let directives = if verbose { "debug" } else { configured };
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_logging(config: &Config, verbose: bool) {
    let filter = log_filter(&config.logging.level, verbose);

    if config.logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run_serve(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    info!(
        subscription_id = config.azure.subscription_id.as_deref().unwrap_or("None"),
        threshold = config.threshold,
        "Starting Costwatch"
    );

    let monitor = Arc::new(CostMonitor::from_config(&config));
    let addr = config.server.bind_addr();

    HttpServer::new(monitor)
        .serve(&addr, async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl+C received, shutting down...");
            }
        })
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn run_check(config: &Config) -> anyhow::Result<()> {
    let monitor = CostMonitor::from_config(config);
    let status = monitor.check().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
