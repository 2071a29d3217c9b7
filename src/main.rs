//! scholar CLI entry point

use clap::{Parser, Subcommand};
use scholar::{
    commands::{cmd_init, cmd_status, print_init, print_status, InitOptions},
    config::Config,
    error::Result,
    meta::MetaDb,
    server,
    store::create_store,
};
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "scholar")]
#[command(version, about = "Multi-agent research assistant backend", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create the database
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Run the HTTP API
    Serve {
        /// Bind address (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show configuration, storage, and row counts
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(cli.json_logs.then(|| fmt::layer().json()))
        .with((!cli.json_logs).then(fmt::layer))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            let base_dir = match cli.config.as_deref().and_then(Path::parent) {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => Config::default_base_dir(),
            };
            let config = cmd_init(InitOptions { base_dir, force }).await?;
            print_init(&config);
        }

        Commands::Serve { host, port } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(config).await?;
        }

        Commands::Status { json } => {
            let config = load_config(cli.config.as_deref())?;
            let db = MetaDb::connect(&config.paths.db_file).await?;
            db.init_schema().await?;

            let store = match create_store(&config).await {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!("Vector store unavailable: {}", e);
                    None
                }
            };

            let status = cmd_status(&config, &db, store.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

/// An explicit path must exist; otherwise fall back to defaults when
/// `~/.scholar/config.toml` is absent.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::load_from(None),
    }
}
