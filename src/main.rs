//! querygate CLI Entry Point
//!
//! Subcommands:
//! - `serve` - Run the HTTP API
//! - `generate` - Turn one natural-language request into SQL and print it
//! - `config` - Print the effective configuration (secrets redacted)
//!
//! Command output goes to stdout as JSON. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use querygate::config::{self, AppConfig};
use querygate::engine::mysql::MySqlConnector;
use querygate::generate::{GeminiClient, GenerationAdapter};
use querygate::output::GenerateResponse;
use querygate::registry::PoolRegistry;
use querygate::server::{self, AppState};
use querygate::tracing_setup::{init_tracing, TracingConfig};

/// querygate - MySQL gateway with natural-language SQL generation
#[derive(Parser)]
#[command(name = "querygate")]
#[command(about = "HTTP gateway for MySQL with per-identity pools and SQL generation")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/querygate/config.json if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind, overrides the config file
        #[arg(long)]
        bind: Option<std::net::SocketAddr>,

        /// Skip connecting the default identity at startup
        #[arg(long)]
        no_eager_connect: bool,
    },

    /// Generate SQL for a request without executing it
    Generate {
        /// Natural-language request or schema fragment
        #[arg(long)]
        prompt: String,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingConfig { debug: cli.debug })?;

    let mut config = config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve {
            bind,
            no_eager_connect,
        } => {
            if let Some(bind) = bind {
                config.server.bind_addr = bind;
            }
            if no_eager_connect {
                config.server.eager_connect = false;
            }
            serve(config).await
        }
        Commands::Generate { prompt } => {
            let adapter = GenerationAdapter::new(Arc::new(GeminiClient::new(&config.generator)));
            let query = adapter.generate_sql(&prompt).await.context("SQL generation failed")?;
            println!("{}", serde_json::to_string_pretty(&GenerateResponse { query })?);
            Ok(())
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config.redacted_json())?);
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    let connector = Arc::new(MySqlConnector::new(&config.pool));
    let registry = Arc::new(
        PoolRegistry::new(connector, config.defaults.clone())
            .with_bootstrap_statements(config.pool.bootstrap_statements.clone()),
    );

    if config.server.eager_connect {
        server::connect_default(&registry).await;
    } else {
        info!("eager connect disabled");
    }

    let generator = Arc::new(GeminiClient::new(&config.generator));
    let state = Arc::new(AppState::new(registry, generator));

    server::run_server(state, &config.server).await?;
    Ok(())
}
