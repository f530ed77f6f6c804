//! Marginalia server CLI
//!
//! Starts the HTTP server for book fetching and analysis.

use clap::Parser;
use marginalia_server::{config::ServerConfig, start_server, ServerError};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "marginalia-server",
    version,
    about = "Book fetching and LLM literary analysis service"
)]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "MARGINALIA_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the bind port
    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), ServerError> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => {
            eprintln!("Warning: No config file specified, using defaults");
            ServerConfig::default()
        }
    };

    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.bind_port = port;
    }

    start_server(config).await
}
