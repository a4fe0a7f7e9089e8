//! SoAuth host binary.
//!
//! Runs a host over the in-memory reference store - enough to exercise
//! the full protocol against real clients. Production deployments embed
//! the library with their own store instead.
//!
//! # Commands
//!
//! - `serve` - start the HTTP host
//! - `keys` - print the signing public keys clients should pin

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use soauth::config::Config;
use soauth::server::{create_router, AppState};
use soauth::store::MemoryStore;

#[derive(Parser)]
#[command(name = "soauth-host")]
#[command(version)]
#[command(about = "SoAuth host - credential-less mutual authentication", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP host (in-memory store)
    Serve {
        /// Path to the TOML configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the signing public keys clients should pin
    Keys {
        /// Path to the TOML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port } => serve(config, port).await,
        Commands::Keys { config } => keys(config),
    }
}

async fn serve(config_path: PathBuf, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(port) = port {
        config.server.port = port;
    }

    let host = config.host_config()?;
    host.announce_identities();

    if let Some(s2s) = config.s2s_channel()? {
        tracing::info!(
            name = %s2s.name(),
            public_key = %s2s.public_key(),
            "S2S identity"
        );
    }

    let machines = config.machine_registry()?;
    for entry in &config.machines {
        let host_key = machines.host_public_key(host.master_secret(), &entry.fingerprint)?;
        tracing::info!(
            fingerprint = %entry.fingerprint,
            host_public_key = %host_key,
            "machine peer"
        );
    }

    tracing::warn!("using the in-memory store; sessions do not survive restarts");
    let state = Arc::new(AppState::new(host, MemoryStore::new()).with_machines(machines));

    let listener = tokio::net::TcpListener::bind(config.server.listen_addr())
        .await
        .with_context(|| format!("binding {}", config.server.listen_addr()))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

fn keys(config_path: PathBuf) -> anyhow::Result<()> {
    let config = Config::from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let host = config.host_config()?;

    for host_id in host.serves() {
        if let Some(keypair) = host.sign_keypair(host_id) {
            println!("{host_id} {}", keypair.public_key().to_hex());
        }
    }
    Ok(())
}
