#![forbid(unsafe_code)]
//! A PeerChain node: serves the HTTP API and joins the network.

use clap::Parser;
use colored::*;
use peerchain::config::{load_config, DEFAULT_CONFIG_PATH};
use peerchain::node::Node;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,
    /// Interface to bind
    #[arg(long)]
    host: Option<String>,
    /// URL other nodes use to reach this one
    #[arg(long)]
    public_url: Option<String>,
    /// Peer to join through (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,
    /// Seconds between background consensus rounds (0 disables)
    #[arg(long)]
    consensus_interval: Option<u64>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(host) = cli.host {
        config.network.host = host;
    }
    if cli.public_url.is_some() {
        config.network.public_url = cli.public_url;
    }
    config.network.bootstrap_peers.extend(cli.peers);
    if let Some(secs) = cli.consensus_interval {
        config.network.consensus_interval_secs = secs;
    }
    config.validate()?;

    let listener = tokio::net::TcpListener::bind(config.network.bind_addr()).await?;
    let node = Arc::new(Node::with_http_transport(config)?);

    println!("{}", "PeerChain node".bright_cyan().bold());
    println!("  {} {}", "url:".bright_white(), node.node_url().green());
    println!("  {} {}", "address:".bright_white(), node.node_address().yellow());
    println!();

    let shutdown = node.clone().shutdown_on(tokio::signal::ctrl_c());
    node.serve(listener, shutdown).await?;
    Ok(())
}
