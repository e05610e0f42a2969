use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kitten_player::DomainList;
use tokio::{signal, sync::watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod ai;
mod games;
mod response_cache;
mod server;
mod tmdb;

use server::{AppState, ProxyConfig};

#[derive(Parser, Debug)]
#[command(name = "kittenproxy")]
#[command(about = "Backend for KittenMovies: metadata and AI proxies, mirror list and catalogs")]
struct Args {
    /// HTTP server port
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Metadata API bearer token, falls back to NEXT_PUBLIC_TMDB_TOKEN
    #[arg(long, env = "TMDB_TOKEN", hide_env_values = true)]
    tmdb_token: Option<String>,

    /// Completion API key
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    openrouter_api_key: Option<String>,

    /// Public site URL sent as attribution to the completion API
    #[arg(long, env = "NEXT_PUBLIC_SITE_URL")]
    site_url: Option<String>,

    /// YAML file with streaming mirrors, replaces the bundled list
    #[arg(long)]
    domains: Option<PathBuf>,

    /// URL of the game catalog JSON
    #[arg(long, env = "GAMES_URL")]
    games_url: Option<String>,

    /// Directory with the front-end build to serve for unmatched paths
    #[arg(long)]
    public_dir: Option<PathBuf>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kittenproxy=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let domains = match &args.domains {
        Some(path) => DomainList::load(path)
            .with_context(|| format!("Failed to load domains from {}", path.display()))?,
        None => DomainList::builtin().context("Failed to load bundled domains")?,
    };
    info!("[main] {} streaming domains configured", domains.len());

    let tmdb_token = non_empty(args.tmdb_token)
        .or_else(|| non_empty(std::env::var("NEXT_PUBLIC_TMDB_TOKEN").ok()));
    let config = ProxyConfig {
        tmdb_token,
        openrouter_api_key: non_empty(args.openrouter_api_key),
        site_url: non_empty(args.site_url),
        ..ProxyConfig::default()
    };
    if config.tmdb_token.is_none() {
        warn!("[main] No TMDB token, metadata requests will fail");
    }
    if config.openrouter_api_key.is_none() {
        info!("[main] No completion API key, AI routes answer with empty results");
    }

    let state = AppState::new(config, domains, non_empty(args.games_url));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let public_dir = args.public_dir;
    let mut server_handle =
        tokio::spawn(async move { server::run_server(addr, state, public_dir, shutdown_rx).await });

    tokio::select! {
        result = &mut server_handle => return result?,
        signal = signal::ctrl_c() => signal?,
    }
    info!("[main] Shutting down...");
    let _ = shutdown_tx.send(true);

    server_handle.await??;

    info!("[main] Done.");
    Ok(())
}
