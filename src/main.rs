//! Command line interface for the realtime cache sync daemon. Connects to the
//! push feed, keeps the local query caches reconciled, and exposes them over
//! a read-only status server.

mod backoff;
mod cache;
mod config;
mod connection;
mod model;
mod normalize;
mod protocol;
mod reconcile;
mod refetch;
mod server;
mod session;

use std::{fs, net::SocketAddr, path::Path, sync::Arc};

use clap::{Parser, Subcommand};

use cache::{CacheHandle, CacheState};
use config::Settings;
use connection::{Connection, ConnectionConfig};
use reconcile::Reconciler;
use refetch::{HttpRefetcher, Refetcher, RefetchQueue};
use session::{Identity, Session};

/// Command line interface entry point.
#[derive(Parser)]
#[command(name = "bellwire", author, version, about = "Realtime social-cache sync daemon")]
struct Cli {
    /// Path to the `.env` configuration file.
    #[arg(long, default_value = ".env")]
    env: String,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Connect to the push feed and serve the cached views until interrupted.
    Run,
    /// Print the effective settings and exit.
    Config,
}

/// Execute the selected CLI subcommand.
async fn run(cli: Cli) -> anyhow::Result<()> {
    ensure_env_file(&cli.env)?;
    let cfg = Settings::from_env(&cli.env)?;
    match cli.command {
        Commands::Config => print_settings(&cfg),
        Commands::Run => {
            let cache = CacheHandle::new(CacheState::bootstrapped());
            let reconciler =
                Reconciler::new(cfg.user_id.clone().unwrap_or_default(), cfg.page_limit);
            let refetcher: Arc<dyn Refetcher> =
                Arc::new(HttpRefetcher::new(cfg.api_url.clone(), cfg.auth_token.clone()));
            let (queue, _refetch_worker) = RefetchQueue::spawn(refetcher, cache.clone());
            let session = Session::new(Identity::new(
                cfg.user_id.clone(),
                cfg.auth_token.clone(),
            ));
            let mut connection = Connection::start(
                ConnectionConfig {
                    ws_url: cfg.ws_url.clone(),
                    heartbeat: cfg.heartbeat,
                    backoff: cfg.backoff(),
                },
                cache.clone(),
                reconciler,
                queue,
                session.subscribe(),
            );
            let http_addr: SocketAddr = cfg.bind_http.parse()?;
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            server::serve_http(http_addr, cache, connection.status(), shutdown).await?;
            connection.stop().await;
        }
    }
    Ok(())
}

fn print_settings(cfg: &Settings) {
    println!("WS_URL={}", cfg.ws_url);
    println!("API_URL={}", cfg.api_url);
    println!("AUTH_TOKEN={}", cfg.auth_token.as_deref().unwrap_or(""));
    println!("USER_ID={}", cfg.user_id.as_deref().unwrap_or(""));
    println!("BIND_HTTP={}", cfg.bind_http);
    println!("HEARTBEAT_SECS={}", cfg.heartbeat.as_secs());
    println!("BACKOFF_BASE_MS={}", cfg.backoff_base.as_millis());
    println!("BACKOFF_CAP_MS={}", cfg.backoff_cap.as_millis());
    println!("PAGE_LIMIT={}", cfg.page_limit);
}

/// Create a default `.env` file if one is not already present at `path`.
fn ensure_env_file(path: &str) -> anyhow::Result<()> {
    let env_path = Path::new(path);
    if env_path.exists() {
        return Ok(());
    }
    if let Some(parent) = env_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut content = String::new();
    content.push_str("WS_URL=ws://127.0.0.1:8787/realtime\n");
    content.push_str("API_URL=http://127.0.0.1:8788\n");
    content.push_str("AUTH_TOKEN=\n");
    content.push_str("USER_ID=\n");
    content.push_str("BIND_HTTP=127.0.0.1:7900\n");
    content.push_str("HEARTBEAT_SECS=30\n");
    content.push_str("BACKOFF_BASE_MS=1000\n");
    content.push_str("BACKOFF_CAP_MS=30000\n");
    content.push_str("PAGE_LIMIT=20\n");
    fs::write(env_path, content)?;
    Ok(())
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bellwire=info")),
        )
        .init();
    let cli = Cli::parse();
    run(cli).await
}
