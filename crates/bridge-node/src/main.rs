//! bridge-node — the agent bridge gateway binary.
//!
//! Startup sequence:
//!   1. Parse and validate configuration
//!   2. Wire the executor/escrow/directory collaborators
//!   3. Build shared state (loading the trust store and rate-limit store)
//!   4. Bind the HTTP/WS router and serve until SIGINT/SIGTERM
//!   5. Run a periodic sweep: expire completed records, expired rate
//!      counters, and coalesce persistence writes (§4.3, §4.6, §4.8)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use bridge_collab::{HttpDirectoryClient, HttpEscrowClient, NullEscrowClient, SubprocessExecutor};
use bridge_gateway::{AppState, Args, Config};

const SWEEP_INTERVAL_SECONDS: u64 = 60;
const PERSIST_INTERVAL_SECONDS: u64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bridge=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_args(args).map_err(|errors| anyhow::anyhow!(errors.join("; ")))?;
    info!(agent = %config.args.agent_name, port = config.args.port, "bridge-node starting");

    std::fs::create_dir_all(&config.args.sandbox_root)
        .with_context(|| format!("creating sandbox root {}", config.args.sandbox_root.display()))?;
    if let Some(parent) = config.args.trust_store_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    if let Some(parent) = config.args.rate_limit_store_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let executor: Arc<dyn bridge_collab::Executor> = match &config.args.executor_binary {
        Some(binary) => Arc::new(SubprocessExecutor::new(binary.clone(), Vec::new(), config.args.sandbox_root.clone())),
        None => {
            warn!("no --executor-binary configured, falling back to the echo executor");
            Arc::new(bridge_collab::mocks::EchoExecutor::new())
        }
    };

    let escrow: Arc<dyn bridge_collab::EscrowClient> = if config.escrow_configured {
        Arc::new(HttpEscrowClient::new(
            config.args.escrow_rpc_url.clone().unwrap_or_default(),
            config.args.escrow_address.clone().unwrap_or_default(),
        ))
    } else {
        Arc::new(NullEscrowClient)
    };

    let directory: Option<Arc<dyn bridge_collab::DirectoryClient>> = config
        .args
        .node_url
        .clone()
        .map(|url| Arc::new(HttpDirectoryClient::new(url)) as Arc<dyn bridge_collab::DirectoryClient>);

    let host = config.args.host.clone();
    let port = config.args.port;
    let state: bridge_gateway::SharedState = Arc::new(AppState::new(config, executor, escrow, directory));

    spawn_sweeper(state.clone());

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    let app = bridge_gateway::build_router(state.clone());
    let make_service = app.into_make_service_with_connect_info::<std::net::SocketAddr>();

    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    state.trust_store.save().ok();
    state.limiter.save_to(&state.config.args.rate_limit_store_path).ok();
    info!("bridge-node stopped");
    Ok(())
}

fn spawn_sweeper(state: bridge_gateway::SharedState) {
    tokio::spawn(async move {
        let mut sweep_tick = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECONDS));
        let mut persist_tick = tokio::time::interval(Duration::from_secs(PERSIST_INTERVAL_SECONDS));
        loop {
            tokio::select! {
                _ = sweep_tick.tick() => {
                    let now = bridge_state::now_unix();
                    state.registry.sweep_expired(now);
                    state.limiter.sweep_expired(now);
                }
                _ = persist_tick.tick() => {
                    if let Err(err) = state.trust_store.save() {
                        warn!(%err, "failed to persist trust store");
                    }
                    if let Err(err) = state.limiter.save_to(&state.config.args.rate_limit_store_path) {
                        warn!(%err, "failed to persist rate limit store");
                    }
                }
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining connections");
}
