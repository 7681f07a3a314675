//! Waypost relay server.
//!
//! Brokers WebRTC handshakes between a user's machines and browsers; media
//! never touches the relay.

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waypost_relay::config::Config;
use waypost_relay::server::{self, sweep, AppState};
use waypost_relay::storage::RelayDatabase;

#[derive(Parser, Debug)]
#[command(name = "waypost-relay")]
#[command(version, about = "Waypost rendezvous and signaling server")]
struct Args {
    /// Address to listen on (overrides HOST/PORT).
    #[arg(long)]
    addr: Option<String>,

    /// SQLite database URL or path (overrides DATABASE_URL).
    #[arg(long)]
    db: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "waypost_relay=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(db) = args.db {
        config.database_url = db;
    }
    let bind_addr = args.addr.unwrap_or_else(|| config.bind_addr());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %bind_addr,
        "Starting waypost-relay"
    );

    let db = RelayDatabase::open(&config.database_url).await?;
    let state = AppState::new(config, db);

    let _sweeper = sweep::spawn_sweeper(state.clone());

    let app = server::router(state.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {bind_addr}: {e}"))?;

    info!(addr = %bind_addr, "Relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await?;

    state.db.close().await;
    info!("Relay stopped");

    Ok(())
}

/// Resolve on SIGINT/SIGTERM, then close every open control channel so the
/// graceful shutdown can drain.
async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("Shutdown signal received, closing control channels");
    for channel in state.channels.all_channels().await {
        channel.close().await;
    }
}
