//! Auction House - Main binary
//!
//! Serves a live timed auction over HTTP and WebSocket.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐   hooks (snapshot,   ┌────────────────┐
//! │ AuctionEngine  │   bid, resolution)   │  Axum server   │
//! │ + timer task   │ ───────────────────► │  WS broadcast  │
//! │                │ ◄─────────────────── │  REST / admin  │
//! └───────┬────────┘   place_bid, admin   └────────────────┘
//!         │
//!      SQLite (the durable auction state)
//! ```
//!
//! On start the persisted deadline is restored, so a turn that expired while
//! the process was down is settled once before new requests are served.

mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use engine::{AuctionEngine, IntegrityPolicy};
use server::{BroadcastHook, ServerState, create_app};
use storage::AuctionStore;
use tokio::sync::broadcast;
use tracing::info;

pub use config::AuctionConfig;

/// Auction House - live timed auction server
#[derive(Parser, Debug)]
#[command(name = "auction-house")]
#[command(about = "Live timed auction: bidding, turn settlement and broadcast")]
#[command(version)]
struct Args {
    /// SQLite database path (`:memory:` for a throwaway auction)
    #[arg(long, env = "AUCTION_DB", default_value = "auction.db")]
    db: String,

    /// Host to bind to
    #[arg(long, env = "AUCTION_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "AUCTION_PORT", default_value_t = 8001)]
    port: u16,

    /// Bidding window in seconds
    #[arg(long, env = "AUCTION_BID_SECONDS")]
    bid_seconds: Option<u32>,

    /// Timer check period in milliseconds
    #[arg(long, env = "AUCTION_CHECK_MS")]
    check_ms: Option<u64>,

    /// Maximum lots per bidder
    #[arg(long, env = "AUCTION_ROSTER_CAP")]
    roster_cap: Option<u32>,

    /// Maximum overseas lots per bidder
    #[arg(long, env = "AUCTION_OVERSEAS_CAP")]
    overseas_cap: Option<u32>,

    /// Token required on admin routes and observer sockets
    #[arg(long, env = "AUCTION_ADMIN_TOKEN")]
    admin_token: Option<String>,

    /// What to do after a failed settlement: manual or return_lot
    #[arg(long, env = "AUCTION_INTEGRITY_POLICY")]
    integrity_policy: Option<IntegrityPolicy>,

    /// Buffered broadcast events per subscriber
    #[arg(long, env = "AUCTION_CHANNEL_CAPACITY")]
    channel_capacity: Option<usize>,
}

impl Args {
    fn into_config(self) -> AuctionConfig {
        let mut config = AuctionConfig::new()
            .db_path(self.db)
            .bind(self.host, self.port)
            .admin_token(self.admin_token);

        if let Some(secs) = self.bid_seconds {
            config = config.bid_duration_secs(secs);
        }
        if let Some(ms) = self.check_ms {
            config = config.check_interval_ms(ms);
        }
        if let Some(cap) = self.roster_cap {
            config = config.roster_cap(cap);
        }
        if let Some(cap) = self.overseas_cap {
            config = config.overseas_cap(cap);
        }
        if let Some(policy) = self.integrity_policy {
            config = config.integrity_policy(policy);
        }
        if let Some(capacity) = self.channel_capacity {
            config = config.channel_capacity(capacity);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = Args::parse().into_config();
    info!(
        db = %config.db_path,
        bid_seconds = config.bid_duration_secs,
        roster_cap = config.roster_cap,
        overseas_cap = config.overseas_cap,
        policy = ?config.integrity_policy,
        "starting auction house"
    );

    let store = Arc::new(
        AuctionStore::new(config.storage_config())
            .with_context(|| format!("opening store at {}", config.db_path))?,
    );

    let (events_tx, _) = broadcast::channel(config.channel_capacity);
    let engine = Arc::new(
        AuctionEngine::new(Arc::clone(&store), config.engine_config())?
            .with_hook(Arc::new(BroadcastHook::new(events_tx.clone()))),
    );

    // Settle anything that expired while we were down, then keep ticking
    engine.restore_timer().await;
    let timer_task = tokio::spawn(Arc::clone(&engine).run_timer());

    let state = ServerState::new(Arc::clone(&engine), store, events_tx)
        .with_admin_token(config.admin_token.clone());
    let app = create_app(state);

    let addr = config.server_config().bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Auction server listening on {}. Press Ctrl+C to stop.", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    timer_task.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}
