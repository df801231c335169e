//! Server crate: Axum HTTP and WebSocket surface for the auction engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐         ┌─────────────────────────┐
//! │  AuctionEngine           │         │  Axum handlers          │
//! │                          │         │                         │
//! │  commit (bid/settle/…)   │────────>│ broadcast to every WS   │
//! │  hook.on_snapshot()      │ channel │ bid/admin REST routes   │
//! │                          │<────────│ place_bid, advance, …   │
//! └──────────────────────────┘  calls  └─────────────────────────┘
//! ```
//!
//! The engine owns the auction; the server authenticates callers, forwards
//! their requests and fans committed state out to connected observers.
//!
//! # Modules
//!
//! - [`app`]: router, middleware and bind configuration
//! - [`state`]: shared handler state (engine, sessions, channel, metrics)
//! - [`error`]: HTTP mapping of engine errors
//! - [`routes`]: health, WebSocket and REST handlers
//! - [`bridge`]: wire messages exchanged with WebSocket clients
//! - [`hooks`]: the engine hook that feeds the broadcast channel

pub mod app;
pub mod bridge;
pub mod error;
pub mod hooks;
pub mod routes;
pub mod state;

pub use app::{ServerConfig, create_app};
pub use bridge::{BidResult, ClientMessage, ServerEvent};
pub use error::AppError;
pub use hooks::BroadcastHook;
pub use state::{ServerMetrics, ServerState};
