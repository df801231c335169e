//! Route handlers.
//!
//! - [`health`]: liveness and readiness probes
//! - [`ws`]: authenticated WebSocket stream (snapshots, events, bids)
//! - [`api`]: REST reads, bids and admin controls

pub mod api;
pub mod health;
pub mod ws;
