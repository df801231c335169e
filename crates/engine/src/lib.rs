//! Auction resolution engine.
//!
//! Drives the per-lot turn lifecycle on top of the persistent store:
//!
//! ```text
//!  admin ──► machine (advance/pause/resume/reset/force-end/requeue) ─┐
//!  bidder ─► bidding (validate → conditional commit) ────────────────┤──► store
//!  timer ──► check (expiry → resolve, re-entrancy guarded) ──────────┘
//!                                   │
//!                                   └──► hooks (snapshot, bid placed, lot resolved)
//! ```
//!
//! There is no in-process lock around the auction state. Every write that
//! depends on an earlier read re-asserts that read as a precondition in the
//! store; a writer whose precondition fails has lost the race. Settlement runs
//! in a single store transaction so the state, the lot and the winning bidder
//! move together or not at all.
//!
//! The only process-local mutable state is the [`AuctionTimer`] deadline,
//! a cache that [`AuctionEngine::restore_timer`] rebuilds from the store.

mod bidding;
mod config;
mod engine;
mod error;
mod hooks;
mod machine;
mod resolution;
mod timer;

pub use bidding::{BidAccepted, validate_bid};
pub use config::{EngineConfig, IntegrityPolicy};
pub use engine::AuctionEngine;
pub use error::{BidRejection, EngineError, EngineResult, IntegrityViolation};
pub use hooks::AuctionHook;
pub use machine::AdvanceOutcome;
pub use resolution::{NoOpReason, ResolutionOutcome, Trigger};
pub use timer::AuctionTimer;

// Re-export the store handle callers need to build an engine
pub use storage::{AuctionStore, BidCommit};
