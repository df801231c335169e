//! Observer hooks for committed state changes.
//!
//! The engine calls hooks only after a write has committed, so observers
//! never see a half-settled turn.

use types::{AuctionSnapshot, BidPlaced, LotResolved};

/// Receives engine events. All methods default to no-ops.
pub trait AuctionHook: Send + Sync {
    fn name(&self) -> &str;

    /// Full state after any committed change.
    fn on_snapshot(&self, _snapshot: &AuctionSnapshot) {}

    /// Lightweight notice of an accepted bid.
    fn on_bid_placed(&self, _event: &BidPlaced) {}

    /// Outcome of a settled turn.
    fn on_lot_resolved(&self, _event: &LotResolved) {}
}
