//! Core types for the auction house.
//!
//! This crate provides the shared records (lots, bidders, the auction state
//! singleton), fixed-point money, the bid increment rule and the wire shapes
//! broadcast to connected observers.

pub mod auction;
pub mod bidder;
pub mod ids;
pub mod lot;
pub mod money;
pub mod rules;
pub mod snapshot;

pub use auction::{AuctionState, AuctionStatus, BidEntry};
pub use bidder::Bidder;
pub use ids::{AMOUNT_SCALE, BidderId, LotId, Timestamp};
pub use lot::{Lot, LotStatus};
pub use money::Amount;
pub use rules::{bid_increment, minimum_next_bid};
pub use snapshot::{
    AuctionSnapshot, BidPlaced, BidView, BidderRef, BidderView, LotResolved, LotView,
    ResolvedOutcome,
};
