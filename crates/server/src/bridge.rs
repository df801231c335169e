//! Wire messages exchanged with WebSocket clients.
//!
//! ```text
//! Engine hooks ──── ServerEvent ────▶ every connection (broadcast)
//! Bidder socket ─── ClientMessage ──▶ place_bid
//! Bidder socket ◀── ServerEvent::BidResult ── (that connection only)
//! ```
//!
//! Every outbound message is a JSON object with a `type` field.

use engine::{BidAccepted, EngineError};
use serde::{Deserialize, Serialize};
use types::{AuctionSnapshot, BidPlaced, LotResolved};

/// Outbound message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full state after a committed change.
    Snapshot(AuctionSnapshot),
    BidPlaced(BidPlaced),
    LotResolved(LotResolved),
    /// Reply to a bid sent on this connection.
    BidResult(BidResult),
    /// Protocol or authorization problem on this connection.
    Error { message: String },
}

/// Inbound message from a bidder connection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// New absolute high bid.
    Bid { amount: f64 },
}

/// Outcome of one bid, as shown to the bidder who placed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidResult {
    pub accepted: bool,
    pub new_high_bid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Whether retrying against fresh state may succeed.
    pub retry: bool,
}

impl BidResult {
    pub fn accepted(bid: &BidAccepted) -> Self {
        Self {
            accepted: true,
            new_high_bid: Some(bid.amount.to_float()),
            reason: None,
            retry: false,
        }
    }

    pub fn rejected(reason: impl Into<String>, retry: bool) -> Self {
        Self {
            accepted: false,
            new_high_bid: None,
            reason: Some(reason.into()),
            retry,
        }
    }
}

impl From<&Result<BidAccepted, EngineError>> for BidResult {
    fn from(result: &Result<BidAccepted, EngineError>) -> Self {
        match result {
            Ok(bid) => BidResult::accepted(bid),
            Err(EngineError::Bid(rejection)) => {
                BidResult::rejected(rejection.to_string(), rejection.is_retryable())
            }
            Err(e) => BidResult::rejected(e.to_string(), false),
        }
    }
}
