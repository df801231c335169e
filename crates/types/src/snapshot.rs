//! Wire shapes broadcast to connected observers.
//!
//! Bidders always appear as `{id, name}` objects, never bare ids. A turn
//! without a bid carries `highestBidder: null`.

use crate::auction::{AuctionState, AuctionStatus};
use crate::bidder::Bidder;
use crate::ids::{BidderId, LotId, Timestamp};
use crate::lot::{Lot, LotStatus};
use crate::money::Amount;
use serde::{Deserialize, Serialize};

/// Normalized bidder reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidderRef {
    pub id: BidderId,
    pub name: String,
}

impl BidderRef {
    /// Resolve an id against the roster. Unknown ids keep their code as name.
    pub fn resolve(id: &BidderId, bidders: &[Bidder]) -> Self {
        let name = bidders
            .iter()
            .find(|b| &b.id == id)
            .map(|b| b.name.clone())
            .unwrap_or_else(|| id.0.clone());
        Self {
            id: id.clone(),
            name,
        }
    }
}

impl From<&Bidder> for BidderRef {
    fn from(bidder: &Bidder) -> Self {
        Self {
            id: bidder.id.clone(),
            name: bidder.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotView {
    pub id: LotId,
    pub name: String,
    pub category: String,
    pub tier: u32,
    pub country: String,
    pub overseas: bool,
    pub base_price: f64,
    pub status: LotStatus,
    pub sold_price: Option<f64>,
    pub sold_to: Option<BidderRef>,
}

impl LotView {
    pub fn build(lot: &Lot, bidders: &[Bidder]) -> Self {
        Self {
            id: lot.id,
            name: lot.name.clone(),
            category: lot.category.clone(),
            tier: lot.tier,
            country: lot.country.clone(),
            overseas: lot.overseas,
            base_price: lot.base_price.to_float(),
            status: lot.status,
            sold_price: lot.sold_price.map(Amount::to_float),
            sold_to: lot.sold_to.as_ref().map(|id| BidderRef::resolve(id, bidders)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidView {
    pub bidder: BidderRef,
    pub amount: f64,
    pub placed_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidderView {
    pub id: BidderId,
    pub name: String,
    /// Remaining budget.
    pub budget: f64,
    pub total_spent: f64,
    pub roster_size: u32,
    pub overseas_count: u32,
}

impl From<&Bidder> for BidderView {
    fn from(bidder: &Bidder) -> Self {
        Self {
            id: bidder.id.clone(),
            name: bidder.name.clone(),
            budget: bidder.remaining_budget.to_float(),
            total_spent: bidder.total_spent.to_float(),
            roster_size: bidder.roster_size,
            overseas_count: bidder.overseas_count,
        }
    }
}

/// Full-state snapshot pushed after every committed state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionSnapshot {
    pub status: AuctionStatus,
    pub turn: u64,
    pub current_lot: Option<LotView>,
    pub current_bid: f64,
    pub highest_bidder: Option<BidderRef>,
    pub bid_history: Vec<BidView>,
    pub timer_ends_at: Option<Timestamp>,
    /// Residual clock in milliseconds while paused.
    pub remaining_ms: Option<i64>,
    pub bidders: Vec<BidderView>,
}

impl AuctionSnapshot {
    /// Build the normalized snapshot from store records.
    pub fn build(state: &AuctionState, current_lot: Option<&Lot>, bidders: &[Bidder]) -> Self {
        Self {
            status: state.status,
            turn: state.turn,
            current_lot: current_lot.map(|lot| LotView::build(lot, bidders)),
            current_bid: state.current_bid.to_float(),
            highest_bidder: state
                .highest_bidder
                .as_ref()
                .map(|id| BidderRef::resolve(id, bidders)),
            bid_history: state
                .bid_history
                .iter()
                .map(|entry| BidView {
                    bidder: BidderRef::resolve(&entry.bidder, bidders),
                    amount: entry.amount.to_float(),
                    placed_at: entry.placed_at,
                })
                .collect(),
            timer_ends_at: state.timer_ends_at,
            remaining_ms: state.remaining_time.map(|d| d.num_milliseconds()),
            bidders: bidders.iter().map(BidderView::from).collect(),
        }
    }
}

/// Lightweight notification for an accepted bid (audio cues, tickers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidPlaced {
    pub lot: LotId,
    pub bidder: BidderRef,
    pub amount: f64,
    pub timer_ends_at: Timestamp,
}

/// Outcome of a settled turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolvedOutcome {
    Sold { winner: BidderRef, price: f64 },
    Unsold,
}

/// Notification for a settled turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotResolved {
    pub lot: LotId,
    pub lot_name: String,
    pub outcome: ResolvedOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn roster() -> Vec<Bidder> {
        vec![
            Bidder::new("CSK", "Chennai", Amount::units(100)),
            Bidder::new("MI", "Mumbai", Amount::units(100)),
        ]
    }

    #[test]
    fn test_no_bid_serializes_null_highest_bidder() {
        let state = AuctionState::initial(Duration::seconds(30));
        let snapshot = AuctionSnapshot::build(&state, None, &roster());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["highestBidder"].is_null());
        assert!(json["currentLot"].is_null());
        assert_eq!(json["status"], "WAITING");
        assert_eq!(json["bidders"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_bidders_normalized_to_objects() {
        let bidders = roster();
        let mut state = AuctionState::initial(Duration::seconds(30));
        state.status = AuctionStatus::Active;
        state.current_lot = Some(LotId(1));
        state.current_bid = Amount::units(2);
        state.highest_bidder = Some(BidderId::from("MI"));
        state.bid_history.push(crate::auction::BidEntry {
            bidder: BidderId::from("MI"),
            amount: Amount::units(2),
            placed_at: chrono::Utc::now(),
        });
        let lot = Lot::new(LotId(1), "Opener", 1, Amount::units(2));

        let snapshot = AuctionSnapshot::build(&state, Some(&lot), &bidders);
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["highestBidder"]["id"], "MI");
        assert_eq!(json["highestBidder"]["name"], "Mumbai");
        assert_eq!(json["bidHistory"][0]["bidder"]["name"], "Mumbai");
        assert_eq!(json["currentLot"]["status"], "AVAILABLE");
        assert_eq!(json["currentBid"], 2.0);
    }

    #[test]
    fn test_unknown_bidder_keeps_code_as_name() {
        let reference = BidderRef::resolve(&BidderId::from("XYZ"), &roster());
        assert_eq!(reference.name, "XYZ");
    }

    #[test]
    fn test_resolved_outcome_tagging() {
        let sold = ResolvedOutcome::Sold {
            winner: BidderRef {
                id: BidderId::from("CSK"),
                name: "Chennai".into(),
            },
            price: 2.2,
        };
        let json = serde_json::to_value(&sold).unwrap();
        assert_eq!(json["result"], "SOLD");
        assert_eq!(json["winner"]["id"], "CSK");

        let json = serde_json::to_value(ResolvedOutcome::Unsold).unwrap();
        assert_eq!(json["result"], "UNSOLD");
    }
}
