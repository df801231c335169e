//! The auction state singleton.
//!
//! Owns "whose turn it is" and "what the clock says". Reset between turns,
//! never recreated.

use crate::ids::{BidderId, LotId, Timestamp};
use crate::money::Amount;
use crate::rules::minimum_next_bid;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of the auction state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionStatus {
    /// No lot on the block.
    Waiting,
    /// Bidding open, clock running.
    Active,
    /// Bidding open, clock stopped with a residual.
    Paused,
    /// An admin force-end has claimed the turn.
    Resolving,
    Sold,
    Unsold,
}

impl AuctionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AuctionStatus::Waiting => "WAITING",
            AuctionStatus::Active => "ACTIVE",
            AuctionStatus::Paused => "PAUSED",
            AuctionStatus::Resolving => "RESOLVING",
            AuctionStatus::Sold => "SOLD",
            AuctionStatus::Unsold => "UNSOLD",
        }
    }

    /// States from which a turn can be settled.
    pub fn is_settleable(self) -> bool {
        matches!(self, AuctionStatus::Active | AuctionStatus::Resolving)
    }

    /// States from which the next lot can be brought up.
    pub fn can_advance(self) -> bool {
        matches!(
            self,
            AuctionStatus::Waiting | AuctionStatus::Sold | AuctionStatus::Unsold
        )
    }

    /// States in which a lot is on the block and not yet settled.
    pub fn holds_turn(self) -> bool {
        matches!(
            self,
            AuctionStatus::Active | AuctionStatus::Paused | AuctionStatus::Resolving
        )
    }
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuctionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(AuctionStatus::Waiting),
            "ACTIVE" => Ok(AuctionStatus::Active),
            "PAUSED" => Ok(AuctionStatus::Paused),
            "RESOLVING" => Ok(AuctionStatus::Resolving),
            "SOLD" => Ok(AuctionStatus::Sold),
            "UNSOLD" => Ok(AuctionStatus::Unsold),
            other => Err(format!("unknown auction status: {other}")),
        }
    }
}

/// One accepted bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidEntry {
    pub bidder: BidderId,
    pub amount: Amount,
    pub placed_at: Timestamp,
}

/// The auction singleton as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct AuctionState {
    pub status: AuctionStatus,
    pub current_lot: Option<LotId>,
    /// Incremented every time a lot is brought up; windows the bid history.
    pub turn: u64,
    pub current_bid: Amount,
    pub highest_bidder: Option<BidderId>,
    /// Bids of the current turn, most recent first.
    pub bid_history: Vec<BidEntry>,
    pub timer_ends_at: Option<Timestamp>,
    /// Length of the bidding window, restarted by each accepted bid.
    pub bid_duration: Duration,
    /// Residual clock captured on pause.
    pub remaining_time: Option<Duration>,
}

impl AuctionState {
    /// Fresh singleton: WAITING, nothing on the block.
    pub fn initial(bid_duration: Duration) -> Self {
        Self {
            status: AuctionStatus::Waiting,
            current_lot: None,
            turn: 0,
            current_bid: Amount::ZERO,
            highest_bidder: None,
            bid_history: Vec::new(),
            timer_ends_at: None,
            bid_duration,
            remaining_time: None,
        }
    }

    pub fn has_bid(&self) -> bool {
        self.highest_bidder.is_some()
    }

    /// Lowest bid the current turn accepts.
    pub fn minimum_bid(&self, base_price: Amount) -> Amount {
        minimum_next_bid(base_price, self.current_bid, self.has_bid())
    }

    /// Whether the persisted deadline has passed at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.timer_ends_at.is_some_and(|deadline| deadline <= now)
    }

    /// Time left on the clock at `now` (zero once expired).
    pub fn time_left(&self, now: Timestamp) -> Option<Duration> {
        self.timer_ends_at
            .map(|deadline| (deadline - now).max(Duration::zero()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_initial_state() {
        let state = AuctionState::initial(Duration::seconds(30));
        assert_eq!(state.status, AuctionStatus::Waiting);
        assert!(state.current_lot.is_none());
        assert!(state.timer_ends_at.is_none());
        assert!(!state.has_bid());
    }

    #[test]
    fn test_minimum_bid_uses_base_price_until_first_bid() {
        let mut state = AuctionState::initial(Duration::seconds(30));
        state.current_bid = Amount::units(2);
        assert_eq!(state.minimum_bid(Amount::units(2)), Amount::units(2));

        state.highest_bidder = Some(BidderId::from("CSK"));
        assert_eq!(state.minimum_bid(Amount::units(2)), Amount::from_float(2.2));
    }

    #[test]
    fn test_expiry_and_time_left() {
        let now = Utc::now();
        let mut state = AuctionState::initial(Duration::seconds(30));
        assert!(!state.is_expired(now));

        state.timer_ends_at = Some(now - Duration::seconds(1));
        assert!(state.is_expired(now));
        assert_eq!(state.time_left(now), Some(Duration::zero()));

        state.timer_ends_at = Some(now + Duration::seconds(10));
        assert!(!state.is_expired(now));
        assert_eq!(state.time_left(now), Some(Duration::seconds(10)));
    }

    #[test]
    fn test_status_groups() {
        assert!(AuctionStatus::Resolving.is_settleable());
        assert!(!AuctionStatus::Paused.is_settleable());
        assert!(AuctionStatus::Unsold.can_advance());
        assert!(!AuctionStatus::Active.can_advance());
        assert!(AuctionStatus::Paused.holds_turn());
        assert_eq!("PAUSED".parse::<AuctionStatus>(), Ok(AuctionStatus::Paused));
    }
}
