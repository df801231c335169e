//! Bid acceptance.
//!
//! A bid is validated against one read of the auction state and committed
//! with that read as the precondition. Under contention the first bid to
//! durably commit wins; arrival order is not preserved.

use serde::Serialize;
use tracing::{debug, info};
use types::{
    Amount, AuctionState, AuctionStatus, BidPlaced, Bidder, BidderId, BidderRef, Lot, LotId,
    Timestamp,
};

use crate::config::EngineConfig;
use crate::engine::AuctionEngine;
use crate::error::{BidRejection, EngineError, EngineResult};
use storage::BidCommit;

/// A committed bid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidAccepted {
    pub lot: LotId,
    pub bidder: BidderId,
    /// The new high bid.
    pub amount: Amount,
    pub timer_ends_at: Timestamp,
}

/// Check a bid against one consistent read, in rejection order.
///
/// `lot` is the lot on the block (`None` if the state names none). Bidding
/// closes at `timer_ends_at`, so a bid at or after the deadline is refused.
pub fn validate_bid(
    state: &AuctionState,
    lot: Option<&Lot>,
    bidder: &Bidder,
    amount: Amount,
    config: &EngineConfig,
    now: Timestamp,
) -> Result<(), BidRejection> {
    let lot = match lot {
        Some(lot) if state.status == AuctionStatus::Active && state.current_lot == Some(lot.id) => {
            lot
        }
        _ => return Err(BidRejection::NoActiveAuction),
    };
    // The deadline has passed but the timer has not settled the turn yet
    if state.is_expired(now) {
        return Err(BidRejection::BiddingClosed);
    }

    if !bidder.has_roster_room(config.roster_cap) {
        return Err(BidRejection::RosterFull);
    }
    if lot.overseas && !bidder.has_overseas_room(config.overseas_cap) {
        return Err(BidRejection::OverseasQuotaFull);
    }
    if state.highest_bidder.as_ref() == Some(&bidder.id) {
        return Err(BidRejection::AlreadyHighestBidder);
    }
    if !amount.is_positive() {
        return Err(BidRejection::NonPositiveAmount);
    }

    let minimum = state.minimum_bid(lot.base_price);
    if amount < minimum {
        return Err(BidRejection::BelowMinimum { minimum });
    }
    if !bidder.can_afford(amount) {
        return Err(BidRejection::InsufficientBudget {
            remaining: bidder.remaining_budget,
        });
    }
    Ok(())
}

impl AuctionEngine {
    /// Validate and commit a bid from an authenticated bidder.
    pub async fn place_bid(&self, bidder: &BidderId, amount: Amount) -> EngineResult<BidAccepted> {
        let commit = self.prepare_bid(bidder, amount).await?;
        self.commit_bid(commit).await
    }

    /// Validate a bid and return the conditional write that would apply it.
    ///
    /// Nothing is written. The returned commit carries the state the bid was
    /// validated against.
    pub async fn prepare_bid(&self, bidder: &BidderId, amount: Amount) -> EngineResult<BidCommit> {
        let id = bidder.clone();
        let (state, lot, bidder) = self
            .blocking(move |store| {
                let state = store.load_state()?;
                let lot = match state.current_lot {
                    Some(lot) => store.load_lot(lot)?,
                    None => None,
                };
                let bidder = store
                    .load_bidder(&id)?
                    .ok_or_else(|| EngineError::UnknownBidder(id.clone()))?;
                Ok((state, lot, bidder))
            })
            .await?;

        let now = self.now();
        if let Err(rejection) =
            validate_bid(&state, lot.as_ref(), &bidder, amount, &self.config, now)
        {
            debug!(bidder = %bidder.id, %amount, reason = %rejection, "bid rejected");
            return Err(rejection.into());
        }

        Ok(BidCommit {
            // validate_bid guarantees a lot on the block
            lot: state.current_lot.ok_or(BidRejection::NoActiveAuction)?,
            turn: state.turn,
            expected_bid: state.current_bid,
            expected_leader: state.highest_bidder,
            bidder: bidder.id,
            amount,
            placed_at: now,
            deadline: now + state.bid_duration,
        })
    }

    /// Apply a prepared bid if its precondition still holds.
    ///
    /// On success the clock is extended and observers are notified; a lost
    /// race is a [`BidRejection::ConcurrentUpdate`].
    pub async fn commit_bid(&self, commit: BidCommit) -> EngineResult<BidAccepted> {
        let write = commit.clone();
        let applied = self
            .blocking(move |store| Ok(store.commit_bid(&write)?))
            .await?;
        if !applied {
            debug!(bidder = %commit.bidder, amount = %commit.amount, "bid lost race");
            return Err(BidRejection::ConcurrentUpdate.into());
        }

        self.timer.set(commit.deadline);
        info!(
            lot = %commit.lot,
            bidder = %commit.bidder,
            amount = %commit.amount,
            "bid accepted"
        );

        let snapshot = self.publish_snapshot().await;
        let bidder_ref = snapshot
            .as_ref()
            .and_then(|s| s.bidders.iter().find(|b| b.id == commit.bidder))
            .map(|b| BidderRef {
                id: b.id.clone(),
                name: b.name.clone(),
            })
            .unwrap_or_else(|| BidderRef {
                id: commit.bidder.clone(),
                name: commit.bidder.0.clone(),
            });
        self.publish_bid(&BidPlaced {
            lot: commit.lot,
            bidder: bidder_ref,
            amount: commit.amount.to_float(),
            timer_ends_at: commit.deadline,
        });

        Ok(BidAccepted {
            lot: commit.lot,
            bidder: commit.bidder,
            amount: commit.amount,
            timer_ends_at: commit.deadline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn active_state(lot: &Lot) -> AuctionState {
        let mut state = AuctionState::initial(Duration::seconds(30));
        state.status = AuctionStatus::Active;
        state.current_lot = Some(lot.id);
        state.turn = 1;
        state.current_bid = lot.base_price;
        state.timer_ends_at = Some(Utc::now() + Duration::seconds(30));
        state
    }

    fn lot() -> Lot {
        Lot::new(LotId(1), "Opener", 1, Amount::units(2))
    }

    fn bidder(code: &str, budget: i64) -> Bidder {
        Bidder::new(code, code, Amount::units(budget))
    }

    fn config() -> EngineConfig {
        EngineConfig::default().roster_cap(2).overseas_cap(1)
    }

    #[test]
    fn test_opening_bid_at_base_price() {
        let lot = lot();
        let state = active_state(&lot);
        assert_eq!(
            validate_bid(
                &state,
                Some(&lot),
                &bidder("CSK", 10),
                Amount::units(2),
                &config(),
                Utc::now()
            ),
            Ok(())
        );
        assert_eq!(
            validate_bid(
                &state,
                Some(&lot),
                &bidder("CSK", 10),
                Amount::from_float(1.95),
                &config(),
                Utc::now()
            ),
            Err(BidRejection::BelowMinimum {
                minimum: Amount::units(2)
            })
        );
    }

    #[test]
    fn test_following_bid_needs_increment() {
        let lot = lot();
        let mut state = active_state(&lot);
        state.highest_bidder = Some(BidderId::from("MI"));

        let csk = bidder("CSK", 10);
        assert!(matches!(
            validate_bid(
                &state,
                Some(&lot),
                &csk,
                Amount::from_float(2.15),
                &config(),
                Utc::now()
            ),
            Err(BidRejection::BelowMinimum { .. })
        ));
        assert_eq!(
            validate_bid(
                &state,
                Some(&lot),
                &csk,
                Amount::from_float(2.2),
                &config(),
                Utc::now()
            ),
            Ok(())
        );
    }

    #[test]
    fn test_no_active_auction() {
        let lot = lot();
        let mut state = active_state(&lot);
        state.status = AuctionStatus::Paused;
        assert_eq!(
            validate_bid(
                &state,
                Some(&lot),
                &bidder("CSK", 10),
                Amount::units(3),
                &config(),
                Utc::now()
            ),
            Err(BidRejection::NoActiveAuction)
        );
        assert_eq!(
            validate_bid(
                &state,
                None,
                &bidder("CSK", 10),
                Amount::units(3),
                &config(),
                Utc::now()
            ),
            Err(BidRejection::NoActiveAuction)
        );
    }

    #[test]
    fn test_rejection_order() {
        let lot = lot().with_country("England", true);
        let mut state = active_state(&lot);
        state.highest_bidder = Some(BidderId::from("CSK"));

        let mut full = bidder("CSK", 1);
        full.roster_size = 2;
        full.overseas_count = 1;
        // Roster beats every later reason
        assert_eq!(
            validate_bid(
                &state,
                Some(&lot),
                &full,
                Amount::ZERO,
                &config(),
                Utc::now()
            ),
            Err(BidRejection::RosterFull)
        );

        full.roster_size = 1;
        assert_eq!(
            validate_bid(
                &state,
                Some(&lot),
                &full,
                Amount::ZERO,
                &config(),
                Utc::now()
            ),
            Err(BidRejection::OverseasQuotaFull)
        );

        full.overseas_count = 0;
        assert_eq!(
            validate_bid(
                &state,
                Some(&lot),
                &full,
                Amount::ZERO,
                &config(),
                Utc::now()
            ),
            Err(BidRejection::AlreadyHighestBidder)
        );

        state.highest_bidder = Some(BidderId::from("MI"));
        assert_eq!(
            validate_bid(
                &state,
                Some(&lot),
                &full,
                Amount::ZERO,
                &config(),
                Utc::now()
            ),
            Err(BidRejection::NonPositiveAmount)
        );
        assert_eq!(
            validate_bid(
                &state,
                Some(&lot),
                &full,
                Amount::units(3),
                &config(),
                Utc::now()
            ),
            Err(BidRejection::InsufficientBudget {
                remaining: Amount::units(1)
            })
        );
    }

    #[test]
    fn test_self_outbid_rejected_regardless_of_amount() {
        let lot = lot();
        let mut state = active_state(&lot);
        state.highest_bidder = Some(BidderId::from("CSK"));
        for amount in [2.2, 5.0, 9.99] {
            assert_eq!(
                validate_bid(
                    &state,
                    Some(&lot),
                    &bidder("CSK", 10),
                    Amount::from_float(amount),
                    &config(),
                    Utc::now()
                ),
                Err(BidRejection::AlreadyHighestBidder)
            );
        }
    }

    #[test]
    fn test_bid_at_or_after_deadline_is_closed() {
        let lot = lot();
        let mut state = active_state(&lot);
        let now = Utc::now();
        let csk = bidder("CSK", 10);

        state.timer_ends_at = Some(now - Duration::milliseconds(800));
        assert_eq!(
            validate_bid(&state, Some(&lot), &csk, Amount::units(3), &config(), now),
            Err(BidRejection::BiddingClosed)
        );

        // The deadline itself is already closed
        state.timer_ends_at = Some(now);
        assert_eq!(
            validate_bid(&state, Some(&lot), &csk, Amount::units(3), &config(), now),
            Err(BidRejection::BiddingClosed)
        );

        state.timer_ends_at = Some(now + Duration::milliseconds(1));
        assert_eq!(
            validate_bid(&state, Some(&lot), &csk, Amount::units(3), &config(), now),
            Ok(())
        );
    }

    #[test]
    fn test_domestic_lot_ignores_overseas_quota() {
        let lot = lot();
        let state = active_state(&lot);
        let mut csk = bidder("CSK", 10);
        csk.overseas_count = 1;
        assert_eq!(
            validate_bid(
                &state,
                Some(&lot),
                &csk,
                Amount::units(2),
                &config(),
                Utc::now()
            ),
            Ok(())
        );
    }
}
