//! Admin-driven turn lifecycle.

use chrono::Duration;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, info};
use types::{Amount, AuctionStatus, BidderId, Lot, LotId, LotStatus, Timestamp};

use crate::engine::AuctionEngine;
use crate::error::{EngineError, EngineResult};
use crate::resolution::{NoOpReason, ResolutionOutcome, Trigger};

/// Result of [`AuctionEngine::start_or_advance`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    Started { lot: Lot, deadline: Timestamp },
    /// Nothing left in the pool; the auction is parked in WAITING.
    NoLotsAvailable,
}

fn require(
    status: AuctionStatus,
    action: &'static str,
    ok: impl Fn(AuctionStatus) -> bool,
) -> EngineResult<()> {
    if ok(status) {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition { action, status })
    }
}

impl AuctionEngine {
    /// Bring the next lot onto the block.
    ///
    /// Picks uniformly at random among the AVAILABLE lots of the lowest tier.
    pub async fn start_or_advance(&self) -> EngineResult<AdvanceOutcome> {
        let now = self.now();
        let outcome = self
            .blocking(move |store| {
                store.transaction(|tx| -> EngineResult<AdvanceOutcome> {
                    let state = tx.load_state()?;
                    require(state.status, "advance", AuctionStatus::can_advance)?;

                    let candidates = tx.lowest_tier_available()?;
                    let Some(lot) = candidates.choose(&mut rand::thread_rng()).cloned() else {
                        if !tx.park_waiting(state.current_lot)? {
                            return Err(EngineError::Conflict);
                        }
                        return Ok(AdvanceOutcome::NoLotsAvailable);
                    };

                    let deadline = now + state.bid_duration;
                    if !tx.open_turn(&lot, state.turn, deadline)? {
                        return Err(EngineError::Conflict);
                    }
                    if !tx.transition_lot(lot.id, LotStatus::Available, LotStatus::Live)? {
                        return Err(EngineError::Conflict);
                    }
                    let lot = Lot {
                        status: LotStatus::Live,
                        ..lot
                    };
                    Ok(AdvanceOutcome::Started { lot, deadline })
                })
            })
            .await?;

        match &outcome {
            AdvanceOutcome::Started { lot, deadline } => {
                self.timer.set(*deadline);
                info!(lot = %lot.id, name = %lot.name, tier = lot.tier, %deadline, "lot on the block");
            }
            AdvanceOutcome::NoLotsAvailable => {
                self.timer.clear();
                info!("no lots available, auction waiting");
            }
        }
        self.publish_snapshot().await;
        Ok(outcome)
    }

    /// Stop the clock, keeping the residual time.
    pub async fn pause(&self) -> EngineResult<Duration> {
        let now = self.now();
        let (lot, remaining) = self
            .blocking(move |store| {
                let state = store.load_state()?;
                require(state.status, "pause", |s| s == AuctionStatus::Active)?;
                let lot = state.current_lot.ok_or(EngineError::Conflict)?;
                let remaining = state.time_left(now).unwrap_or(state.bid_duration);
                if !store.pause_turn(lot, remaining)? {
                    return Err(EngineError::Conflict);
                }
                Ok((lot, remaining))
            })
            .await?;

        self.timer.clear();
        info!(%lot, remaining_ms = remaining.num_milliseconds(), "auction paused");
        self.publish_snapshot().await;
        Ok(remaining)
    }

    /// Restart the clock from the residual captured at pause.
    pub async fn resume(&self) -> EngineResult<Timestamp> {
        let now = self.now();
        let (lot, deadline) = self
            .blocking(move |store| {
                let state = store.load_state()?;
                require(state.status, "resume", |s| s == AuctionStatus::Paused)?;
                let lot = state.current_lot.ok_or(EngineError::Conflict)?;
                let deadline = now + state.remaining_time.unwrap_or(state.bid_duration);
                if !store.resume_turn(lot, deadline)? {
                    return Err(EngineError::Conflict);
                }
                Ok((lot, deadline))
            })
            .await?;

        self.timer.set(deadline);
        info!(%lot, %deadline, "auction resumed");
        self.publish_snapshot().await;
        Ok(deadline)
    }

    /// Put `seconds` on the clock.
    ///
    /// A running turn gets a new deadline; a paused turn gets a new residual.
    pub async fn reset_timer(&self, seconds: u32) -> EngineResult<()> {
        let now = self.now();
        let window = Duration::seconds(i64::from(seconds));
        let deadline = self
            .blocking(move |store| {
                let state = store.load_state()?;
                let lot = state.current_lot.ok_or(EngineError::InvalidTransition {
                    action: "reset the timer",
                    status: state.status,
                })?;
                match state.status {
                    AuctionStatus::Active => {
                        let deadline = now + window;
                        if !store.set_deadline(lot, deadline)? {
                            return Err(EngineError::Conflict);
                        }
                        Ok(Some(deadline))
                    }
                    AuctionStatus::Paused => {
                        if !store.set_remaining(lot, window)? {
                            return Err(EngineError::Conflict);
                        }
                        Ok(None)
                    }
                    status => Err(EngineError::InvalidTransition {
                        action: "reset the timer",
                        status,
                    }),
                }
            })
            .await?;

        if let Some(deadline) = deadline {
            self.timer.set(deadline);
        }
        info!(seconds, "timer reset");
        self.publish_snapshot().await;
        Ok(())
    }

    /// End the current turn now with the admin's outcome.
    ///
    /// `winner = None` closes the turn unsold. An explicit winner must exist
    /// and be able to take the lot at `amount`. The turn is stepped to
    /// RESOLVING and then settled like any other.
    pub async fn force_end(
        &self,
        winner: Option<BidderId>,
        amount: Amount,
    ) -> EngineResult<ResolutionOutcome> {
        let roster_cap = self.config.roster_cap;
        let overseas_cap = self.config.overseas_cap;
        let claimed = self
            .blocking(move |store| {
                let state = store.load_state()?;
                let lot_id = match state.current_lot {
                    Some(lot) if state.status.holds_turn() => lot,
                    _ => return Ok(None),
                };

                if let Some(id) = &winner {
                    let bidder = store
                        .load_bidder(id)?
                        .ok_or_else(|| EngineError::UnknownBidder(id.clone()))?;
                    let lot = store
                        .load_lot(lot_id)?
                        .ok_or(EngineError::UnknownLot(lot_id))?;
                    if !amount.is_positive() {
                        return Err(EngineError::InvalidForceEnd(
                            "amount must be positive".into(),
                        ));
                    }
                    if !bidder.can_afford(amount) {
                        return Err(EngineError::InvalidForceEnd(format!(
                            "{id} has {} remaining, cannot pay {amount}",
                            bidder.remaining_budget
                        )));
                    }
                    if !bidder.has_roster_room(roster_cap) {
                        return Err(EngineError::InvalidForceEnd(format!("{id} roster is full")));
                    }
                    if lot.overseas && !bidder.has_overseas_room(overseas_cap) {
                        return Err(EngineError::InvalidForceEnd(format!(
                            "{id} overseas quota is full"
                        )));
                    }
                }

                let price = if winner.is_some() { amount } else { state.current_bid };
                Ok(Some(store.claim_for_resolution(
                    lot_id,
                    state.turn,
                    winner.as_ref(),
                    price,
                )?))
            })
            .await?;

        match claimed {
            None => {
                debug!("force-end with no turn on the block");
                return Ok(ResolutionOutcome::NoOp(NoOpReason::NoActiveTurn));
            }
            Some(false) => {
                debug!("force-end lost the turn to a concurrent writer");
                return Ok(ResolutionOutcome::NoOp(NoOpReason::Superseded));
            }
            Some(true) => {}
        }

        self.resync_timer().await;
        self.resolve_turn(Trigger::Manual).await
    }

    /// Return an UNSOLD lot to the pool. The auction state is untouched.
    pub async fn requeue(&self, lot: LotId) -> EngineResult<Lot> {
        let requeued = self
            .blocking(move |store| {
                let current = store.load_lot(lot)?.ok_or(EngineError::UnknownLot(lot))?;
                if !store.requeue_lot(lot)? {
                    // Re-read so the error names the status that blocked us
                    let status = store
                        .load_lot(lot)?
                        .map_or(current.status, |l| l.status);
                    return Err(EngineError::LotNotUnsold { lot, status });
                }
                Ok(Lot {
                    status: LotStatus::Available,
                    sold_price: None,
                    sold_to: None,
                    ..current
                })
            })
            .await?;

        info!(lot = %requeued.id, name = %requeued.name, "lot requeued");
        self.publish_snapshot().await;
        Ok(requeued)
    }
}
