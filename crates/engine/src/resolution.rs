//! Turn settlement.
//!
//! One algorithm serves both the timer and the admin. Whichever attempt
//! closes the turn first settles it; every other attempt for the same turn
//! is a silent no-op.

use serde::Serialize;
use tracing::{debug, error, info, warn};
use types::{
    Amount, AuctionStatus, BidderId, BidderRef, LotId, LotResolved, LotStatus, ResolvedOutcome,
    Timestamp,
};

use crate::config::{EngineConfig, IntegrityPolicy};
use crate::engine::AuctionEngine;
use crate::error::{EngineError, EngineResult, IntegrityViolation};
use storage::StoreTx;

/// What started a resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The bidding window expired.
    Timer,
    /// An admin force-end stepped the turn to RESOLVING.
    Manual,
}

/// Why a resolution attempt did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NoOpReason {
    /// Timer trigger, but no deadline is persisted (already resolved or
    /// claimed by an admin).
    NoDeadline,
    /// Timer trigger, but a bid moved the deadline.
    ClockRunning { deadline: Timestamp },
    /// Nothing on the block, or the turn is not in a settleable state.
    NoActiveTurn,
    /// A concurrent resolution closed the turn first.
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Sold {
        lot: LotId,
        lot_name: String,
        winner: BidderRef,
        price: Amount,
    },
    Unsold {
        lot: LotId,
        lot_name: String,
    },
    NoOp(NoOpReason),
}

impl ResolutionOutcome {
    /// Whether this attempt changed a lot.
    pub fn is_settlement(&self) -> bool {
        !matches!(self, ResolutionOutcome::NoOp(_))
    }

    fn event(&self) -> Option<LotResolved> {
        match self {
            ResolutionOutcome::Sold {
                lot,
                lot_name,
                winner,
                price,
            } => Some(LotResolved {
                lot: *lot,
                lot_name: lot_name.clone(),
                outcome: ResolvedOutcome::Sold {
                    winner: winner.clone(),
                    price: price.to_float(),
                },
            }),
            ResolutionOutcome::Unsold { lot, lot_name } => Some(LotResolved {
                lot: *lot,
                lot_name: lot_name.clone(),
                outcome: ResolvedOutcome::Unsold,
            }),
            ResolutionOutcome::NoOp(_) => None,
        }
    }
}

/// The settlement transaction body.
///
/// Returns `Ok(NoOp)` without writing for every idempotency exit. Returns
/// `Err` (rolling the transaction back) if any write after the turn was
/// closed misses its precondition.
fn settle(
    tx: &StoreTx<'_>,
    trigger: Trigger,
    now: Timestamp,
    config: &EngineConfig,
) -> EngineResult<ResolutionOutcome> {
    let state = tx.load_state()?;

    if trigger == Trigger::Timer {
        match state.timer_ends_at {
            None => return Ok(ResolutionOutcome::NoOp(NoOpReason::NoDeadline)),
            Some(deadline) if deadline > now => {
                return Ok(ResolutionOutcome::NoOp(NoOpReason::ClockRunning { deadline }));
            }
            Some(_) => {}
        }
    }

    let lot_id = match state.current_lot {
        Some(lot) if state.status.is_settleable() => lot,
        _ => return Ok(ResolutionOutcome::NoOp(NoOpReason::NoActiveTurn)),
    };
    // A manual attempt settles only the turn its claim stepped to RESOLVING
    if trigger == Trigger::Manual && state.status != AuctionStatus::Resolving {
        return Ok(ResolutionOutcome::NoOp(NoOpReason::Superseded));
    }
    let lot = tx
        .load_lot(lot_id)?
        .ok_or(IntegrityViolation::MissingLot(lot_id))?;

    let closing = if state.highest_bidder.is_some() {
        AuctionStatus::Sold
    } else {
        AuctionStatus::Unsold
    };
    if !tx.close_turn(lot_id, closing)? {
        return Ok(ResolutionOutcome::NoOp(NoOpReason::Superseded));
    }

    let Some(winner_id) = state.highest_bidder else {
        if !tx.transition_lot(lot_id, LotStatus::Live, LotStatus::Unsold)? {
            return Err(IntegrityViolation::LotNotLive(lot_id).into());
        }
        return Ok(ResolutionOutcome::Unsold {
            lot: lot_id,
            lot_name: lot.name,
        });
    };

    let price = state.current_bid;
    let winner = tx
        .load_bidder(&winner_id)?
        .ok_or_else(|| IntegrityViolation::UnknownWinner(winner_id.clone()))?;
    check_winner(&winner_id, &winner, price, lot.overseas, config)?;

    if !tx.debit_winner(&winner_id, lot_id, price, lot.overseas)? {
        return Err(IntegrityViolation::InsufficientBudget {
            bidder: winner_id,
            price,
            remaining: winner.remaining_budget,
        }
        .into());
    }
    if !tx.mark_lot_sold(lot_id, price, &winner_id)? {
        return Err(IntegrityViolation::LotNotLive(lot_id).into());
    }

    Ok(ResolutionOutcome::Sold {
        lot: lot_id,
        lot_name: lot.name,
        winner: BidderRef::from(&winner),
        price,
    })
}

/// Re-verify, at settlement, what bid validation already checked.
fn check_winner(
    id: &BidderId,
    winner: &types::Bidder,
    price: Amount,
    overseas: bool,
    config: &EngineConfig,
) -> Result<(), IntegrityViolation> {
    if !winner.can_afford(price) {
        return Err(IntegrityViolation::InsufficientBudget {
            bidder: id.clone(),
            price,
            remaining: winner.remaining_budget,
        });
    }
    if !winner.has_roster_room(config.roster_cap) {
        return Err(IntegrityViolation::RosterFull { bidder: id.clone() });
    }
    if overseas && !winner.has_overseas_room(config.overseas_cap) {
        return Err(IntegrityViolation::OverseasQuotaFull { bidder: id.clone() });
    }
    Ok(())
}

impl AuctionEngine {
    /// Settle the current turn exactly once.
    ///
    /// Idempotency exits return `Ok(NoOp)`. Integrity failures roll back,
    /// are logged at error level and returned; they are never retried.
    pub async fn resolve_turn(&self, trigger: Trigger) -> EngineResult<ResolutionOutcome> {
        let now = self.now();
        let config = self.config.clone();
        let result = self
            .blocking(move |store| {
                store.transaction(|tx| settle(tx, trigger, now, &config))
            })
            .await;

        match result {
            Ok(ResolutionOutcome::NoOp(reason)) => {
                debug!(?trigger, ?reason, "resolution skipped");
                if let NoOpReason::ClockRunning { deadline } = reason {
                    self.timer.set(deadline);
                }
                Ok(ResolutionOutcome::NoOp(reason))
            }
            Ok(outcome) => {
                self.resync_timer().await;
                match &outcome {
                    ResolutionOutcome::Sold {
                        lot, winner, price, ..
                    } => info!(%lot, winner = %winner.id, %price, ?trigger, "lot sold"),
                    ResolutionOutcome::Unsold { lot, .. } => info!(%lot, ?trigger, "lot unsold"),
                    ResolutionOutcome::NoOp(_) => {}
                }
                self.publish_snapshot().await;
                if let Some(event) = outcome.event() {
                    self.publish_resolution(&event);
                }
                Ok(outcome)
            }
            Err(EngineError::Integrity(violation)) => {
                error!(
                    ?trigger,
                    %violation,
                    policy = ?self.config.integrity_policy,
                    "settlement aborted: integrity violation, operator attention required"
                );
                if self.config.integrity_policy == IntegrityPolicy::ReturnLot {
                    self.return_lot_after_failure().await;
                }
                Err(EngineError::Integrity(violation))
            }
            Err(e) => {
                error!(?trigger, error = %e, "settlement failed; no changes applied");
                Err(e)
            }
        }
    }

    /// Put the lot on the block back in the pool and park the auction.
    async fn return_lot_after_failure(&self) {
        let result = self
            .blocking(|store| {
                store.transaction(|tx| -> EngineResult<Option<LotId>> {
                    let state = tx.load_state()?;
                    let Some(lot) = state.current_lot.filter(|_| state.status.holds_turn()) else {
                        return Ok(None);
                    };
                    if !tx.transition_lot(lot, LotStatus::Live, LotStatus::Available)? {
                        return Err(IntegrityViolation::LotNotLive(lot).into());
                    }
                    if !tx.park_waiting(Some(lot))? {
                        return Err(EngineError::Conflict);
                    }
                    Ok(Some(lot))
                })
            })
            .await;

        match result {
            Ok(Some(lot)) => {
                self.resync_timer().await;
                warn!(%lot, "lot returned to pool after failed settlement");
                self.publish_snapshot().await;
            }
            Ok(None) => debug!("no turn to return after failed settlement"),
            Err(e) => error!(error = %e, "failed to return lot after failed settlement"),
        }
    }
}
