//! Engine error types.
//!
//! Validation rejections and concurrency losses are ordinary outcomes of
//! bidding and are kept apart from integrity failures, which signal that a
//! settlement would have broken a budget or roster invariant.

use thiserror::Error;
use types::{Amount, AuctionStatus, BidderId, LotId, LotStatus};

/// Why a bid was not accepted. The Display string is shown to the bidder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BidRejection {
    #[error("no active auction")]
    NoActiveAuction,

    /// The deadline passed and the turn is waiting to be settled.
    #[error("bidding window has closed")]
    BiddingClosed,

    #[error("roster full")]
    RosterFull,

    #[error("overseas quota full")]
    OverseasQuotaFull,

    #[error("you already hold the highest bid")]
    AlreadyHighestBidder,

    #[error("bid must be a positive amount")]
    NonPositiveAmount,

    #[error("bid too low: minimum is {minimum}")]
    BelowMinimum { minimum: Amount },

    #[error("insufficient budget: {remaining} remaining")]
    InsufficientBudget { remaining: Amount },

    /// The turn changed between validation and commit.
    #[error("bid rejected, state changed concurrently; retry")]
    ConcurrentUpdate,
}

impl BidRejection {
    /// Whether the bidder should retry against fresh state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BidRejection::ConcurrentUpdate)
    }
}

/// A settlement that would break a bidder or lot invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    #[error("{bidder} cannot pay {price}: {remaining} remaining")]
    InsufficientBudget {
        bidder: BidderId,
        price: Amount,
        remaining: Amount,
    },

    #[error("{bidder} roster is full")]
    RosterFull { bidder: BidderId },

    #[error("{bidder} overseas quota is full")]
    OverseasQuotaFull { bidder: BidderId },

    #[error("winning bidder {0} does not exist")]
    UnknownWinner(BidderId),

    #[error("{0} is on the block but missing from the store")]
    MissingLot(LotId),

    #[error("{0} is not LIVE")]
    LotNotLive(LotId),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Bid(#[from] BidRejection),

    #[error("settlement integrity violation: {0}")]
    Integrity(#[from] IntegrityViolation),

    #[error("cannot {action} while auction is {status}")]
    InvalidTransition {
        action: &'static str,
        status: AuctionStatus,
    },

    /// An admin write lost a race with another writer.
    #[error("auction state changed concurrently")]
    Conflict,

    #[error("unknown bidder: {0}")]
    UnknownBidder(BidderId),

    #[error("unknown lot: {0}")]
    UnknownLot(LotId),

    #[error("{lot} is {status}, only UNSOLD lots can be requeued")]
    LotNotUnsold { lot: LotId, status: LotStatus },

    #[error("invalid force-end: {0}")]
    InvalidForceEnd(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
