//! REST API endpoints.
//!
//! # Reads
//!
//! - `GET /api/state` - Current snapshot
//! - `GET /api/lots?status=UNSOLD` - Lots, optionally filtered by status
//! - `GET /api/bidders` - Bidders with budgets and roster counts
//!
//! # Bidding
//!
//! - `POST /api/bid` - `{amount}`; headers `x-bidder-id`, `x-session-token`
//!
//! # Admin (header `x-admin-token` when configured)
//!
//! - `POST /api/admin/advance`
//! - `POST /api/admin/pause`
//! - `POST /api/admin/resume`
//! - `POST /api/admin/timer` - `{seconds}`
//! - `POST /api/admin/force-end` - `{winner, amount}`, `winner: null` for unsold
//! - `POST /api/admin/lots/{lot_id}/requeue`

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use engine::{AdvanceOutcome, NoOpReason, ResolutionOutcome};
use serde::{Deserialize, Serialize};
use types::{
    Amount, AuctionSnapshot, BidderId, BidderRef, BidderView, LotId, LotStatus, LotView,
    Timestamp,
};

use crate::bridge::BidResult;
use crate::error::{AppError, AppResult};
use crate::state::ServerState;

pub const BIDDER_HEADER: &str = "x-bidder-id";
pub const SESSION_HEADER: &str = "x-session-token";
pub const ADMIN_HEADER: &str = "x-admin-token";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Resolve the authenticated bidder from request headers.
async fn require_bidder(state: &ServerState, headers: &HeaderMap) -> AppResult<BidderId> {
    let (Some(bidder), Some(token)) = (header(headers, BIDDER_HEADER), header(headers, SESSION_HEADER))
    else {
        return Err(AppError::Unauthorized("session headers required".into()));
    };
    let id = BidderId::new(bidder);
    if !state.check_session(&id, token).await {
        return Err(AppError::Unauthorized("invalid session".into()));
    }
    Ok(id)
}

fn require_admin(state: &ServerState, headers: &HeaderMap) -> AppResult<()> {
    if state.is_admin(header(headers, ADMIN_HEADER)) {
        Ok(())
    } else {
        Err(AppError::Unauthorized("admin token required".into()))
    }
}

// =============================================================================
// Reads
// =============================================================================

/// Current snapshot: `GET /api/state`
pub async fn get_state(State(state): State<ServerState>) -> AppResult<Json<AuctionSnapshot>> {
    Ok(Json(state.engine.snapshot().await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct LotsQuery {
    pub status: Option<String>,
}

/// Lots in catalogue order: `GET /api/lots`
pub async fn get_lots(
    State(state): State<ServerState>,
    Query(query): Query<LotsQuery>,
) -> AppResult<Json<Vec<LotView>>> {
    let status = query
        .status
        .as_deref()
        .map(|s| s.to_ascii_uppercase().parse::<LotStatus>())
        .transpose()
        .map_err(AppError::BadRequest)?;

    let lots = state.engine.lots(status).await?;
    let bidders = state.engine.bidders().await?;
    Ok(Json(lots.iter().map(|lot| LotView::build(lot, &bidders)).collect()))
}

/// Bidders: `GET /api/bidders`
pub async fn get_bidders(State(state): State<ServerState>) -> AppResult<Json<Vec<BidderView>>> {
    let bidders = state.engine.bidders().await?;
    Ok(Json(bidders.iter().map(BidderView::from).collect()))
}

// =============================================================================
// Bidding
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct BidRequest {
    pub amount: f64,
}

/// Place a bid: `POST /api/bid`
///
/// Rejections come back as errors carrying the reason.
pub async fn post_bid(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(req): Json<BidRequest>,
) -> AppResult<Json<BidResult>> {
    let bidder = require_bidder(&state, &headers).await?;
    let result = state
        .engine
        .place_bid(&bidder, Amount::from_float(req.amount))
        .await;
    state.metrics.record_bid(result.is_ok());
    Ok(Json(BidResult::accepted(&result?)))
}

// =============================================================================
// Admin
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceResponse {
    /// `started` or `no_lots_available`.
    pub outcome: &'static str,
    pub lot: Option<LotView>,
    pub timer_ends_at: Option<Timestamp>,
}

/// Bring the next lot up: `POST /api/admin/advance`
pub async fn post_advance(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> AppResult<Json<AdvanceResponse>> {
    require_admin(&state, &headers)?;
    let response = match state.engine.start_or_advance().await? {
        AdvanceOutcome::Started { lot, deadline } => AdvanceResponse {
            outcome: "started",
            lot: Some(LotView::build(&lot, &[])),
            timer_ends_at: Some(deadline),
        },
        AdvanceOutcome::NoLotsAvailable => AdvanceResponse {
            outcome: "no_lots_available",
            lot: None,
            timer_ends_at: None,
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockResponse {
    pub timer_ends_at: Option<Timestamp>,
    pub remaining_ms: Option<i64>,
}

/// Stop the clock: `POST /api/admin/pause`
pub async fn post_pause(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> AppResult<Json<ClockResponse>> {
    require_admin(&state, &headers)?;
    let remaining = state.engine.pause().await?;
    Ok(Json(ClockResponse {
        timer_ends_at: None,
        remaining_ms: Some(remaining.num_milliseconds()),
    }))
}

/// Restart the clock: `POST /api/admin/resume`
pub async fn post_resume(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> AppResult<Json<ClockResponse>> {
    require_admin(&state, &headers)?;
    let deadline = state.engine.resume().await?;
    Ok(Json(ClockResponse {
        timer_ends_at: Some(deadline),
        remaining_ms: None,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TimerRequest {
    pub seconds: u32,
}

/// Put time on the clock: `POST /api/admin/timer`
pub async fn post_timer(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(req): Json<TimerRequest>,
) -> AppResult<Json<ClockResponse>> {
    require_admin(&state, &headers)?;
    state.engine.reset_timer(req.seconds).await?;
    let snapshot = state.engine.snapshot().await?;
    Ok(Json(ClockResponse {
        timer_ends_at: snapshot.timer_ends_at,
        remaining_ms: snapshot.remaining_ms,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ForceEndRequest {
    /// `None` ends the turn unsold.
    pub winner: Option<String>,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResponse {
    /// `sold`, `unsold` or `no_op`.
    pub outcome: &'static str,
    pub lot: Option<LotId>,
    pub winner: Option<BidderRef>,
    pub price: Option<f64>,
    pub reason: Option<NoOpReason>,
}

impl From<ResolutionOutcome> for ResolutionResponse {
    fn from(outcome: ResolutionOutcome) -> Self {
        match outcome {
            ResolutionOutcome::Sold {
                lot, winner, price, ..
            } => Self {
                outcome: "sold",
                lot: Some(lot),
                winner: Some(winner),
                price: Some(price.to_float()),
                reason: None,
            },
            ResolutionOutcome::Unsold { lot, .. } => Self {
                outcome: "unsold",
                lot: Some(lot),
                winner: None,
                price: None,
                reason: None,
            },
            ResolutionOutcome::NoOp(reason) => Self {
                outcome: "no_op",
                lot: None,
                winner: None,
                price: None,
                reason: Some(reason),
            },
        }
    }
}

/// End the turn now: `POST /api/admin/force-end`
pub async fn post_force_end(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(req): Json<ForceEndRequest>,
) -> AppResult<Json<ResolutionResponse>> {
    require_admin(&state, &headers)?;
    let winner = req.winner.filter(|w| !w.is_empty()).map(BidderId::new);
    let outcome = state
        .engine
        .force_end(winner, Amount::from_float(req.amount))
        .await?;
    Ok(Json(outcome.into()))
}

/// Return an unsold lot to the pool: `POST /api/admin/lots/{lot_id}/requeue`
pub async fn post_requeue(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(lot_id): Path<u32>,
) -> AppResult<Json<LotView>> {
    require_admin(&state, &headers)?;
    let lot = state.engine.requeue(LotId(lot_id)).await?;
    Ok(Json(LotView::build(&lot, &[])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use axum::http::{HeaderValue, StatusCode};
    use types::AuctionStatus;

    fn admin() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_HEADER, HeaderValue::from_static("secret"));
        headers
    }

    fn bidder(id: &'static str, token: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(BIDDER_HEADER, HeaderValue::from_static(id));
        headers.insert(SESSION_HEADER, HeaderValue::from_static(token));
        headers
    }

    #[tokio::test]
    async fn test_admin_routes_need_token() {
        let (state, _) = test_state();
        let err = post_advance(State(state), HeaderMap::new()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_advance_bid_and_force_end() {
        let (state, _) = test_state();

        let Json(advanced) = post_advance(State(state.clone()), admin()).await.unwrap();
        assert_eq!(advanced.outcome, "started");
        assert_eq!(advanced.lot.unwrap().id, LotId(1));

        let Json(result) = post_bid(
            State(state.clone()),
            bidder("CSK", "csk-token"),
            Json(BidRequest { amount: 2.0 }),
        )
        .await
        .unwrap();
        assert!(result.accepted);

        let err = post_bid(
            State(state.clone()),
            bidder("MI", "mi-token"),
            Json(BidRequest { amount: 2.15 }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "bid too low: minimum is 2.20");

        let Json(resolved) = post_force_end(
            State(state.clone()),
            admin(),
            Json(ForceEndRequest {
                winner: Some("CSK".into()),
                amount: 2.0,
            }),
        )
        .await
        .unwrap();
        assert_eq!(resolved.outcome, "sold");
        assert_eq!(resolved.winner.unwrap().name, "Chennai");

        let Json(snapshot) = get_state(State(state)).await.unwrap();
        assert_eq!(snapshot.status, AuctionStatus::Sold);
        assert!(snapshot.highest_bidder.is_none());
    }

    #[tokio::test]
    async fn test_bid_needs_valid_session() {
        let (state, _) = test_state();
        let err = post_bid(
            State(state),
            bidder("CSK", "mi-token"),
            Json(BidRequest { amount: 2.0 }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_pause_outside_turn_conflicts() {
        let (state, _) = test_state();
        let err = post_pause(State(state), admin()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_lots_filter() {
        let (state, _) = test_state();
        let Json(all) = get_lots(State(state.clone()), Query(LotsQuery::default()))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let Json(sold) = get_lots(
            State(state.clone()),
            Query(LotsQuery {
                status: Some("sold".into()),
            }),
        )
        .await
        .unwrap();
        assert!(sold.is_empty());

        let err = get_lots(
            State(state),
            Query(LotsQuery {
                status: Some("gone".into()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_requeue_unknown_lot() {
        let (state, _) = test_state();
        let err = post_requeue(State(state), admin(), Path(42)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
