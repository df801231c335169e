//! Shared server state.
//!
//! Cloned into each handler via Axum's State extractor. The engine owns the
//! auction; handlers only hold references to it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::broadcast;

use engine::AuctionEngine;
use storage::SessionDirectory;
use types::BidderId;

use crate::bridge::ServerEvent;

/// Shared state for all route handlers.
#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<AuctionEngine>,

    /// Session lookups for bidder connections.
    pub sessions: Arc<dyn SessionDirectory>,

    /// Broadcast channel fed by the engine hook (engine → clients).
    pub events_tx: broadcast::Sender<ServerEvent>,

    /// Required on admin routes when set.
    pub admin_token: Option<Arc<str>>,

    /// Server start time.
    pub start_time: Instant,

    pub metrics: Arc<ServerMetrics>,
}

impl ServerState {
    pub fn new(
        engine: Arc<AuctionEngine>,
        sessions: Arc<dyn SessionDirectory>,
        events_tx: broadcast::Sender<ServerEvent>,
    ) -> Self {
        Self {
            engine,
            sessions,
            events_tx,
            admin_token: None,
            start_time: Instant::now(),
            metrics: Arc::new(ServerMetrics::new()),
        }
    }

    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.filter(|t| !t.is_empty()).map(Arc::from);
        self
    }

    /// Get uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Subscribe to engine events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ServerEvent> {
        self.events_tx.subscribe()
    }

    /// Whether `(bidder, token)` is the bidder's current session.
    ///
    /// The directory may hit the store, so the lookup runs on the blocking pool.
    pub async fn check_session(&self, bidder: &BidderId, token: &str) -> bool {
        let sessions = Arc::clone(&self.sessions);
        let bidder = bidder.clone();
        let token = token.to_owned();
        tokio::task::spawn_blocking(move || sessions.is_session_valid(&bidder, &token))
            .await
            .unwrap_or(false)
    }

    /// Whether `token` grants admin rights.
    pub fn is_admin(&self, token: Option<&str>) -> bool {
        match (&self.admin_token, token) {
            (None, _) => true,
            (Some(expected), Some(given)) => expected.as_ref() == given,
            (Some(_), None) => false,
        }
    }
}

/// Server-side metrics.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    /// Active WebSocket connections.
    pub ws_connections: AtomicU64,
    pub bids_accepted: AtomicU64,
    pub bids_rejected: AtomicU64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment WebSocket connection count.
    pub fn ws_connect(&self) {
        self.ws_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement WebSocket connection count.
    pub fn ws_disconnect(&self) {
        self.ws_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn ws_count(&self) -> u64 {
        self.ws_connections.load(Ordering::Relaxed)
    }

    pub fn record_bid(&self, accepted: bool) {
        let counter = if accepted {
            &self.bids_accepted
        } else {
            &self.bids_rejected
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// `(accepted, rejected)` bid counts.
    pub fn bid_counts(&self) -> (u64, u64) {
        (
            self.bids_accepted.load(Ordering::Relaxed),
            self.bids_rejected.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::hooks::BroadcastHook;
    use engine::{AuctionStore, EngineConfig};
    use types::{Amount, Bidder, Lot, LotId};

    /// State over a fresh in-memory store with two bidders and two lots.
    pub(crate) fn test_state() -> (ServerState, Arc<AuctionStore>) {
        let store = Arc::new(AuctionStore::in_memory().unwrap());
        store
            .insert_bidder(&Bidder::new("CSK", "Chennai", Amount::units(10)))
            .unwrap();
        store
            .insert_bidder(&Bidder::new("MI", "Mumbai", Amount::units(10)))
            .unwrap();
        store
            .insert_lot(&Lot::new(LotId(1), "Opener", 1, Amount::units(2)))
            .unwrap();
        store
            .insert_lot(&Lot::new(LotId(2), "Closer", 2, Amount::units(1)))
            .unwrap();
        store.register_session(&BidderId::from("CSK"), "csk-token").unwrap();
        store.register_session(&BidderId::from("MI"), "mi-token").unwrap();

        let (tx, _) = broadcast::channel(256);
        let engine = AuctionEngine::new(Arc::clone(&store), EngineConfig::default())
            .unwrap()
            .with_hook(Arc::new(BroadcastHook::new(tx.clone())));
        let state = ServerState::new(Arc::new(engine), store.clone(), tx)
            .with_admin_token(Some("secret".into()));
        (state, store)
    }

    #[test]
    fn test_ws_connections() {
        let metrics = ServerMetrics::new();
        assert_eq!(metrics.ws_count(), 0);

        metrics.ws_connect();
        metrics.ws_connect();
        assert_eq!(metrics.ws_count(), 2);

        metrics.ws_disconnect();
        assert_eq!(metrics.ws_count(), 1);
    }

    #[test]
    fn test_bid_counts() {
        let metrics = ServerMetrics::new();
        metrics.record_bid(true);
        metrics.record_bid(false);
        metrics.record_bid(false);
        assert_eq!(metrics.bid_counts(), (1, 2));
    }

    #[test]
    fn test_admin_token() {
        let (state, _) = test_state();
        assert!(state.is_admin(Some("secret")));
        assert!(!state.is_admin(Some("guess")));
        assert!(!state.is_admin(None));

        let open = state.with_admin_token(None);
        assert!(open.is_admin(None));
    }

    #[tokio::test]
    async fn test_session_check() {
        let (state, store) = test_state();
        let csk = BidderId::from("CSK");
        assert!(state.check_session(&csk, "csk-token").await);
        assert!(!state.check_session(&csk, "mi-token").await);

        store.register_session(&csk, "rotated").unwrap();
        assert!(!state.check_session(&csk, "csk-token").await);
    }
}
