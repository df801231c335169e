//! Engine hook that feeds the WebSocket broadcast channel.
//!
//! ```text
//! AuctionEngine              BroadcastHook              WebSocket tasks
//!       │                         │                           │
//!       │── on_snapshot() ───────▶│                           │
//!       │                         │── events_tx.send() ──────▶│
//!       │                         │                           │── to client
//! ```

use engine::AuctionHook;
use tokio::sync::broadcast;
use tracing::trace;
use types::{AuctionSnapshot, BidPlaced, LotResolved};

use crate::bridge::ServerEvent;

/// Forwards committed engine events to every connected client.
pub struct BroadcastHook {
    events_tx: broadcast::Sender<ServerEvent>,
}

impl BroadcastHook {
    pub fn new(events_tx: broadcast::Sender<ServerEvent>) -> Self {
        Self { events_tx }
    }

    fn send(&self, event: ServerEvent) {
        // No receivers just means nobody is connected
        if let Err(e) = self.events_tx.send(event) {
            trace!("no subscribers for {:?}", e.0);
        }
    }
}

impl AuctionHook for BroadcastHook {
    fn name(&self) -> &str {
        "BroadcastHook"
    }

    fn on_snapshot(&self, snapshot: &AuctionSnapshot) {
        self.send(ServerEvent::Snapshot(snapshot.clone()));
    }

    fn on_bid_placed(&self, event: &BidPlaced) {
        self.send(ServerEvent::BidPlaced(event.clone()));
    }

    fn on_lot_resolved(&self, event: &LotResolved) {
        self.send(ServerEvent::LotResolved(event.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use types::{AuctionState, LotId, ResolvedOutcome};

    #[test]
    fn test_broadcast_hook_creation() {
        let (tx, _rx) = broadcast::channel(16);
        let hook = BroadcastHook::new(tx);
        assert_eq!(hook.name(), "BroadcastHook");
    }

    #[test]
    fn test_send_without_receivers_is_harmless() {
        let (tx, rx) = broadcast::channel(16);
        drop(rx);
        let hook = BroadcastHook::new(tx);
        let state = AuctionState::initial(Duration::seconds(30));
        hook.on_snapshot(&AuctionSnapshot::build(&state, None, &[]));
    }

    #[test]
    fn test_events_reach_subscribers() {
        let (tx, mut rx) = broadcast::channel(16);
        let hook = BroadcastHook::new(tx);

        hook.on_lot_resolved(&LotResolved {
            lot: LotId(4),
            lot_name: "Closer".into(),
            outcome: ResolvedOutcome::Unsold,
        });

        let received = rx.try_recv().unwrap();
        let json = serde_json::to_value(&received).unwrap();
        assert_eq!(json["type"], "lot_resolved");
        assert_eq!(json["lot"], 4);
        assert_eq!(json["outcome"]["result"], "UNSOLD");
    }
}
