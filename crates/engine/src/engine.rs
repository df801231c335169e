//! The engine handle shared by every request handler and the timer task.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use types::{AuctionSnapshot, AuctionStatus, Bidder, BidPlaced, Lot, LotResolved, LotStatus, Timestamp};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::hooks::AuctionHook;
use crate::resolution::{ResolutionOutcome, Trigger};
use crate::timer::AuctionTimer;
use storage::AuctionStore;

/// Auction engine.
///
/// Cheap to share behind `Arc`. Store access runs on tokio's blocking pool so
/// request handlers never block the async workers.
pub struct AuctionEngine {
    pub(crate) store: Arc<AuctionStore>,
    pub(crate) timer: AuctionTimer,
    pub(crate) config: EngineConfig,
    hooks: Vec<Arc<dyn AuctionHook>>,
    /// Orders snapshot reads with their delivery to hooks.
    publish: Mutex<()>,
}

impl AuctionEngine {
    /// Create an engine over `store`, creating the auction singleton if needed.
    pub fn new(store: Arc<AuctionStore>, config: EngineConfig) -> EngineResult<Self> {
        store.ensure_state(config.bid_duration)?;
        Ok(Self {
            store,
            timer: AuctionTimer::new(),
            config,
            hooks: Vec::new(),
            publish: Mutex::new(()),
        })
    }

    /// Register an observer. Hooks are called in registration order.
    pub fn with_hook(mut self, hook: Arc<dyn AuctionHook>) -> Self {
        debug!(hook = hook.name(), "hook registered");
        self.hooks.push(hook);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn timer(&self) -> &AuctionTimer {
        &self.timer
    }

    pub fn store(&self) -> &Arc<AuctionStore> {
        &self.store
    }

    pub(crate) fn now(&self) -> Timestamp {
        Utc::now()
    }

    /// Run `f` against the store on the blocking pool.
    pub(crate) async fn blocking<T, F>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&AuctionStore) -> EngineResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store)).await?
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current normalized snapshot.
    pub async fn snapshot(&self) -> EngineResult<AuctionSnapshot> {
        self.blocking(|store| {
            let (state, lot, bidders) = store.load_view()?;
            Ok(AuctionSnapshot::build(&state, lot.as_ref(), &bidders))
        })
        .await
    }

    /// Read a snapshot and subscribe to later ones in a single step.
    ///
    /// `subscribe` runs while no snapshot can be published, so every
    /// snapshot the subscription then receives was read after the one
    /// returned here.
    pub async fn subscribe_with_snapshot<T>(
        &self,
        subscribe: impl FnOnce() -> T,
    ) -> (T, EngineResult<AuctionSnapshot>) {
        let _guard = self.publish.lock().await;
        let subscription = subscribe();
        (subscription, self.snapshot().await)
    }

    pub async fn lots(&self, status: Option<LotStatus>) -> EngineResult<Vec<Lot>> {
        self.blocking(move |store| Ok(store.list_lots(status)?)).await
    }

    pub async fn bidders(&self) -> EngineResult<Vec<Bidder>> {
        self.blocking(|store| Ok(store.list_bidders()?)).await
    }

    /// Store reachability, for readiness probes.
    pub async fn ping(&self) -> EngineResult<()> {
        self.blocking(|store| Ok(store.ping()?)).await
    }

    // =========================================================================
    // Fan-out
    // =========================================================================

    /// Push the committed state to every hook.
    ///
    /// Called after commits only. A failed read is logged; the write it
    /// follows has already succeeded.
    pub(crate) async fn publish_snapshot(&self) -> Option<AuctionSnapshot> {
        let _guard = self.publish.lock().await;
        match self.snapshot().await {
            Ok(snapshot) => {
                for hook in &self.hooks {
                    hook.on_snapshot(&snapshot);
                }
                Some(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "failed to build snapshot for broadcast");
                None
            }
        }
    }

    pub(crate) fn publish_bid(&self, event: &BidPlaced) {
        for hook in &self.hooks {
            hook.on_bid_placed(event);
        }
    }

    pub(crate) fn publish_resolution(&self, event: &LotResolved) {
        for hook in &self.hooks {
            hook.on_lot_resolved(event);
        }
    }

    // =========================================================================
    // Timer
    // =========================================================================

    /// Rebuild the in-process deadline from the store after a restart.
    ///
    /// An already expired turn is resolved immediately, once. Failures are
    /// logged and leave the auction as persisted.
    pub async fn restore_timer(&self) {
        let state = match self.blocking(|store| Ok(store.load_state()?)).await {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "timer restoration failed; auction left as persisted");
                return;
            }
        };

        match (state.status, state.timer_ends_at) {
            (AuctionStatus::Active, Some(deadline)) => {
                self.timer.set(deadline);
                info!(lot = ?state.current_lot, %deadline, "timer restored");
                if deadline <= self.now() {
                    self.check_timer().await;
                }
            }
            (AuctionStatus::Active, None) => {
                warn!(lot = ?state.current_lot, "active turn has no persisted deadline");
            }
            (status, _) => {
                debug!(%status, "no running clock to restore");
            }
        }
    }

    /// Drop the cached deadline, then re-arm it from the persisted clock.
    ///
    /// Called after a turn closes. A turn opened concurrently keeps its
    /// deadline because the re-read happens after the clear.
    pub(crate) async fn resync_timer(&self) {
        self.timer.clear();
        match self.blocking(|store| Ok(store.load_state()?)).await {
            Ok(state) => {
                if let (AuctionStatus::Active, Some(deadline)) = (state.status, state.timer_ends_at)
                {
                    self.timer.set(deadline);
                }
            }
            Err(e) => warn!(error = %e, "timer resync failed; next deadline armed on restore"),
        }
    }

    /// One timer tick: resolve the turn if the in-process deadline expired.
    pub async fn check_timer(&self) -> Option<ResolutionOutcome> {
        if !self.timer.take_expired(self.now()) {
            return None;
        }
        debug!("deadline expired, resolving turn");
        self.resolve_turn(Trigger::Timer).await.ok()
    }

    /// Periodic expiry check. Runs until the task is aborted.
    pub async fn run_timer(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            self.check_timer().await;
        }
    }
}
