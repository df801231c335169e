//! Connection-level store.
//!
//! Uses interior mutability (Mutex) so the store can be shared behind `Arc`
//! by the engine's blocking tasks. The lock is held for one statement or one
//! transaction, never across an await point.

use chrono::Duration;
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use std::time::Duration as StdDuration;
use tracing::debug;
use types::{Amount, AuctionState, Bidder, BidderId, Lot, LotId, LotStatus, Timestamp};

use crate::error::{StoreError, StoreResult};
use crate::rows::{self, to_millis};
use crate::schema::{StorageConfig, init_schema};
use crate::tx::StoreTx;

/// Conditional bid write.
///
/// Applied only if the auction is still ACTIVE on `lot`/`turn`, the stored
/// `current_bid`/`highest_bidder` still equal the values the bid was
/// validated against, and `placed_at` is before the persisted deadline.
#[derive(Debug, Clone)]
pub struct BidCommit {
    pub lot: LotId,
    pub turn: u64,
    pub expected_bid: Amount,
    pub expected_leader: Option<BidderId>,
    pub bidder: BidderId,
    pub amount: Amount,
    pub placed_at: Timestamp,
    pub deadline: Timestamp,
}

pub struct AuctionStore {
    conn: Mutex<Connection>,
}

impl AuctionStore {
    /// Open (or create) the database and its schema.
    pub fn new(config: StorageConfig) -> StoreResult<Self> {
        let conn = if config.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.path)?
        };
        conn.busy_timeout(StdDuration::from_millis(config.busy_timeout_ms))?;
        init_schema(&conn)?;

        debug!(path = %config.path, "auction store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> StoreResult<Self> {
        Self::new(StorageConfig::default())
    }

    /// Create the auction singleton if it does not exist yet.
    ///
    /// An existing singleton keeps its turn and clock; only the bid window
    /// length is refreshed.
    pub fn ensure_state(&self, bid_duration: Duration) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO auction_state (id, status, bid_duration_ms) VALUES (1, 'WAITING', ?1)
             ON CONFLICT(id) DO UPDATE SET bid_duration_ms = excluded.bid_duration_ms",
            params![bid_duration.num_milliseconds()],
        )?;
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn load_state(&self) -> StoreResult<AuctionState> {
        rows::load_state(&self.conn.lock())
    }

    pub fn load_lot(&self, id: LotId) -> StoreResult<Option<Lot>> {
        rows::load_lot(&self.conn.lock(), id)
    }

    pub fn load_bidder(&self, id: &BidderId) -> StoreResult<Option<Bidder>> {
        rows::load_bidder(&self.conn.lock(), id)
    }

    pub fn list_lots(&self, status: Option<LotStatus>) -> StoreResult<Vec<Lot>> {
        rows::list_lots(&self.conn.lock(), status)
    }

    pub fn list_bidders(&self) -> StoreResult<Vec<Bidder>> {
        rows::list_bidders(&self.conn.lock())
    }

    /// Everything a full snapshot needs, read under one lock.
    pub fn load_view(&self) -> StoreResult<(AuctionState, Option<Lot>, Vec<Bidder>)> {
        let conn = self.conn.lock();
        let state = rows::load_state(&conn)?;
        let lot = match state.current_lot {
            Some(id) => rows::load_lot(&conn, id)?,
            None => None,
        };
        let bidders = rows::list_bidders(&conn)?;
        Ok((state, lot, bidders))
    }

    /// Cheap liveness probe.
    pub fn ping(&self) -> StoreResult<()> {
        self.conn
            .lock()
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    // =========================================================================
    // Inserts (reference data is loaded externally; these serve tools and tests)
    // =========================================================================

    pub fn insert_lot(&self, lot: &Lot) -> StoreResult<()> {
        rows::insert_lot(&self.conn.lock(), lot)
    }

    pub fn insert_bidder(&self, bidder: &Bidder) -> StoreResult<()> {
        rows::insert_bidder(&self.conn.lock(), bidder)
    }

    // =========================================================================
    // Conditional single-record updates
    // =========================================================================

    /// Apply a bid if the state it was validated against still holds.
    ///
    /// Returns `false` when another writer changed the turn first or the
    /// deadline has passed. The history row is written in the same
    /// transaction as the state update.
    pub fn commit_bid(&self, bid: &BidCommit) -> StoreResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let changed = tx.execute(
            "UPDATE auction_state
             SET current_bid = ?1, highest_bidder = ?2, timer_ends_at = ?3
             WHERE id = 1 AND status = 'ACTIVE' AND current_lot = ?4 AND turn = ?5
               AND current_bid = ?6 AND highest_bidder IS ?7 AND timer_ends_at > ?8",
            params![
                bid.amount.0,
                bid.bidder.0,
                to_millis(bid.deadline),
                bid.lot.0,
                bid.turn as i64,
                bid.expected_bid.0,
                bid.expected_leader.as_ref().map(|b| b.0.as_str()),
                to_millis(bid.placed_at),
            ],
        )?;
        if changed != 1 {
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO bid_history (turn, lot_id, bidder_id, amount, placed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                bid.turn as i64,
                bid.lot.0,
                bid.bidder.0,
                bid.amount.0,
                to_millis(bid.placed_at)
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// ACTIVE -> PAUSED on `lot`, capturing the residual clock.
    pub fn pause_turn(&self, lot: LotId, remaining: Duration) -> StoreResult<bool> {
        let changed = self.conn.lock().execute(
            "UPDATE auction_state
             SET status = 'PAUSED', timer_ends_at = NULL, remaining_ms = ?1
             WHERE id = 1 AND status = 'ACTIVE' AND current_lot = ?2",
            params![remaining.num_milliseconds(), lot.0],
        )?;
        Ok(changed == 1)
    }

    /// PAUSED -> ACTIVE on `lot` with a fresh deadline.
    pub fn resume_turn(&self, lot: LotId, deadline: Timestamp) -> StoreResult<bool> {
        let changed = self.conn.lock().execute(
            "UPDATE auction_state
             SET status = 'ACTIVE', timer_ends_at = ?1, remaining_ms = NULL
             WHERE id = 1 AND status = 'PAUSED' AND current_lot = ?2",
            params![to_millis(deadline), lot.0],
        )?;
        Ok(changed == 1)
    }

    /// Move the deadline of a running turn.
    pub fn set_deadline(&self, lot: LotId, deadline: Timestamp) -> StoreResult<bool> {
        let changed = self.conn.lock().execute(
            "UPDATE auction_state SET timer_ends_at = ?1
             WHERE id = 1 AND status = 'ACTIVE' AND current_lot = ?2",
            params![to_millis(deadline), lot.0],
        )?;
        Ok(changed == 1)
    }

    /// Replace the residual clock of a paused turn.
    pub fn set_remaining(&self, lot: LotId, remaining: Duration) -> StoreResult<bool> {
        let changed = self.conn.lock().execute(
            "UPDATE auction_state SET remaining_ms = ?1
             WHERE id = 1 AND status = 'PAUSED' AND current_lot = ?2",
            params![remaining.num_milliseconds(), lot.0],
        )?;
        Ok(changed == 1)
    }

    /// Claim turn `turn` on `lot` for a manual settlement.
    ///
    /// Steps any turn-holding state to RESOLVING with the admin's outcome:
    /// `winner = None` marks the lot unsold. The clock is cleared so a timer
    /// firing afterwards sees nothing to resolve. A requeued lot back on the
    /// block under a later turn is not claimed.
    pub fn claim_for_resolution(
        &self,
        lot: LotId,
        turn: u64,
        winner: Option<&BidderId>,
        amount: Amount,
    ) -> StoreResult<bool> {
        let changed = self.conn.lock().execute(
            "UPDATE auction_state
             SET status = 'RESOLVING', highest_bidder = ?1, current_bid = ?2,
                 timer_ends_at = NULL, remaining_ms = NULL
             WHERE id = 1 AND status IN ('ACTIVE', 'PAUSED', 'RESOLVING')
               AND current_lot = ?3 AND turn = ?4",
            params![winner.map(|b| b.0.as_str()), amount.0, lot.0, turn as i64],
        )?;
        Ok(changed == 1)
    }

    /// UNSOLD -> AVAILABLE. Does not touch the auction state.
    pub fn requeue_lot(&self, lot: LotId) -> StoreResult<bool> {
        let changed = self.conn.lock().execute(
            "UPDATE lots SET status = 'AVAILABLE', sold_price = NULL, sold_to = NULL
             WHERE id = ?1 AND status = 'UNSOLD'",
            params![lot.0],
        )?;
        Ok(changed == 1)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Run `f` inside one transaction.
    ///
    /// Commits when `f` returns `Ok`; any `Err` rolls every write back.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&StoreTx<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(StoreError::from)?;
        let value = f(&StoreTx { conn: &tx })?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }

    /// Run `f` against the connection under the lock.
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        f(&self.conn.lock())
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> parking_lot::MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use types::AuctionStatus;

    fn store_with_turn() -> (AuctionStore, Lot) {
        let store = AuctionStore::in_memory().unwrap();
        store.ensure_state(Duration::seconds(30)).unwrap();
        let lot = Lot::new(LotId(1), "Opener", 1, Amount::units(2));
        store.insert_lot(&lot).unwrap();
        store
            .insert_bidder(&Bidder::new("CSK", "Chennai", Amount::units(10)))
            .unwrap();
        store
            .insert_bidder(&Bidder::new("MI", "Mumbai", Amount::units(10)))
            .unwrap();

        let deadline = Utc::now() + Duration::seconds(30);
        store
            .transaction(|tx| -> StoreResult<()> {
                assert!(tx.open_turn(&lot, 0, deadline)?);
                assert!(tx.transition_lot(lot.id, LotStatus::Available, LotStatus::Live)?);
                Ok(())
            })
            .unwrap();
        (store, lot)
    }

    fn bid(bidder: &str, amount: Amount, expected: Amount, leader: Option<&str>) -> BidCommit {
        let now = Utc::now();
        BidCommit {
            lot: LotId(1),
            turn: 1,
            expected_bid: expected,
            expected_leader: leader.map(BidderId::from),
            bidder: BidderId::from(bidder),
            amount,
            placed_at: now,
            deadline: now + Duration::seconds(30),
        }
    }

    #[test]
    fn test_ensure_state_creates_waiting_singleton() {
        let store = AuctionStore::in_memory().unwrap();
        store.ensure_state(Duration::seconds(20)).unwrap();
        store.ensure_state(Duration::seconds(25)).unwrap();

        let state = store.load_state().unwrap();
        assert_eq!(state.status, AuctionStatus::Waiting);
        assert_eq!(state.bid_duration, Duration::seconds(25));
        let count: i64 = store
            .raw()
            .query_row("SELECT COUNT(*) FROM auction_state", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_missing_state_is_not_found() {
        let store = AuctionStore::in_memory().unwrap();
        assert!(matches!(store.load_state(), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_commit_bid_then_stale_commit_loses() {
        let (store, _) = store_with_turn();

        let first = bid("CSK", Amount::units(2), Amount::units(2), None);
        assert!(store.commit_bid(&first).unwrap());

        // Validated against the same pre-bid state
        let second = bid("MI", Amount::units(2), Amount::units(2), None);
        assert!(!store.commit_bid(&second).unwrap());

        let state = store.load_state().unwrap();
        assert_eq!(state.highest_bidder, Some(BidderId::from("CSK")));
        assert_eq!(state.bid_history.len(), 1);
    }

    #[test]
    fn test_commit_after_deadline_loses() {
        let (store, lot) = store_with_turn();
        let deadline = Utc::now() - Duration::milliseconds(800);
        assert!(store.set_deadline(lot.id, deadline).unwrap());

        let mut late = bid("MI", Amount::units(2), Amount::units(2), None);
        late.placed_at = deadline + Duration::milliseconds(100);
        assert!(!store.commit_bid(&late).unwrap());

        // Placed inside the window, still applies
        late.placed_at = deadline - Duration::milliseconds(100);
        assert!(store.commit_bid(&late).unwrap());

        let state = store.load_state().unwrap();
        assert_eq!(state.highest_bidder, Some(BidderId::from("MI")));
        assert_eq!(state.bid_history.len(), 1);
    }

    #[test]
    fn test_claim_is_bound_to_its_turn() {
        let (store, lot) = store_with_turn();
        let csk = BidderId::from("CSK");

        assert!(!store
            .claim_for_resolution(lot.id, 0, Some(&csk), Amount::units(2))
            .unwrap());
        assert_eq!(store.load_state().unwrap().status, AuctionStatus::Active);

        assert!(store
            .claim_for_resolution(lot.id, 1, Some(&csk), Amount::units(2))
            .unwrap());
        let state = store.load_state().unwrap();
        assert_eq!(state.status, AuctionStatus::Resolving);
        assert!(state.timer_ends_at.is_none());
    }

    #[test]
    fn test_bid_history_most_recent_first() {
        let (store, _) = store_with_turn();
        store
            .commit_bid(&bid("CSK", Amount::units(2), Amount::units(2), None))
            .unwrap();
        store
            .commit_bid(&bid(
                "MI",
                Amount::from_float(2.2),
                Amount::units(2),
                Some("CSK"),
            ))
            .unwrap();

        let state = store.load_state().unwrap();
        assert_eq!(state.bid_history[0].bidder, BidderId::from("MI"));
        assert_eq!(state.bid_history[1].bidder, BidderId::from("CSK"));
    }

    #[test]
    fn test_pause_resume_guards() {
        let (store, lot) = store_with_turn();
        assert!(store.pause_turn(lot.id, Duration::seconds(12)).unwrap());
        assert!(!store.pause_turn(lot.id, Duration::seconds(12)).unwrap());

        let state = store.load_state().unwrap();
        assert_eq!(state.status, AuctionStatus::Paused);
        assert!(state.timer_ends_at.is_none());
        assert_eq!(state.remaining_time, Some(Duration::seconds(12)));

        let deadline = Utc::now() + Duration::seconds(12);
        assert!(store.resume_turn(lot.id, deadline).unwrap());
        let state = store.load_state().unwrap();
        assert_eq!(state.status, AuctionStatus::Active);
        assert!(state.remaining_time.is_none());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let (store, lot) = store_with_turn();

        let result = store.transaction(|tx| -> StoreResult<()> {
            tx.close_turn(lot.id, AuctionStatus::Unsold)?;
            tx.transition_lot(lot.id, LotStatus::Live, LotStatus::Unsold)?;
            Err(StoreError::Corrupt("forced".into()))
        });
        assert!(result.is_err());

        assert_eq!(store.load_state().unwrap().status, AuctionStatus::Active);
        assert_eq!(
            store.load_lot(lot.id).unwrap().unwrap().status,
            LotStatus::Live
        );
    }

    #[test]
    fn test_debit_winner_guarded_by_budget() {
        let (store, lot) = store_with_turn();
        let winner = BidderId::from("CSK");

        let debited = store
            .transaction(|tx| tx.debit_winner(&winner, lot.id, Amount::units(11), false))
            .unwrap();
        assert!(!debited);

        let debited = store
            .transaction(|tx| tx.debit_winner(&winner, lot.id, Amount::units(4), true))
            .unwrap();
        assert!(debited);

        let bidder = store.load_bidder(&winner).unwrap().unwrap();
        assert_eq!(bidder.remaining_budget, Amount::units(6));
        assert_eq!(bidder.total_spent, Amount::units(4));
        assert_eq!(bidder.roster_size, 1);
        assert_eq!(bidder.overseas_count, 1);
        assert_eq!(bidder.owned, vec![lot.id]);
        assert!(bidder.is_balanced());
    }

    #[test]
    fn test_requeue_only_from_unsold() {
        let store = AuctionStore::in_memory().unwrap();
        let mut lot = Lot::new(LotId(4), "Spare", 2, Amount::units(1));
        lot.status = LotStatus::Unsold;
        store.insert_lot(&lot).unwrap();

        assert!(store.requeue_lot(lot.id).unwrap());
        assert!(!store.requeue_lot(lot.id).unwrap());
        assert_eq!(
            store.load_lot(lot.id).unwrap().unwrap().status,
            LotStatus::Available
        );
    }

    #[test]
    fn test_lowest_tier_available() {
        let store = AuctionStore::in_memory().unwrap();
        store
            .insert_lot(&Lot::new(LotId(1), "a", 2, Amount::units(1)))
            .unwrap();
        store
            .insert_lot(&Lot::new(LotId(2), "b", 1, Amount::units(1)))
            .unwrap();
        store
            .insert_lot(&Lot::new(LotId(3), "c", 1, Amount::units(1)))
            .unwrap();

        let candidates = store
            .transaction(|tx| tx.lowest_tier_available())
            .unwrap();
        let ids: Vec<LotId> = candidates.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![LotId(2), LotId(3)]);
    }
}
