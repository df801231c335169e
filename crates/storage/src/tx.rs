//! Transaction handle for multi-record writes.
//!
//! A `StoreTx` only exists inside [`crate::AuctionStore::transaction`]. Every
//! write returns whether its precondition still held; the caller decides
//! whether a miss aborts the transaction.

use rusqlite::{Connection, params};
use types::{
    Amount, AuctionState, AuctionStatus, Bidder, BidderId, Lot, LotId, LotStatus, Timestamp,
};

use crate::error::StoreResult;
use crate::rows::{self, to_millis};

pub struct StoreTx<'a> {
    pub(crate) conn: &'a Connection,
}

impl<'a> StoreTx<'a> {
    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub fn load_state(&self) -> StoreResult<AuctionState> {
        rows::load_state(self.conn)
    }

    pub fn load_lot(&self, id: LotId) -> StoreResult<Option<Lot>> {
        rows::load_lot(self.conn, id)
    }

    pub fn load_bidder(&self, id: &BidderId) -> StoreResult<Option<Bidder>> {
        rows::load_bidder(self.conn, id)
    }

    /// AVAILABLE lots of the lowest remaining tier.
    pub fn lowest_tier_available(&self) -> StoreResult<Vec<Lot>> {
        rows::lowest_tier_available(self.conn)
    }

    // -------------------------------------------------------------------------
    // Auction state transitions
    // -------------------------------------------------------------------------

    /// Close the turn on `lot` as SOLD or UNSOLD.
    ///
    /// Applies only while the state is still ACTIVE or RESOLVING on the same
    /// lot. Clears the leader and the clock; `current_bid` keeps the final
    /// price for display.
    pub fn close_turn(&self, lot: LotId, outcome: AuctionStatus) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE auction_state
             SET status = ?1, highest_bidder = NULL, timer_ends_at = NULL, remaining_ms = NULL
             WHERE id = 1 AND status IN ('ACTIVE', 'RESOLVING') AND current_lot = ?2",
            params![outcome.as_str(), lot.0],
        )?;
        Ok(changed == 1)
    }

    /// Bring `lot` onto the block with a fresh clock.
    ///
    /// Applies only while the state can advance and is still on `expected_turn`.
    pub fn open_turn(
        &self,
        lot: &Lot,
        expected_turn: u64,
        deadline: Timestamp,
    ) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE auction_state
             SET status = 'ACTIVE', current_lot = ?1, turn = turn + 1, current_bid = ?2,
                 highest_bidder = NULL, timer_ends_at = ?3, remaining_ms = NULL
             WHERE id = 1 AND status IN ('WAITING', 'SOLD', 'UNSOLD') AND turn = ?4",
            params![
                lot.id.0,
                lot.base_price.0,
                to_millis(deadline),
                expected_turn as i64
            ],
        )?;
        Ok(changed == 1)
    }

    /// Park the auction in WAITING with nothing on the block.
    ///
    /// `from_lot` is the lot the caller saw on the block (`None` when none).
    pub fn park_waiting(&self, from_lot: Option<LotId>) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE auction_state
             SET status = 'WAITING', current_lot = NULL, current_bid = 0, highest_bidder = NULL,
                 timer_ends_at = NULL, remaining_ms = NULL
             WHERE id = 1 AND current_lot IS ?1",
            params![from_lot.map(|l| l.0)],
        )?;
        Ok(changed == 1)
    }

    // -------------------------------------------------------------------------
    // Lot transitions
    // -------------------------------------------------------------------------

    /// Move a lot between statuses, guarded by its current status.
    pub fn transition_lot(&self, lot: LotId, from: LotStatus, to: LotStatus) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE lots SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![to.as_str(), lot.0, from.as_str()],
        )?;
        Ok(changed == 1)
    }

    /// LIVE -> SOLD with the sale recorded.
    pub fn mark_lot_sold(&self, lot: LotId, price: Amount, winner: &BidderId) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE lots SET status = 'SOLD', sold_price = ?1, sold_to = ?2
             WHERE id = ?3 AND status = 'LIVE'",
            params![price.0, winner.0, lot.0],
        )?;
        Ok(changed == 1)
    }

    // -------------------------------------------------------------------------
    // Bidder settlement
    // -------------------------------------------------------------------------

    /// Charge `price` to the winner and add `lot` to their roster.
    ///
    /// The debit is guarded by `remaining_budget >= price`; a miss leaves the
    /// bidder untouched.
    pub fn debit_winner(
        &self,
        winner: &BidderId,
        lot: LotId,
        price: Amount,
        overseas: bool,
    ) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE bidders
             SET remaining_budget = remaining_budget - ?1,
                 total_spent = total_spent + ?1,
                 roster_size = roster_size + 1,
                 overseas_count = overseas_count + ?2
             WHERE id = ?3 AND remaining_budget >= ?1",
            params![price.0, i64::from(overseas), winner.0],
        )?;
        if changed != 1 {
            return Ok(false);
        }

        self.conn.execute(
            "INSERT INTO bidder_lots (bidder_id, lot_id, position)
             VALUES (?1, ?2, (SELECT COUNT(*) FROM bidder_lots WHERE bidder_id = ?1))",
            params![winner.0, lot.0],
        )?;
        Ok(true)
    }
}
