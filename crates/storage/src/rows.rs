//! Row decoding and shared queries.
//!
//! Used by both the connection-level store and the transaction handle so the
//! same reads work inside and outside a settlement.

use chrono::{DateTime, Duration};
use rusqlite::{Connection, OptionalExtension, Row, params};
use types::{
    Amount, AuctionState, AuctionStatus, BidEntry, Bidder, BidderId, Lot, LotId, LotStatus,
    Timestamp,
};

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Value codecs
// =============================================================================

pub(crate) fn to_millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> StoreResult<Timestamp> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {ms}")))
}

fn parse_auction_status(raw: &str) -> StoreResult<AuctionStatus> {
    raw.parse().map_err(StoreError::Corrupt)
}

fn parse_lot_status(raw: &str) -> StoreResult<LotStatus> {
    raw.parse().map_err(StoreError::Corrupt)
}

// =============================================================================
// Auction state
// =============================================================================

struct StateRow {
    status: String,
    current_lot: Option<u32>,
    turn: i64,
    current_bid: i64,
    highest_bidder: Option<String>,
    timer_ends_at: Option<i64>,
    bid_duration_ms: i64,
    remaining_ms: Option<i64>,
}

pub(crate) fn load_state(conn: &Connection) -> StoreResult<AuctionState> {
    let row = conn
        .query_row(
            "SELECT status, current_lot, turn, current_bid, highest_bidder,
                    timer_ends_at, bid_duration_ms, remaining_ms
             FROM auction_state WHERE id = 1",
            [],
            |row| {
                Ok(StateRow {
                    status: row.get(0)?,
                    current_lot: row.get(1)?,
                    turn: row.get(2)?,
                    current_bid: row.get(3)?,
                    highest_bidder: row.get(4)?,
                    timer_ends_at: row.get(5)?,
                    bid_duration_ms: row.get(6)?,
                    remaining_ms: row.get(7)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound("auction state".into()))?;

    let turn = row.turn as u64;
    Ok(AuctionState {
        status: parse_auction_status(&row.status)?,
        current_lot: row.current_lot.map(LotId),
        turn,
        current_bid: Amount(row.current_bid),
        highest_bidder: row.highest_bidder.map(BidderId),
        bid_history: load_bid_history(conn, turn)?,
        timer_ends_at: row.timer_ends_at.map(from_millis).transpose()?,
        bid_duration: Duration::milliseconds(row.bid_duration_ms),
        remaining_time: row.remaining_ms.map(Duration::milliseconds),
    })
}

fn load_bid_history(conn: &Connection, turn: u64) -> StoreResult<Vec<BidEntry>> {
    let mut stmt = conn.prepare_cached(
        "SELECT bidder_id, amount, placed_at FROM bid_history
         WHERE turn = ?1 ORDER BY id DESC",
    )?;
    let rows = stmt
        .query_map(params![turn as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(bidder, amount, placed_at)| {
            Ok(BidEntry {
                bidder: BidderId(bidder),
                amount: Amount(amount),
                placed_at: from_millis(placed_at)?,
            })
        })
        .collect()
}

// =============================================================================
// Lots
// =============================================================================

const LOT_COLUMNS: &str =
    "id, name, category, tier, country, overseas, base_price, status, sold_price, sold_to";

struct LotRow {
    id: u32,
    name: String,
    category: String,
    tier: u32,
    country: String,
    overseas: bool,
    base_price: i64,
    status: String,
    sold_price: Option<i64>,
    sold_to: Option<String>,
}

impl LotRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            tier: row.get(3)?,
            country: row.get(4)?,
            overseas: row.get(5)?,
            base_price: row.get(6)?,
            status: row.get(7)?,
            sold_price: row.get(8)?,
            sold_to: row.get(9)?,
        })
    }

    fn into_lot(self) -> StoreResult<Lot> {
        Ok(Lot {
            id: LotId(self.id),
            name: self.name,
            category: self.category,
            tier: self.tier,
            country: self.country,
            overseas: self.overseas,
            base_price: Amount(self.base_price),
            status: parse_lot_status(&self.status)?,
            sold_price: self.sold_price.map(Amount),
            sold_to: self.sold_to.map(BidderId),
        })
    }
}

pub(crate) fn load_lot(conn: &Connection, id: LotId) -> StoreResult<Option<Lot>> {
    let sql = format!("SELECT {LOT_COLUMNS} FROM lots WHERE id = ?1");
    conn.query_row(&sql, params![id.0], LotRow::read)
        .optional()?
        .map(LotRow::into_lot)
        .transpose()
}

pub(crate) fn list_lots(conn: &Connection, status: Option<LotStatus>) -> StoreResult<Vec<Lot>> {
    let rows = match status {
        Some(status) => {
            let sql = format!("SELECT {LOT_COLUMNS} FROM lots WHERE status = ?1 ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map(params![status.as_str()], LotRow::read)?
                .collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!("SELECT {LOT_COLUMNS} FROM lots ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map([], LotRow::read)?
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    rows.into_iter().map(LotRow::into_lot).collect()
}

/// AVAILABLE lots of the lowest tier that still has any.
pub(crate) fn lowest_tier_available(conn: &Connection) -> StoreResult<Vec<Lot>> {
    let sql = format!(
        "SELECT {LOT_COLUMNS} FROM lots
         WHERE status = 'AVAILABLE'
           AND tier = (SELECT MIN(tier) FROM lots WHERE status = 'AVAILABLE')
         ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], LotRow::read)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(LotRow::into_lot).collect()
}

pub(crate) fn insert_lot(conn: &Connection, lot: &Lot) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO lots (id, name, category, tier, country, overseas, base_price, status, sold_price, sold_to)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            lot.id.0,
            lot.name,
            lot.category,
            lot.tier,
            lot.country,
            lot.overseas,
            lot.base_price.0,
            lot.status.as_str(),
            lot.sold_price.map(|p| p.0),
            lot.sold_to.as_ref().map(|b| b.0.as_str()),
        ],
    )?;
    Ok(())
}

// =============================================================================
// Bidders
// =============================================================================

const BIDDER_COLUMNS: &str =
    "id, name, total_budget, remaining_budget, roster_size, overseas_count, total_spent";

fn read_bidder(row: &Row<'_>) -> rusqlite::Result<Bidder> {
    Ok(Bidder {
        id: BidderId(row.get(0)?),
        name: row.get(1)?,
        total_budget: Amount(row.get(2)?),
        remaining_budget: Amount(row.get(3)?),
        roster_size: row.get(4)?,
        overseas_count: row.get(5)?,
        total_spent: Amount(row.get(6)?),
        owned: Vec::new(),
    })
}

fn load_owned(conn: &Connection, bidder: &BidderId) -> StoreResult<Vec<LotId>> {
    let mut stmt = conn.prepare_cached(
        "SELECT lot_id FROM bidder_lots WHERE bidder_id = ?1 ORDER BY position",
    )?;
    let owned = stmt
        .query_map(params![bidder.0], |row| row.get::<_, u32>(0))?
        .map(|id| id.map(LotId))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(owned)
}

pub(crate) fn load_bidder(conn: &Connection, id: &BidderId) -> StoreResult<Option<Bidder>> {
    let sql = format!("SELECT {BIDDER_COLUMNS} FROM bidders WHERE id = ?1");
    let Some(mut bidder) = conn.query_row(&sql, params![id.0], read_bidder).optional()? else {
        return Ok(None);
    };
    bidder.owned = load_owned(conn, &bidder.id)?;
    Ok(Some(bidder))
}

pub(crate) fn list_bidders(conn: &Connection) -> StoreResult<Vec<Bidder>> {
    let sql = format!("SELECT {BIDDER_COLUMNS} FROM bidders ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let mut bidders = stmt
        .query_map([], read_bidder)?
        .collect::<Result<Vec<_>, _>>()?;
    for bidder in &mut bidders {
        bidder.owned = load_owned(conn, &bidder.id)?;
    }
    Ok(bidders)
}

pub(crate) fn insert_bidder(conn: &Connection, bidder: &Bidder) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO bidders (id, name, total_budget, remaining_budget, roster_size, overseas_count, total_spent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            bidder.id.0,
            bidder.name,
            bidder.total_budget.0,
            bidder.remaining_budget.0,
            bidder.roster_size,
            bidder.overseas_count,
            bidder.total_spent.0,
        ],
    )?;
    for (position, lot) in bidder.owned.iter().enumerate() {
        conn.execute(
            "INSERT INTO bidder_lots (bidder_id, lot_id, position) VALUES (?1, ?2, ?3)",
            params![bidder.id.0, lot.0, position as i64],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_millis_round_trip_keeps_millisecond_precision() {
        let now = Utc::now();
        let back = from_millis(to_millis(now)).unwrap();
        assert_eq!(back.timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn test_corrupt_status_reported() {
        assert!(matches!(
            parse_auction_status("BROKEN"),
            Err(StoreError::Corrupt(_))
        ));
    }
}
