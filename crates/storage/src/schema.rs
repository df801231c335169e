//! Database schema and configuration
//!
//! **SoC:** This module ONLY defines schema, no business logic

use rusqlite::Connection;
use std::path::Path;

/// Storage configuration (declarative)
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path to SQLite database (`:memory:` for in-memory)
    pub path: String,
    /// How long a writer waits on a locked database file, in milliseconds
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            busy_timeout_ms: 5_000,
        }
    }
}

impl StorageConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == ":memory:"
    }
}

/// Initialize database with schema
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    // Auctionable items
    conn.execute(
        "CREATE TABLE IF NOT EXISTS lots (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT '',
            tier INTEGER NOT NULL,
            country TEXT NOT NULL DEFAULT '',
            overseas INTEGER NOT NULL DEFAULT 0,
            base_price INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'AVAILABLE',
            sold_price INTEGER,
            sold_to TEXT
        )",
        [],
    )?;

    // Next-lot selection scans available lots by tier
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lots_status_tier ON lots(status, tier)",
        [],
    )?;

    // At most one lot on the block
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_lots_single_live ON lots(status) WHERE status = 'LIVE'",
        [],
    )?;

    // Participating teams
    conn.execute(
        "CREATE TABLE IF NOT EXISTS bidders (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            total_budget INTEGER NOT NULL,
            remaining_budget INTEGER NOT NULL,
            roster_size INTEGER NOT NULL DEFAULT 0,
            overseas_count INTEGER NOT NULL DEFAULT 0,
            total_spent INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // Owned lots in purchase order
    conn.execute(
        "CREATE TABLE IF NOT EXISTS bidder_lots (
            bidder_id TEXT NOT NULL,
            lot_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (bidder_id, lot_id)
        )",
        [],
    )?;

    // Auction singleton
    conn.execute(
        "CREATE TABLE IF NOT EXISTS auction_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            status TEXT NOT NULL,
            current_lot INTEGER,
            turn INTEGER NOT NULL DEFAULT 0,
            current_bid INTEGER NOT NULL DEFAULT 0,
            highest_bidder TEXT,
            timer_ends_at INTEGER,
            bid_duration_ms INTEGER NOT NULL,
            remaining_ms INTEGER
        )",
        [],
    )?;

    // Accepted bids (append-only, windowed by turn)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS bid_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            turn INTEGER NOT NULL,
            lot_id INTEGER NOT NULL,
            bidder_id TEXT NOT NULL,
            amount INTEGER NOT NULL,
            placed_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_bid_history_turn ON bid_history(turn)",
        [],
    )?;

    // One active session per bidder
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            bidder_id TEXT PRIMARY KEY,
            token TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    Ok(())
}
