//! Session directory: one active session per bidder.
//!
//! Credentials are issued elsewhere; the auction only asks whether a
//! `(bidder, token)` pair is the bidder's current session.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use types::BidderId;

use crate::error::StoreResult;
use crate::rows::to_millis;
use crate::store::AuctionStore;

/// Answers whether a connection's credentials belong to the live session.
pub trait SessionDirectory: Send + Sync {
    fn is_session_valid(&self, bidder: &BidderId, token: &str) -> bool;
}

impl AuctionStore {
    /// Record `token` as the bidder's only valid session, replacing any
    /// previous one.
    pub fn register_session(&self, bidder: &BidderId, token: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (bidder_id, token, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(bidder_id) DO UPDATE SET token = excluded.token, created_at = excluded.created_at",
                params![bidder.0, token, to_millis(Utc::now())],
            )?;
            Ok(())
        })
    }

    pub fn end_session(&self, bidder: &BidderId) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE bidder_id = ?1", params![bidder.0])?;
            Ok(())
        })
    }

    fn current_token(&self, bidder: &BidderId) -> StoreResult<Option<String>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT token FROM sessions WHERE bidder_id = ?1",
                    params![bidder.0],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }
}

impl SessionDirectory for AuctionStore {
    fn is_session_valid(&self, bidder: &BidderId, token: &str) -> bool {
        match self.current_token(bidder) {
            Ok(Some(current)) => !token.is_empty() && current == token,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(%bidder, error = %e, "session lookup failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_latest_session_is_valid() {
        let store = AuctionStore::in_memory().unwrap();
        let bidder = BidderId::from("CSK");

        assert!(!store.is_session_valid(&bidder, "first"));

        store.register_session(&bidder, "first").unwrap();
        assert!(store.is_session_valid(&bidder, "first"));

        store.register_session(&bidder, "second").unwrap();
        assert!(!store.is_session_valid(&bidder, "first"));
        assert!(store.is_session_valid(&bidder, "second"));

        store.end_session(&bidder).unwrap();
        assert!(!store.is_session_valid(&bidder, "second"));
    }

    #[test]
    fn test_empty_token_rejected() {
        let store = AuctionStore::in_memory().unwrap();
        let bidder = BidderId::from("MI");
        store.register_session(&bidder, "").unwrap();
        assert!(!store.is_session_valid(&bidder, ""));
    }
}
