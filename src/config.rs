//! Central configuration for the auction server.
//!
//! Built from the command line in `main` and split into the per-crate
//! configurations.

use chrono::Duration;
use engine::{EngineConfig, IntegrityPolicy};
use server::ServerConfig;
use std::time::Duration as StdDuration;
use storage::StorageConfig;

/// Master configuration for the whole process.
#[derive(Debug, Clone)]
pub struct AuctionConfig {
    // ─────────────────────────────────────────────────────────────────────────
    // Storage
    // ─────────────────────────────────────────────────────────────────────────
    /// SQLite database path (`:memory:` for a throwaway auction).
    pub db_path: String,

    // ─────────────────────────────────────────────────────────────────────────
    // Network
    // ─────────────────────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,
    /// Required on admin routes and observer sockets when set.
    pub admin_token: Option<String>,
    /// Buffered events per WebSocket subscriber before it lags.
    pub channel_capacity: usize,

    // ─────────────────────────────────────────────────────────────────────────
    // Auction rules
    // ─────────────────────────────────────────────────────────────────────────
    /// Bidding window in seconds, restarted by every accepted bid.
    pub bid_duration_secs: u32,
    /// Timer check period in milliseconds.
    pub check_interval_ms: u64,
    pub roster_cap: u32,
    pub overseas_cap: u32,
    pub integrity_policy: IntegrityPolicy,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        let server = ServerConfig::default();
        Self {
            db_path: "auction.db".into(),
            host: server.host,
            port: server.port,
            admin_token: None,
            channel_capacity: 256,
            bid_duration_secs: engine.bid_duration.num_seconds() as u32,
            check_interval_ms: engine.check_interval.as_millis() as u64,
            roster_cap: engine.roster_cap,
            overseas_cap: engine.overseas_cap,
            integrity_policy: engine.integrity_policy,
        }
    }
}

impl AuctionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder-style setters
    // ─────────────────────────────────────────────────────────────────────────

    pub fn db_path(mut self, path: impl Into<String>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn bind(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        // tokio's broadcast channel rejects zero
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn bid_duration_secs(mut self, secs: u32) -> Self {
        self.bid_duration_secs = secs;
        self
    }

    pub fn check_interval_ms(mut self, ms: u64) -> Self {
        self.check_interval_ms = ms.max(1);
        self
    }

    pub fn roster_cap(mut self, cap: u32) -> Self {
        self.roster_cap = cap;
        self
    }

    pub fn overseas_cap(mut self, cap: u32) -> Self {
        self.overseas_cap = cap;
        self
    }

    pub fn integrity_policy(mut self, policy: IntegrityPolicy) -> Self {
        self.integrity_policy = policy;
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Per-crate views
    // ─────────────────────────────────────────────────────────────────────────

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .bid_duration(Duration::seconds(i64::from(self.bid_duration_secs)))
            .check_interval(StdDuration::from_millis(self.check_interval_ms))
            .roster_cap(self.roster_cap)
            .overseas_cap(self.overseas_cap)
            .integrity_policy(self.integrity_policy)
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig::from_path(&self.db_path)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.host.clone(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine() {
        let config = AuctionConfig::default();
        assert_eq!(config.bid_duration_secs, 30);
        assert_eq!(config.check_interval_ms, 1000);
        assert_eq!(config.roster_cap, 25);
        assert_eq!(config.overseas_cap, 8);
        assert_eq!(config.integrity_policy, IntegrityPolicy::Manual);
    }

    #[test]
    fn test_builder_flows_into_engine_config() {
        let config = AuctionConfig::new()
            .bid_duration_secs(12)
            .check_interval_ms(250)
            .roster_cap(18)
            .overseas_cap(6)
            .integrity_policy(IntegrityPolicy::ReturnLot);

        let engine = config.engine_config();
        assert_eq!(engine.bid_duration, Duration::seconds(12));
        assert_eq!(engine.check_interval, StdDuration::from_millis(250));
        assert_eq!(engine.roster_cap, 18);
        assert_eq!(engine.overseas_cap, 6);
        assert_eq!(engine.integrity_policy, IntegrityPolicy::ReturnLot);
    }

    #[test]
    fn test_views() {
        let config = AuctionConfig::new()
            .db_path(":memory:")
            .bind("127.0.0.1", 9000)
            .channel_capacity(0);
        assert!(config.storage_config().is_in_memory());
        assert_eq!(config.server_config().bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.channel_capacity, 1);
    }
}
