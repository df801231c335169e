//! Engine configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration as StdDuration;

/// What happens to a turn whose settlement failed an integrity check.
///
/// Either way the failed settlement is rolled back and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityPolicy {
    /// Leave the auction in its pre-resolution state for an operator.
    #[default]
    Manual,
    /// Put the lot back in the pool and park the auction in WAITING.
    ReturnLot,
}

impl FromStr for IntegrityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(IntegrityPolicy::Manual),
            "return_lot" | "return-lot" => Ok(IntegrityPolicy::ReturnLot),
            other => Err(format!("unknown integrity policy: {other}")),
        }
    }
}

/// Auction rules and timing.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bidding window, restarted by every accepted bid.
    pub bid_duration: Duration,
    /// How often the timer checks for expiry.
    pub check_interval: StdDuration,
    /// Maximum lots a bidder may own.
    pub roster_cap: u32,
    /// Maximum overseas lots a bidder may own.
    pub overseas_cap: u32,
    pub integrity_policy: IntegrityPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bid_duration: Duration::seconds(30),
            check_interval: StdDuration::from_secs(1),
            roster_cap: 25,
            overseas_cap: 8,
            integrity_policy: IntegrityPolicy::Manual,
        }
    }
}

impl EngineConfig {
    pub fn bid_duration(mut self, duration: Duration) -> Self {
        self.bid_duration = duration;
        self
    }

    pub fn check_interval(mut self, interval: StdDuration) -> Self {
        self.check_interval = interval;
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.bid_duration, Duration::seconds(30));
        assert_eq!(config.check_interval, StdDuration::from_secs(1));
        assert_eq!(config.integrity_policy, IntegrityPolicy::Manual);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::default()
            .roster_cap(3)
            .overseas_cap(1)
            .integrity_policy(IntegrityPolicy::ReturnLot);
        assert_eq!(config.roster_cap, 3);
        assert_eq!(config.overseas_cap, 1);
        assert_eq!(config.integrity_policy, IntegrityPolicy::ReturnLot);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("manual".parse(), Ok(IntegrityPolicy::Manual));
        assert_eq!("return-lot".parse(), Ok(IntegrityPolicy::ReturnLot));
        assert!("retry".parse::<IntegrityPolicy>().is_err());
    }
}
