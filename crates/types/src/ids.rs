//! Core identifier types for the auction.
//!
//! Lots are identified by their catalogue sequence number, bidders by their
//! short team code.

use derive_more::{From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Constants
// =============================================================================

/// Amount scale factor: 10,000 means 4 decimal places.
/// - `10000` = 1.00 unit
/// - `500` = 0.05 unit (smallest bid increment)
pub const AMOUNT_SCALE: i64 = 10_000;

// =============================================================================
// Core ID Types
// =============================================================================

/// Catalogue sequence number of a lot.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    From,
    Into,
)]
#[serde(transparent)]
pub struct LotId(pub u32);

impl fmt::Display for LotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lot#{}", self.0)
    }
}

/// Unique code of a bidding team (e.g. "CSK").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, From)]
#[serde(transparent)]
pub struct BidderId(pub String);

impl BidderId {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BidderId {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl fmt::Display for BidderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Time Types
// =============================================================================

/// Wall clock instant (UTC). Persisted as milliseconds since epoch.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(LotId(7).to_string(), "Lot#7");
        assert_eq!(BidderId::new("MI").to_string(), "MI");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&LotId(12)).unwrap(), "12");
        assert_eq!(
            serde_json::to_string(&BidderId::from("RCB")).unwrap(),
            "\"RCB\""
        );
    }
}
