//! Lot records: the items put up for auction.

use crate::ids::{BidderId, LotId};
use crate::money::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a lot.
///
/// `Available -> Live -> Sold | Unsold`, and `Unsold -> Available` on requeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotStatus {
    Available,
    Live,
    Sold,
    Unsold,
}

impl LotStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LotStatus::Available => "AVAILABLE",
            LotStatus::Live => "LIVE",
            LotStatus::Sold => "SOLD",
            LotStatus::Unsold => "UNSOLD",
        }
    }
}

impl fmt::Display for LotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(LotStatus::Available),
            "LIVE" => Ok(LotStatus::Live),
            "SOLD" => Ok(LotStatus::Sold),
            "UNSOLD" => Ok(LotStatus::Unsold),
            other => Err(format!("unknown lot status: {other}")),
        }
    }
}

/// A single auctionable item (a player, in the reference domain).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    /// Catalogue sequence number.
    pub id: LotId,
    pub name: String,
    /// Display category (e.g. "Batter", "Bowler").
    pub category: String,
    /// Category-tier (set number). Lower tiers are auctioned first.
    pub tier: u32,
    pub country: String,
    /// Counts toward the overseas cap when owned.
    pub overseas: bool,
    /// Minimum opening bid.
    pub base_price: Amount,
    pub status: LotStatus,
    pub sold_price: Option<Amount>,
    pub sold_to: Option<BidderId>,
}

impl Lot {
    /// Create an AVAILABLE lot.
    pub fn new(id: LotId, name: impl Into<String>, tier: u32, base_price: Amount) -> Self {
        Self {
            id,
            name: name.into(),
            category: String::new(),
            tier,
            country: String::new(),
            overseas: false,
            base_price,
            status: LotStatus::Available,
            sold_price: None,
            sold_to: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the country of origin and the overseas flag.
    pub fn with_country(mut self, country: impl Into<String>, overseas: bool) -> Self {
        self.country = country.into();
        self.overseas = overseas;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_str() {
        for status in [
            LotStatus::Available,
            LotStatus::Live,
            LotStatus::Sold,
            LotStatus::Unsold,
        ] {
            assert_eq!(status.as_str().parse::<LotStatus>().unwrap(), status);
        }
        assert!("GONE".parse::<LotStatus>().is_err());
    }

    #[test]
    fn test_lot_builder() {
        let lot = Lot::new(LotId(3), "A. Batter", 1, Amount::units(2))
            .with_category("Batter")
            .with_country("Australia", true);

        assert_eq!(lot.status, LotStatus::Available);
        assert!(lot.overseas);
    }
}
