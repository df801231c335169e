//! Bidder records: the teams competing for lots.

use crate::ids::{BidderId, LotId};
use crate::money::Amount;
use serde::{Deserialize, Serialize};

/// A participating team with a budget and a roster.
///
/// `remaining_budget = total_budget - total_spent`, `roster_size = owned.len()`
/// and `overseas_count` counts the overseas lots in `owned`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bidder {
    pub id: BidderId,
    pub name: String,
    pub total_budget: Amount,
    pub remaining_budget: Amount,
    pub roster_size: u32,
    pub overseas_count: u32,
    pub total_spent: Amount,
    /// Owned lots in purchase order.
    pub owned: Vec<LotId>,
}

impl Bidder {
    /// Create a bidder with an untouched budget and an empty roster.
    pub fn new(id: impl Into<BidderId>, name: impl Into<String>, total_budget: Amount) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            total_budget,
            remaining_budget: total_budget,
            roster_size: 0,
            overseas_count: 0,
            total_spent: Amount::ZERO,
            owned: Vec::new(),
        }
    }

    pub fn can_afford(&self, amount: Amount) -> bool {
        self.remaining_budget >= amount
    }

    pub fn has_roster_room(&self, roster_cap: u32) -> bool {
        self.roster_size < roster_cap
    }

    pub fn has_overseas_room(&self, overseas_cap: u32) -> bool {
        self.overseas_count < overseas_cap
    }

    /// Check the budget identity.
    pub fn is_balanced(&self) -> bool {
        self.remaining_budget == self.total_budget - self.total_spent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bidder_is_balanced() {
        let bidder = Bidder::new("CSK", "Chennai", Amount::units(100));
        assert!(bidder.is_balanced());
        assert!(bidder.can_afford(Amount::units(100)));
        assert!(!bidder.can_afford(Amount::from_float(100.05)));
    }

    #[test]
    fn test_caps() {
        let mut bidder = Bidder::new("MI", "Mumbai", Amount::units(100));
        bidder.roster_size = 25;
        bidder.overseas_count = 7;
        assert!(!bidder.has_roster_room(25));
        assert!(bidder.has_overseas_room(8));
    }
}
