//! Fixed bidding policy: the increment step function.

use crate::money::Amount;

/// Minimum raise over `current` once a bid exists.
///
/// | current bid | increment |
/// |-------------|-----------|
/// | < 1         | 0.05      |
/// | [1, 2)      | 0.10      |
/// | [2, 5)      | 0.20      |
/// | >= 5        | 0.25      |
pub fn bid_increment(current: Amount) -> Amount {
    if current < Amount::units(1) {
        Amount::cents(5)
    } else if current < Amount::units(2) {
        Amount::cents(10)
    } else if current < Amount::units(5) {
        Amount::cents(20)
    } else {
        Amount::cents(25)
    }
}

/// Lowest acceptable bid for a turn.
///
/// The opening bid may equal the base price; later bids must clear the
/// current bid by one increment.
pub fn minimum_next_bid(base_price: Amount, current_bid: Amount, has_bid: bool) -> Amount {
    if has_bid {
        current_bid + bid_increment(current_bid)
    } else {
        base_price
    }
}
