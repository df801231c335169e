//! Storage layer for the auction house.
//!
//! **Philosophy:** Declarative, Modular, SoC
//! - Declarative: Schema defined upfront, one table per record type
//! - Modular: The engine sees typed operations, never SQL
//! - SoC: This crate ONLY handles persistence, no auction rules
//!
//! Every write that depends on a previously read value re-asserts that value
//! in its `WHERE` clause. An update that matches zero rows means another
//! writer got there first; callers decide whether that is a rejection or a
//! no-op. Multi-record settlement runs inside [`AuctionStore::transaction`].

mod error;
mod rows;
mod schema;
mod sessions;
mod store;
mod tx;

pub use error::{StoreError, StoreResult};
pub use schema::StorageConfig;
pub use sessions::SessionDirectory;
pub use store::{AuctionStore, BidCommit};
pub use tx::StoreTx;
