pub mod models;
pub mod query;
pub mod store;

#[cfg(test)]
pub mod memory;

pub use store::{MySqlStore, TradeStore};
