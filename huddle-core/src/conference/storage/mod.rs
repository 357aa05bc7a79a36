//! Persistent storage for conference documents

pub mod migrations;
mod sql_store;

pub use sql_store::ConferenceSqlStore;
