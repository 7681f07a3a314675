//! SQLite storage for the Waypost relay.
//!
//! Persists users, machines, and sessions.

mod db;
mod models;
mod queries;

#[cfg(test)]
mod tests;

pub use db::{unix_timestamp_ms, DatabaseError, RelayDatabase};
pub use models::*;
