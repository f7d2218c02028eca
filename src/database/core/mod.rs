//! Core database infrastructure
//!
//! This module provides the foundational database components the migration engine runs on:
//! - `DatabaseHandle`: the capability set the manager needs from a connection
//! - `DatabaseConn`: Core SQLite connection wrapper with configuration
//! - `TrackingTable`: bookkeeping of applied migrations

mod connection;
mod handle;
mod tracking;

pub use connection::{quote_ident, DatabaseConn, DEFAULT_BUSY_TIMEOUT};
pub use handle::DatabaseHandle;
pub use tracking::{MigrationRecord, TrackingTable, DEFAULT_TRACKING_TABLE};
