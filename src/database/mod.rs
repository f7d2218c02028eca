//! Database module
//!
//! This module holds the database side of the migration engine:
//!
//! ```text
//! database/
//! └── core/           # Foundation
//!     ├── connection  # SQLite DatabaseConn wrapper
//!     ├── handle      # DatabaseHandle capability trait
//!     └── tracking    # Tracking table of applied migrations
//! ```
//!
//! The migration manager is generic over [`DatabaseHandle`], which is
//! implemented for [`DatabaseConn`] and for a bare `rusqlite::Connection`.

pub mod core;

pub use core::{
    quote_ident, DatabaseConn, DatabaseHandle, MigrationRecord, TrackingTable,
    DEFAULT_BUSY_TIMEOUT, DEFAULT_TRACKING_TABLE,
};
