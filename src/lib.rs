#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Stepwise - ordered, versioned schema migrations for SQLite
//!
//! Stepwise applies and reverts schema changes in a caller-defined order,
//! recording every applied migration in a tracking table so repeated runs are
//! idempotent. Each migration runs in its own transaction together with its
//! tracking record, so a migration is recorded if and only if it committed.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | The `stepwise` binary | All above + `clap`, `tracing-subscriber` |
//!
//! ```toml
//! # Library only
//! stepwise = { version = "0.1", default-features = false }
//! ```
//!
//! # Architecture
//!
//! - **[`migration`]**: the engine
//!   - `ddl`: schema intents to forward/reverse SQL
//!   - `Migration`: identity plus up and optional down transform
//!   - `MigrationManager`: fail-fast, per-migration transactional apply and rollback
//!   - `source`: raw-SQL migrations loaded from a directory
//! - **[`database`]**: SQLite connection, `DatabaseHandle` trait, tracking table
//! - **[`config`]**: Configuration management
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use stepwise::{ddl, DatabaseConn, MigrateFlags, MigrationManager, MigrationPlan};
//!
//! let migrations = MigrationPlan::new()
//!     .push(ddl::create_table("users", "id"))
//!     .push(ddl::add_column("email", "TEXT", "users"))
//!     .sql("INSERT INTO users (email) VALUES ('admin@example.com')")
//!     .build();
//!
//! let db = DatabaseConn::open_path("app.sqlite3")?;
//! let mut manager = MigrationManager::new(db);
//!
//! let report = manager.migrate(&migrations, MigrateFlags::empty())?;
//! println!("applied {} migration(s)", report.applied.len());
//!
//! // a second run finds nothing pending
//! assert!(manager.migrate(&migrations, MigrateFlags::empty())?.pending.is_empty());
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod migration;
pub mod output;

// =============================================================================
// Configuration
// =============================================================================

pub use config::{format_size, get_database_info, DatabaseInfo, StepwiseConfig};

// =============================================================================
// Database
// =============================================================================

pub use database::{DatabaseConn, DatabaseHandle, MigrationRecord, DEFAULT_TRACKING_TABLE};

// =============================================================================
// Migration engine
// =============================================================================

pub use error::MigrationError;
pub use migration::{
    ddl, load_directory, DdlOperation, FailedMigration, ManagerOptions, MigrateFlags,
    MigrateReport, Migration, MigrationId, MigrationManager, MigrationPlan, MigrationState,
    MigrationStatus, RollbackReport, StatementFailure, StatementRunner,
};

pub use output::OutputFormat;
