//! Migration engine
//!
//! - **definition**: `Migration`, its identity and the statement runner transforms use
//! - **ddl**: builders translating schema intents into forward and reverse SQL
//! - **plan**: ordered lists with sequential identities
//! - **manager**: applies and reverts migrations against a database, one transaction each
//! - **source**: loads raw-SQL migrations from a directory
//!
//! # Usage
//!
//! ```rust,ignore
//! use stepwise::database::DatabaseConn;
//! use stepwise::migration::{ddl, MigrateFlags, MigrationManager, MigrationPlan};
//!
//! let migrations = MigrationPlan::new()
//!     .push(ddl::create_table("users", "id"))
//!     .push(ddl::add_column("email", "TEXT", "users"))
//!     .build();
//!
//! let mut manager = MigrationManager::new(DatabaseConn::open_path("app.sqlite3")?);
//! let report = manager.migrate(&migrations, MigrateFlags::empty())?;
//! assert!(report.is_clean());
//!
//! // undo the email column
//! manager.rollback(&migrations, 1, MigrateFlags::empty())?;
//! ```

pub mod ddl;
mod definition;
mod manager;
mod plan;
pub mod source;

pub use ddl::DdlOperation;
pub use definition::{
    Migration, MigrationId, StatementFailure, StatementRunner, Transform, TransformReport,
};
pub use manager::{
    FailedMigration, ManagerOptions, MigrateFlags, MigrateReport, MigrationManager,
    MigrationState, MigrationStatus, RollbackReport,
};
pub use plan::MigrationPlan;
pub use source::load_directory;
