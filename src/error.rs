//! Error types for the migration engine

use crate::migration::MigrationId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MigrationError>;

#[derive(Error, Debug)]
pub enum MigrationError {
    /// A forward or reverse statement failed inside a migration transaction
    #[error("migration {identity} failed on statement `{statement}`: {source}")]
    StatementExecutionFailed {
        identity: MigrationId,
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A reversal was requested for a migration without a down transform
    #[error("migration {identity} cannot be rolled back: no down transform")]
    UnsupportedRollback { identity: MigrationId },

    #[error("tracking table '{table}' is corrupt: {reason}")]
    TrackingTableCorrupt { table: String, reason: String },

    /// The identity is already recorded, or appears twice in the supplied list
    #[error("migration identity {identity} is not unique")]
    OrderingViolation { identity: MigrationId },

    /// The identity does not fit the tracking table's integer column
    #[error("migration identity {identity} is out of range (maximum {max})", max = MigrationId::MAX)]
    IdentityOutOfRange { identity: MigrationId },

    /// A rollback reached an identity with no definition, or targeted one never applied
    #[error("migration {identity} is not among the supplied and applied migrations")]
    UnknownMigration { identity: MigrationId },

    #[error("invalid migration source '{path}': {reason}")]
    Source { path: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl MigrationError {
    /// Identity of the migration the error is about, when there is one
    pub fn identity(&self) -> Option<MigrationId> {
        match self {
            Self::StatementExecutionFailed { identity, .. }
            | Self::UnsupportedRollback { identity }
            | Self::OrderingViolation { identity }
            | Self::IdentityOutOfRange { identity }
            | Self::UnknownMigration { identity } => Some(*identity),
            Self::TrackingTableCorrupt { .. } | Self::Source { .. } | Self::Database(_) => None,
        }
    }
}
