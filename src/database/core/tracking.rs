//! Tracking table bookkeeping
//!
//! The tracking table holds one row per applied migration. A row's presence is
//! the only thing that marks a migration as applied; rows are read back in
//! insertion order, which is the order migrations were applied in.

use crate::database::core::{quote_ident, DatabaseHandle};
use crate::error::{MigrationError, Result};
use crate::migration::MigrationId;
use chrono::{SecondsFormat, Utc};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// Default tracking table name
pub const DEFAULT_TRACKING_TABLE: &str = "__stepwise_migrations";

/// Columns the tracking table must carry
const REQUIRED_COLUMNS: [&str; 3] = ["identity", "name", "applied_at"];

/// A persisted row of the tracking table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct MigrationRecord {
    pub identity: MigrationId,
    pub name: String,
    pub applied_at: String,
}

/// Accessor for the tracking table of one database
pub struct TrackingTable<'a> {
    handle: &'a dyn DatabaseHandle,
    table: &'a str,
}

impl<'a> TrackingTable<'a> {
    pub fn new(handle: &'a dyn DatabaseHandle, table: &'a str) -> Self {
        Self { handle, table }
    }

    pub fn name(&self) -> &str {
        self.table
    }

    /// Create the table if it doesn't exist, then verify its layout
    pub fn ensure(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                identity INTEGER NOT NULL UNIQUE,
                name TEXT NOT NULL DEFAULT '',
                applied_at TEXT NOT NULL
            )",
            quote_ident(self.table)
        );
        self.handle.execute(&sql)?;
        self.verify()
    }

    /// Check that every expected column is present
    pub fn verify(&self) -> Result<()> {
        let columns = self
            .handle
            .column_names(self.table)
            .map_err(|e| self.corrupt(format!("unable to read layout: {}", e)))?;

        if columns.is_empty() {
            return Err(self.corrupt("table does not exist".to_string()));
        }

        for required in REQUIRED_COLUMNS {
            if !columns.iter().any(|c| c == required) {
                return Err(self.corrupt(format!("missing column '{}'", required)));
            }
        }
        Ok(())
    }

    /// Whether the table has been created yet
    pub fn exists(&self) -> Result<bool> {
        Ok(self.handle.table_exists(self.table)?)
    }

    /// All records, in the order they were applied
    pub fn records(&self) -> Result<Vec<MigrationRecord>> {
        let sql = format!(
            "SELECT identity, name, applied_at FROM {} ORDER BY rowid",
            quote_ident(self.table)
        );
        let rows = self
            .handle
            .query_rows(&sql, &[])
            .map_err(|e| self.corrupt(format!("unable to read records: {}", e)))?;

        rows.into_iter().map(|row| self.parse_row(row)).collect()
    }

    /// Insert a record for `identity`, stamped with the current time
    ///
    /// A uniqueness failure surfaces as `OrderingViolation`.
    pub fn insert(&self, identity: MigrationId, name: &str) -> Result<MigrationRecord> {
        let applied_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let sql = format!(
            "INSERT INTO {} (identity, name, applied_at) VALUES (?1, ?2, ?3)",
            quote_ident(self.table)
        );
        let raw = stored_identity(identity)?;

        match self
            .handle
            .execute_with_params(&sql, &[&raw, &name, &applied_at])
        {
            Ok(_) => Ok(MigrationRecord {
                identity,
                name: name.to_string(),
                applied_at,
            }),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(MigrationError::OrderingViolation { identity })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the record for `identity`, returning whether one existed
    pub fn remove(&self, identity: MigrationId) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE identity = ?1", quote_ident(self.table));
        let raw = stored_identity(identity)?;
        let changed = self.handle.execute_with_params(&sql, &[&raw])?;
        Ok(changed > 0)
    }

    fn parse_row(&self, row: Vec<Value>) -> Result<MigrationRecord> {
        let mut values = row.into_iter();
        let identity = match values.next() {
            Some(Value::Integer(v)) if v >= 0 => MigrationId::new(v as u64),
            other => {
                return Err(self.corrupt(format!("invalid identity value {:?}", other)));
            }
        };
        let name = match values.next() {
            Some(Value::Text(v)) => v,
            Some(Value::Null) | None => String::new(),
            other => {
                return Err(self.corrupt(format!(
                    "invalid name for migration {}: {:?}",
                    identity, other
                )));
            }
        };
        let applied_at = match values.next() {
            Some(Value::Text(v)) => v,
            other => {
                return Err(self.corrupt(format!(
                    "invalid applied_at for migration {}: {:?}",
                    identity, other
                )));
            }
        };

        Ok(MigrationRecord {
            identity,
            name,
            applied_at,
        })
    }

    fn corrupt(&self, reason: String) -> MigrationError {
        MigrationError::TrackingTableCorrupt {
            table: self.table.to_string(),
            reason,
        }
    }
}

fn stored_identity(identity: MigrationId) -> Result<i64> {
    identity
        .as_i64()
        .ok_or(MigrationError::IdentityOutOfRange { identity })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::DatabaseConn;

    #[test]
    fn test_ensure_creates_table() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let tracking = TrackingTable::new(&db, DEFAULT_TRACKING_TABLE);

        assert!(!tracking.exists().unwrap());
        tracking.ensure().unwrap();
        assert!(tracking.exists().unwrap());

        // idempotent
        tracking.ensure().unwrap();
        assert!(tracking.records().unwrap().is_empty());
    }

    #[test]
    fn test_insert_and_records_order() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let tracking = TrackingTable::new(&db, DEFAULT_TRACKING_TABLE);
        tracking.ensure().unwrap();

        tracking.insert(MigrationId::new(20), "second").unwrap();
        tracking.insert(MigrationId::new(3), "first").unwrap();

        let ids: Vec<u64> = tracking
            .records()
            .unwrap()
            .iter()
            .map(|r| r.identity.value())
            .collect();
        assert_eq!(ids, vec![20, 3]);
    }

    #[test]
    fn test_duplicate_insert_is_ordering_violation() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let tracking = TrackingTable::new(&db, DEFAULT_TRACKING_TABLE);
        tracking.ensure().unwrap();

        tracking.insert(MigrationId::new(1), "one").unwrap();
        let err = tracking.insert(MigrationId::new(1), "again").unwrap_err();
        assert!(matches!(
            err,
            MigrationError::OrderingViolation { identity } if identity == MigrationId::new(1)
        ));
    }

    #[test]
    fn test_remove() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let tracking = TrackingTable::new(&db, DEFAULT_TRACKING_TABLE);
        tracking.ensure().unwrap();

        tracking.insert(MigrationId::new(1), "one").unwrap();
        assert!(tracking.remove(MigrationId::new(1)).unwrap());
        assert!(!tracking.remove(MigrationId::new(1)).unwrap());
        assert!(tracking.records().unwrap().is_empty());
    }

    #[test]
    fn test_missing_column_is_corrupt() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE custom_tracking (version INTEGER, applied_at TEXT)")
            .unwrap();

        let tracking = TrackingTable::new(&db, "custom_tracking");
        let err = tracking.ensure().unwrap_err();
        match err {
            MigrationError::TrackingTableCorrupt { table, reason } => {
                assert_eq!(table, "custom_tracking");
                assert!(reason.contains("identity"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_row_is_corrupt() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let tracking = TrackingTable::new(&db, DEFAULT_TRACKING_TABLE);
        tracking.ensure().unwrap();
        db.execute(
            "INSERT INTO __stepwise_migrations (identity, name, applied_at) VALUES ('abc', 'x', 'now')",
        )
        .unwrap();

        assert!(matches!(
            tracking.records().unwrap_err(),
            MigrationError::TrackingTableCorrupt { .. }
        ));
    }

    #[test]
    fn test_identity_bounds() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let tracking = TrackingTable::new(&db, DEFAULT_TRACKING_TABLE);
        tracking.ensure().unwrap();

        tracking.insert(MigrationId::MAX, "last").unwrap();
        assert_eq!(tracking.records().unwrap()[0].identity, MigrationId::MAX);
        assert!(tracking.remove(MigrationId::MAX).unwrap());

        let too_big = MigrationId::new(u64::MAX);
        assert!(matches!(
            tracking.insert(too_big, "big").unwrap_err(),
            MigrationError::IdentityOutOfRange { .. }
        ));
        assert!(tracking.records().unwrap().is_empty());
    }
}
