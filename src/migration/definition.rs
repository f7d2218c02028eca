//! Migration definitions
//!
//! A [`Migration`] is an immutable unit of schema change: an identity, a name,
//! an up transform and an optional down transform. Transforms issue statements
//! through a [`StatementRunner`], which records every statement attempted so a
//! failure can be reported with the exact SQL that broke.
//!
//! Migrations never open or close transactions themselves; the manager wraps
//! each call in one.

use crate::database::core::DatabaseHandle;
use crate::error::MigrationError;
use rusqlite::types::Value;
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Stable ordering key of a migration
///
/// Identities are stored as SQLite integers, so the usable range is
/// `0..=MigrationId::MAX`. Larger values are rejected before a run executes
/// anything.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MigrationId(u64);

impl MigrationId {
    /// Largest identity that round-trips through the tracking table
    pub const MAX: MigrationId = MigrationId(i64::MAX as u64);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The stored integer form, or `None` above [`MigrationId::MAX`]
    pub fn as_i64(&self) -> Option<i64> {
        i64::try_from(self.0).ok()
    }

    pub fn in_range(&self) -> bool {
        *self <= Self::MAX
    }
}

impl From<u64> for MigrationId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MigrationId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| format!("Invalid migration identity '{}': {}", s, e))?;
        if !id.in_range() {
            return Err(format!(
                "Invalid migration identity '{}': larger than {}",
                s,
                Self::MAX
            ));
        }
        Ok(id)
    }
}

/// A statement that failed, with the driver error it produced
#[derive(Debug)]
pub struct StatementFailure {
    pub statement: String,
    pub source: rusqlite::Error,
}

impl StatementFailure {
    /// Attach the migration identity, producing the engine-level error
    pub fn into_error(self, identity: MigrationId) -> MigrationError {
        MigrationError::StatementExecutionFailed {
            identity,
            statement: self.statement,
            source: self.source,
        }
    }
}

impl fmt::Display for StatementFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`: {}", self.statement, self.source)
    }
}

/// Executes statements on behalf of a transform and records what was attempted
pub struct StatementRunner<'a> {
    handle: &'a dyn DatabaseHandle,
    attempted: Vec<String>,
}

impl<'a> StatementRunner<'a> {
    pub fn new(handle: &'a dyn DatabaseHandle) -> Self {
        Self {
            handle,
            attempted: Vec::new(),
        }
    }

    /// Execute a single statement
    pub fn execute(&mut self, sql: &str) -> Result<usize, StatementFailure> {
        self.record(sql);
        self.handle.execute(sql).map_err(|source| StatementFailure {
            statement: sql.to_string(),
            source,
        })
    }

    /// Execute a single statement with positional parameters
    pub fn execute_with_params(
        &mut self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<usize, StatementFailure> {
        self.record(sql);
        self.handle
            .execute_with_params(sql, params)
            .map_err(|source| StatementFailure {
                statement: sql.to_string(),
                source,
            })
    }

    /// Execute one or more `;`-separated statements
    pub fn execute_batch(&mut self, sql: &str) -> Result<(), StatementFailure> {
        self.record(sql);
        self.handle
            .execute_batch(sql)
            .map_err(|source| StatementFailure {
                statement: sql.to_string(),
                source,
            })
    }

    /// Read rows without recording the query as an attempted statement
    pub fn query_rows(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<Vec<Value>>, StatementFailure> {
        self.handle
            .query_rows(sql, params)
            .map_err(|source| StatementFailure {
                statement: sql.to_string(),
                source,
            })
    }

    pub fn handle(&self) -> &dyn DatabaseHandle {
        self.handle
    }

    /// Statements attempted so far, in order
    pub fn attempted(&self) -> &[String] {
        &self.attempted
    }

    pub fn into_attempted(self) -> Vec<String> {
        self.attempted
    }

    fn record(&mut self, sql: &str) {
        debug!("executing statement: {}", sql);
        self.attempted.push(sql.to_string());
    }
}

/// Forward or reverse transformation of a migration
pub type Transform =
    Box<dyn Fn(&mut StatementRunner<'_>) -> Result<(), StatementFailure> + Send + Sync>;

/// Outcome of running one transform
#[derive(Debug)]
pub struct TransformReport {
    /// Every statement attempted, including the failing one
    pub attempted: Vec<String>,
    pub outcome: Result<(), StatementFailure>,
}

impl TransformReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// One versioned unit of schema change
pub struct Migration {
    id: MigrationId,
    name: String,
    up: Transform,
    down: Option<Transform>,
}

impl Migration {
    /// Create an irreversible migration from an up transform
    pub fn new<F>(id: u64, name: impl Into<String>, up: F) -> Self
    where
        F: Fn(&mut StatementRunner<'_>) -> Result<(), StatementFailure> + Send + Sync + 'static,
    {
        Self {
            id: MigrationId::new(id),
            name: name.into(),
            up: Box::new(up),
            down: None,
        }
    }

    /// Attach a down transform, making the migration reversible
    pub fn with_down<F>(mut self, down: F) -> Self
    where
        F: Fn(&mut StatementRunner<'_>) -> Result<(), StatementFailure> + Send + Sync + 'static,
    {
        self.down = Some(Box::new(down));
        self
    }

    /// Raw SQL migration without a reverse
    pub fn sql(id: u64, name: impl Into<String>, up_sql: impl Into<String>) -> Self {
        let up_sql = up_sql.into();
        Self::new(id, name, move |runner| runner.execute_batch(&up_sql))
    }

    /// Raw SQL migration with an explicit reverse
    pub fn sql_reversible(
        id: u64,
        name: impl Into<String>,
        up_sql: impl Into<String>,
        down_sql: impl Into<String>,
    ) -> Self {
        let down_sql = down_sql.into();
        Self::sql(id, name, up_sql).with_down(move |runner| runner.execute_batch(&down_sql))
    }

    pub fn id(&self) -> MigrationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_reversible(&self) -> bool {
        self.down.is_some()
    }

    /// Run the up transform against `handle`
    pub fn up(&self, handle: &dyn DatabaseHandle) -> TransformReport {
        run_transform(&self.up, handle)
    }

    /// Run the down transform against `handle`
    ///
    /// Fails with `UnsupportedRollback` before touching the database when the
    /// migration has no down transform.
    pub fn down(&self, handle: &dyn DatabaseHandle) -> Result<TransformReport, MigrationError> {
        match &self.down {
            Some(down) => Ok(run_transform(down, handle)),
            None => Err(MigrationError::UnsupportedRollback { identity: self.id }),
        }
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("reversible", &self.is_reversible())
            .finish()
    }
}

fn run_transform(transform: &Transform, handle: &dyn DatabaseHandle) -> TransformReport {
    let mut runner = StatementRunner::new(handle);
    let outcome = transform(&mut runner);
    TransformReport {
        attempted: runner.into_attempted(),
        outcome,
    }
}
