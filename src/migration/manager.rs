//! Migration manager
//!
//! The manager owns a database handle for the duration of a run and drives a
//! caller-ordered list of migrations through it:
//!
//! ```text
//! Pending --> Applying --> Applied --> Reverting --> Reverted
//!                 \                        \
//!                  +--> Failed              +--> Failed
//! ```
//!
//! Every migration runs in its own transaction, and its tracking record is
//! written inside that same transaction, so a record exists if and only if the
//! forward statements committed. The caller's list order is never re-sorted.
//!
//! A migration skipped under `CONTINUE_ON_FAILURE` has no record, so the next
//! run picks it up as pending again.

use crate::database::core::{DatabaseHandle, MigrationRecord, TrackingTable, DEFAULT_TRACKING_TABLE};
use crate::error::{MigrationError, Result};
use crate::migration::{Migration, MigrationId, TransformReport};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

bitflags! {
    /// Variant behaviours for a run; the empty set is fail-fast
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MigrateFlags: u32 {
        /// Skip a failed migration and keep going instead of aborting
        const CONTINUE_ON_FAILURE = 1 << 0;
        /// Compute and report without executing anything
        const DRY_RUN = 1 << 1;
    }
}

/// Construction parameters for a [`MigrationManager`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    pub tracking_table: String,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            tracking_table: DEFAULT_TRACKING_TABLE.to_string(),
        }
    }
}

/// A migration that failed but was tolerated by `CONTINUE_ON_FAILURE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedMigration {
    pub identity: MigrationId,
    pub name: String,
    pub statement: Option<String>,
    pub error: String,
}

/// Result of a `migrate` run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateReport {
    /// Identities that were pending when the run started, in execution order
    pub pending: Vec<MigrationId>,
    pub applied: Vec<MigrationRecord>,
    pub failed: Vec<FailedMigration>,
    pub dry_run: bool,
}

impl MigrateReport {
    /// Whether the whole pending set applied without failures
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of a rollback run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackReport {
    /// Reverted identities, newest first
    pub reverted: Vec<MigrationId>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationState {
    Pending,
    Applied,
    /// Recorded as applied but absent from the supplied list
    Orphaned,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationState::Pending => write!(f, "pending"),
            MigrationState::Applied => write!(f, "applied"),
            MigrationState::Orphaned => write!(f, "orphaned"),
        }
    }
}

/// Per-migration view combining the supplied list and the tracking table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub identity: MigrationId,
    pub name: String,
    pub state: MigrationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<String>,
    pub reversible: bool,
}

/// Applies and reverts migrations against an exclusively held handle
pub struct MigrationManager<H: DatabaseHandle> {
    handle: H,
    options: ManagerOptions,
}

impl<H: DatabaseHandle> MigrationManager<H> {
    pub fn new(handle: H) -> Self {
        Self::with_options(handle, ManagerOptions::default())
    }

    pub fn with_options(handle: H, options: ManagerOptions) -> Self {
        Self { handle, options }
    }

    pub fn tracking_table(&self) -> &str {
        &self.options.tracking_table
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Give the handle back to the caller
    pub fn into_inner(self) -> H {
        self.handle
    }

    fn tracking(&self) -> TrackingTable<'_> {
        TrackingTable::new(&self.handle, &self.options.tracking_table)
    }

    /// Records in application order; empty if the tracking table was never created
    pub fn applied_records(&self) -> Result<Vec<MigrationRecord>> {
        let tracking = self.tracking();
        if !tracking.exists()? {
            return Ok(Vec::new());
        }
        tracking.verify()?;
        tracking.records()
    }

    /// Migrations from `migrations` that have no record yet, in list order
    pub fn pending<'m>(&self, migrations: &'m [Migration]) -> Result<Vec<&'m Migration>> {
        check_identities(migrations)?;
        let applied: HashSet<MigrationId> = self
            .applied_records()?
            .into_iter()
            .map(|r| r.identity)
            .collect();

        Ok(migrations
            .iter()
            .filter(|m| !applied.contains(&m.id()))
            .collect())
    }

    /// Apply every pending migration, in the order supplied
    ///
    /// Fail-fast by default: the first failure rolls back that migration and
    /// is returned as `StatementExecutionFailed`; everything committed before
    /// it stays recorded. With `CONTINUE_ON_FAILURE` statement failures are
    /// collected in the report instead.
    pub fn migrate(&mut self, migrations: &[Migration], flags: MigrateFlags) -> Result<MigrateReport> {
        let dry_run = flags.contains(MigrateFlags::DRY_RUN);
        let continue_on_failure = flags.contains(MigrateFlags::CONTINUE_ON_FAILURE);

        check_identities(migrations)?;
        if !dry_run {
            self.tracking().ensure()?;
        }
        let pending = self.pending(migrations)?;

        let mut report = MigrateReport {
            pending: pending.iter().map(|m| m.id()).collect(),
            dry_run,
            ..Default::default()
        };

        if pending.is_empty() {
            info!("No pending migrations");
            return Ok(report);
        }
        if dry_run {
            info!("Dry run: {} migration(s) pending", pending.len());
            return Ok(report);
        }

        for migration in pending {
            match self.apply_one(migration) {
                Ok(record) => report.applied.push(record),
                Err(e @ MigrationError::StatementExecutionFailed { .. }) if continue_on_failure => {
                    warn!("Skipping failed migration {}: {}", migration.id(), e);
                    report.failed.push(FailedMigration::from_error(migration, &e));
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Applied {} migration(s), {} failed",
            report.applied.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Revert the `steps` most recently applied migrations, newest first
    pub fn rollback(
        &mut self,
        migrations: &[Migration],
        steps: usize,
        flags: MigrateFlags,
    ) -> Result<RollbackReport> {
        let records = self.applied_records()?;
        let targets: Vec<MigrationId> = records
            .iter()
            .rev()
            .take(steps)
            .map(|r| r.identity)
            .collect();
        self.revert(migrations, targets, flags)
    }

    /// Revert every applied migration, newest first
    pub fn rollback_all(&mut self, migrations: &[Migration], flags: MigrateFlags) -> Result<RollbackReport> {
        let records = self.applied_records()?;
        let targets: Vec<MigrationId> = records.iter().rev().map(|r| r.identity).collect();
        self.revert(migrations, targets, flags)
    }

    /// Revert everything applied after `target`, leaving `target` itself applied
    pub fn rollback_to(
        &mut self,
        migrations: &[Migration],
        target: MigrationId,
        flags: MigrateFlags,
    ) -> Result<RollbackReport> {
        let records = self.applied_records()?;
        let position = records
            .iter()
            .position(|r| r.identity == target)
            .ok_or(MigrationError::UnknownMigration { identity: target })?;

        let targets: Vec<MigrationId> = records[position + 1..]
            .iter()
            .rev()
            .map(|r| r.identity)
            .collect();
        self.revert(migrations, targets, flags)
    }

    /// Status of every supplied migration, followed by orphaned records
    pub fn status(&self, migrations: &[Migration]) -> Result<Vec<MigrationStatus>> {
        let records = self.applied_records()?;
        let applied: HashMap<MigrationId, &MigrationRecord> =
            records.iter().map(|r| (r.identity, r)).collect();
        let supplied: HashSet<MigrationId> = migrations.iter().map(|m| m.id()).collect();

        let mut statuses: Vec<MigrationStatus> = migrations
            .iter()
            .map(|m| {
                let record = applied.get(&m.id());
                MigrationStatus {
                    identity: m.id(),
                    name: m.name().to_string(),
                    state: if record.is_some() {
                        MigrationState::Applied
                    } else {
                        MigrationState::Pending
                    },
                    applied_at: record.map(|r| r.applied_at.clone()),
                    reversible: m.is_reversible(),
                }
            })
            .collect();

        statuses.extend(
            records
                .iter()
                .filter(|r| !supplied.contains(&r.identity))
                .map(|r| MigrationStatus {
                    identity: r.identity,
                    name: r.name.clone(),
                    state: MigrationState::Orphaned,
                    applied_at: Some(r.applied_at.clone()),
                    reversible: false,
                }),
        );

        Ok(statuses)
    }

    fn revert(
        &mut self,
        migrations: &[Migration],
        targets: Vec<MigrationId>,
        flags: MigrateFlags,
    ) -> Result<RollbackReport> {
        check_identities(migrations)?;
        let by_id: HashMap<MigrationId, &Migration> =
            migrations.iter().map(|m| (m.id(), m)).collect();

        let dry_run = flags.contains(MigrateFlags::DRY_RUN);
        let mut report = RollbackReport {
            dry_run,
            ..Default::default()
        };

        for identity in targets {
            let migration = by_id
                .get(&identity)
                .copied()
                .ok_or(MigrationError::UnknownMigration { identity })?;

            if !migration.is_reversible() {
                warn!(
                    "Rollback stopped at migration {} ({}): no down transform",
                    identity,
                    migration.name()
                );
                return Err(MigrationError::UnsupportedRollback { identity });
            }

            if !dry_run {
                self.revert_one(migration)?;
            }
            report.reverted.push(identity);
        }

        info!("Reverted {} migration(s)", report.reverted.len());
        Ok(report)
    }

    fn apply_one(&self, migration: &Migration) -> Result<MigrationRecord> {
        info!("Applying migration {} ({})", migration.id(), migration.name());
        self.handle.begin()?;

        let TransformReport { attempted, outcome } = migration.up(&self.handle);
        let result = match outcome {
            Ok(()) => self.tracking().insert(migration.id(), migration.name()),
            Err(failure) => Err(failure.into_error(migration.id())),
        };

        match result {
            Ok(record) => {
                self.commit()?;
                debug!(
                    "Migration {} committed after {} statement(s)",
                    migration.id(),
                    attempted.len()
                );
                Ok(record)
            }
            Err(e) => {
                self.abort();
                Err(e)
            }
        }
    }

    fn revert_one(&self, migration: &Migration) -> Result<()> {
        info!("Reverting migration {} ({})", migration.id(), migration.name());
        self.handle.begin()?;

        let result = migration.down(&self.handle).and_then(|report| {
            let TransformReport { attempted, outcome } = report;
            outcome.map_err(|failure| failure.into_error(migration.id()))?;
            debug!(
                "Migration {} reverted with {} statement(s)",
                migration.id(),
                attempted.len()
            );
            self.tracking().remove(migration.id()).map(|_| ())
        });

        match result {
            Ok(()) => self.commit(),
            Err(e) => {
                self.abort();
                Err(e)
            }
        }
    }

    fn commit(&self) -> Result<()> {
        if let Err(e) = self.handle.commit() {
            self.abort();
            return Err(e.into());
        }
        Ok(())
    }

    fn abort(&self) {
        if let Err(e) = self.handle.rollback() {
            warn!("Failed to roll back transaction: {}", e);
        }
    }
}

impl FailedMigration {
    fn from_error(migration: &Migration, error: &MigrationError) -> Self {
        let statement = match error {
            MigrationError::StatementExecutionFailed { statement, .. } => Some(statement.clone()),
            _ => None,
        };
        let error = match error {
            MigrationError::StatementExecutionFailed { source, .. } => source.to_string(),
            other => other.to_string(),
        };
        Self {
            identity: migration.id(),
            name: migration.name().to_string(),
            statement,
            error,
        }
    }
}

/// Reject identities the tracking table cannot store, and lists in which two
/// migrations share an identity
fn check_identities(migrations: &[Migration]) -> Result<()> {
    let mut seen = HashSet::with_capacity(migrations.len());
    for migration in migrations {
        if !migration.id().in_range() {
            return Err(MigrationError::IdentityOutOfRange {
                identity: migration.id(),
            });
        }
        if !seen.insert(migration.id()) {
            return Err(MigrationError::OrderingViolation {
                identity: migration.id(),
            });
        }
    }
    Ok(())
}
