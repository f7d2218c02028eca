//! Ordered migration plans with sequential identities

use crate::migration::ddl::{self, DdlOperation};
use crate::migration::{Migration, MigrationId};

/// Builds an ordered migration list, numbering entries as they are pushed
///
/// ```rust,ignore
/// use stepwise::migration::{ddl, MigrationPlan};
///
/// let migrations = MigrationPlan::new()
///     .push(ddl::create_table("users", "id"))
///     .push(ddl::add_column("email", "TEXT", "users"))
///     .sql("CREATE INDEX idx_users_email ON users(email)")
///     .build();
/// ```
pub struct MigrationPlan {
    next: u64,
    migrations: Vec<Migration>,
}

impl Default for MigrationPlan {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationPlan {
    /// Start numbering at 1
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Start numbering at `first`, e.g. to continue an existing sequence
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: first,
            migrations: Vec::new(),
        }
    }

    /// Identity the next pushed entry will receive
    pub fn next_id(&self) -> MigrationId {
        MigrationId::new(self.next)
    }

    pub fn push(self, op: DdlOperation) -> Self {
        self.custom(|id| op.into_migration(id))
    }

    pub fn push_named(self, op: DdlOperation, name: &str) -> Self {
        self.custom(|id| op.into_named_migration(id, name))
    }

    /// Append raw SQL
    pub fn sql(self, sql: &str) -> Self {
        self.push(ddl::execute_sql(sql))
    }

    /// Append a hand-built migration; `build` receives the assigned identity
    pub fn custom<F>(mut self, build: F) -> Self
    where
        F: FnOnce(u64) -> Migration,
    {
        let id = self.next;
        self.next += 1;
        self.migrations.push(build(id));
        self
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn build(self) -> Vec<Migration> {
        self.migrations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let migrations = MigrationPlan::new()
            .push(ddl::create_table("users", "id"))
            .push(ddl::add_column("email", "TEXT", "users"))
            .sql("CREATE INDEX idx_users_email ON users(email)")
            .build();

        let ids: Vec<u64> = migrations.iter().map(|m| m.id().value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(migrations[0].name(), "create_table_users");
        assert!(!migrations[2].is_reversible());
    }

    #[test]
    fn test_starting_at_and_custom() {
        let plan = MigrationPlan::starting_at(100)
            .push_named(ddl::drop_table("legacy"), "remove_legacy")
            .custom(|id| {
                Migration::sql_reversible(id, "seed", "CREATE TABLE s (x INTEGER)", "DROP TABLE s")
            });

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.next_id(), MigrationId::new(102));

        let migrations = plan.build();
        assert_eq!(migrations[0].name(), "remove_legacy");
        assert_eq!(migrations[1].id(), MigrationId::new(101));
        assert!(migrations[1].is_reversible());
    }
}
