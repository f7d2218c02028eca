//! DDL builder
//!
//! Helpers that turn a schema intent into forward SQL and, when the forward
//! arguments fully determine the inverse, reverse SQL. Only create, rename and
//! add-column operations are reversible; drops and raw SQL discard information
//! needed to undo them, so they carry no down transform.
//!
//! ```rust,ignore
//! use stepwise::migration::ddl;
//!
//! let migrations = vec![
//!     ddl::create_table("users", "id").into_migration(1),
//!     ddl::add_column("email", "TEXT", "users").into_migration(2),
//! ];
//! ```

use crate::database::core::quote_ident;
use crate::migration::{Migration, StatementFailure, StatementRunner};

/// A schema change expressed as intent rather than SQL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlOperation {
    CreateTable {
        table: String,
        /// Column definitions, e.g. `email TEXT NOT NULL`
        columns: Vec<String>,
    },
    RenameTable {
        table: String,
        new_name: String,
    },
    DropTable {
        table: String,
    },
    AddColumn {
        table: String,
        column: String,
        column_type: String,
    },
    RenameColumn {
        table: String,
        column: String,
        new_column: String,
    },
    DropColumn {
        table: String,
        column: String,
    },
    ExecuteSql {
        sql: String,
    },
}

/// Create a table holding a single auto-increment integer primary key
pub fn create_table(table: &str, primary_key: &str) -> DdlOperation {
    DdlOperation::CreateTable {
        table: table.to_string(),
        columns: vec![format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT",
            quote_ident(primary_key)
        )],
    }
}

/// Create a table from full column definitions
pub fn create_table_with_columns<I, S>(table: &str, columns: I) -> DdlOperation
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    DdlOperation::CreateTable {
        table: table.to_string(),
        columns: columns.into_iter().map(Into::into).collect(),
    }
}

pub fn rename_table(table: &str, new_name: &str) -> DdlOperation {
    DdlOperation::RenameTable {
        table: table.to_string(),
        new_name: new_name.to_string(),
    }
}

pub fn drop_table(table: &str) -> DdlOperation {
    DdlOperation::DropTable {
        table: table.to_string(),
    }
}

pub fn add_column(column: &str, column_type: &str, table: &str) -> DdlOperation {
    DdlOperation::AddColumn {
        table: table.to_string(),
        column: column.to_string(),
        column_type: column_type.to_string(),
    }
}

pub fn rename_column(column: &str, new_column: &str, table: &str) -> DdlOperation {
    DdlOperation::RenameColumn {
        table: table.to_string(),
        column: column.to_string(),
        new_column: new_column.to_string(),
    }
}

pub fn drop_column(column: &str, table: &str) -> DdlOperation {
    DdlOperation::DropColumn {
        table: table.to_string(),
        column: column.to_string(),
    }
}

/// Run arbitrary SQL; may contain several `;`-separated statements
pub fn execute_sql(sql: &str) -> DdlOperation {
    DdlOperation::ExecuteSql {
        sql: sql.to_string(),
    }
}

impl DdlOperation {
    /// Statements applying the operation
    pub fn forward_sql(&self) -> Vec<String> {
        match self {
            Self::CreateTable { table, columns } => vec![format!(
                "CREATE TABLE {} ({})",
                quote_ident(table),
                columns.join(", ")
            )],
            Self::RenameTable { table, new_name } => vec![rename_table_sql(table, new_name)],
            Self::DropTable { table } => vec![format!("DROP TABLE {}", quote_ident(table))],
            Self::AddColumn {
                table,
                column,
                column_type,
            } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                quote_ident(table),
                quote_ident(column),
                column_type
            )
            .trim_end()
            .to_string()],
            Self::RenameColumn {
                table,
                column,
                new_column,
            } => vec![rename_column_sql(table, column, new_column)],
            Self::DropColumn { table, column } => vec![drop_column_sql(table, column)],
            Self::ExecuteSql { sql } => vec![sql.clone()],
        }
    }

    /// Statements undoing the operation, or `None` when it is irreversible
    pub fn reverse_sql(&self) -> Option<Vec<String>> {
        match self {
            Self::CreateTable { table, .. } => {
                Some(vec![format!("DROP TABLE {}", quote_ident(table))])
            }
            Self::RenameTable { table, new_name } => Some(vec![rename_table_sql(new_name, table)]),
            Self::AddColumn { table, column, .. } => Some(vec![drop_column_sql(table, column)]),
            Self::RenameColumn {
                table,
                column,
                new_column,
            } => Some(vec![rename_column_sql(table, new_column, column)]),
            Self::DropTable { .. } | Self::DropColumn { .. } | Self::ExecuteSql { .. } => None,
        }
    }

    pub fn is_reversible(&self) -> bool {
        self.reverse_sql().is_some()
    }

    /// Descriptive name used when the operation becomes a migration
    pub fn default_name(&self) -> String {
        match self {
            Self::CreateTable { table, .. } => format!("create_table_{}", table),
            Self::RenameTable { table, new_name } => {
                format!("rename_table_{}_to_{}", table, new_name)
            }
            Self::DropTable { table } => format!("drop_table_{}", table),
            Self::AddColumn { table, column, .. } => format!("add_column_{}_{}", table, column),
            Self::RenameColumn {
                table,
                column,
                new_column,
            } => format!("rename_column_{}_{}_to_{}", table, column, new_column),
            Self::DropColumn { table, column } => format!("drop_column_{}_{}", table, column),
            Self::ExecuteSql { .. } => "execute_sql".to_string(),
        }
    }

    /// Build a migration named after the operation
    pub fn into_migration(self, id: u64) -> Migration {
        let name = self.default_name();
        self.into_named_migration(id, name)
    }

    pub fn into_named_migration(self, id: u64, name: impl Into<String>) -> Migration {
        let batch = matches!(self, Self::ExecuteSql { .. });
        let forward = self.forward_sql();
        let reverse = self.reverse_sql();

        let migration = Migration::new(id, name, move |runner| {
            run_statements(runner, &forward, batch)
        });

        match reverse {
            Some(reverse) => migration.with_down(move |runner| run_statements(runner, &reverse, false)),
            None => migration,
        }
    }
}

fn run_statements(
    runner: &mut StatementRunner<'_>,
    statements: &[String],
    batch: bool,
) -> Result<(), StatementFailure> {
    for sql in statements {
        if batch {
            runner.execute_batch(sql)?;
        } else {
            runner.execute(sql)?;
        }
    }
    Ok(())
}

fn rename_table_sql(from: &str, to: &str) -> String {
    format!("ALTER TABLE {} RENAME TO {}", quote_ident(from), quote_ident(to))
}

fn rename_column_sql(table: &str, from: &str, to: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        quote_ident(table),
        quote_ident(from),
        quote_ident(to)
    )
}

fn drop_column_sql(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_ident(table),
        quote_ident(column)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{DatabaseConn, DatabaseHandle};

    #[test]
    fn test_create_table_sql() {
        let op = create_table("users", "id");
        assert_eq!(
            op.forward_sql(),
            vec!["CREATE TABLE \"users\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT)".to_string()]
        );
        assert_eq!(
            op.reverse_sql(),
            Some(vec!["DROP TABLE \"users\"".to_string()])
        );
    }

    #[test]
    fn test_create_table_with_columns_sql() {
        let op = create_table_with_columns("posts", ["id INTEGER PRIMARY KEY", "title TEXT NOT NULL"]);
        assert_eq!(
            op.forward_sql(),
            vec!["CREATE TABLE \"posts\" (id INTEGER PRIMARY KEY, title TEXT NOT NULL)".to_string()]
        );
        assert!(op.is_reversible());
    }

    #[test]
    fn test_reversibility() {
        assert!(create_table("a", "id").is_reversible());
        assert!(rename_table("a", "b").is_reversible());
        assert!(add_column("c", "TEXT", "a").is_reversible());
        assert!(rename_column("c", "d", "a").is_reversible());
        assert!(!drop_table("a").is_reversible());
        assert!(!drop_column("c", "a").is_reversible());
        assert!(!execute_sql("DELETE FROM a").is_reversible());
    }

    #[test]
    fn test_rename_reverse_swaps_names() {
        let op = rename_column("email", "mail", "users");
        assert_eq!(
            op.reverse_sql(),
            Some(vec![
                "ALTER TABLE \"users\" RENAME COLUMN \"mail\" TO \"email\"".to_string()
            ])
        );

        let op = rename_table("users", "accounts");
        assert_eq!(
            op.reverse_sql(),
            Some(vec!["ALTER TABLE \"accounts\" RENAME TO \"users\"".to_string()])
        );
    }

    #[test]
    fn test_irreversible_migration_has_no_down() {
        let migration = drop_table("users").into_migration(5);
        assert!(!migration.is_reversible());
        assert_eq!(migration.name(), "drop_table_users");
    }

    #[test]
    fn test_create_then_revert_restores_schema() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let migration = create_table("users", "id").into_migration(1);

        assert!(migration.up(&db).succeeded());
        assert!(db.table_exists("users").unwrap());

        assert!(migration.down(&db).unwrap().succeeded());
        assert!(!db.table_exists("users").unwrap());
    }

    #[test]
    fn test_column_round_trip_on_database() {
        let db = DatabaseConn::open_in_memory().unwrap();
        assert!(create_table("users", "id").into_migration(1).up(&db).succeeded());

        let add = add_column("email", "TEXT", "users").into_migration(2);
        assert!(add.up(&db).succeeded());
        assert_eq!(db.column_names("users").unwrap(), vec!["id", "email"]);

        let rename = rename_column("email", "mail", "users").into_migration(3);
        assert!(rename.up(&db).succeeded());
        assert_eq!(db.column_names("users").unwrap(), vec!["id", "mail"]);

        assert!(rename.down(&db).unwrap().succeeded());
        assert!(add.down(&db).unwrap().succeeded());
        assert_eq!(db.column_names("users").unwrap(), vec!["id"]);
    }

    #[test]
    fn test_rename_table_on_database() {
        let db = DatabaseConn::open_in_memory().unwrap();
        assert!(create_table("users", "id").into_migration(1).up(&db).succeeded());

        let rename = rename_table("users", "accounts").into_migration(2);
        assert!(rename.up(&db).succeeded());
        assert!(db.table_exists("accounts").unwrap());
        assert!(!db.table_exists("users").unwrap());

        assert!(rename.down(&db).unwrap().succeeded());
        assert!(db.table_exists("users").unwrap());
    }

    #[test]
    fn test_execute_sql_runs_batch() {
        let db = DatabaseConn::open_in_memory().unwrap();
        let migration =
            execute_sql("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);").into_migration(1);

        let report = migration.up(&db);
        assert!(report.succeeded());
        assert_eq!(report.attempted.len(), 1);
        assert_eq!(db.table_count("t").unwrap(), 1);
        assert!(migration.down(&db).is_err());
    }
}
