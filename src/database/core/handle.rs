//! Database handle abstraction
//!
//! The migration engine only needs a handful of primitives from the underlying
//! SQL library: run a statement, run a batch, control a transaction and read
//! rows back. `DatabaseHandle` captures exactly those so the manager never
//! depends on a concrete connection type.

use rusqlite::types::Value;
use rusqlite::{Connection, ToSql};

/// Capability set the migration engine requires from a database connection
pub trait DatabaseHandle {
    /// Execute a single statement, returning the number of changed rows
    fn execute(&self, sql: &str) -> rusqlite::Result<usize>;

    /// Execute a single statement with positional parameters
    fn execute_with_params(&self, sql: &str, params: &[&dyn ToSql]) -> rusqlite::Result<usize>;

    /// Execute one or more `;`-separated statements
    fn execute_batch(&self, sql: &str) -> rusqlite::Result<()>;

    /// Run a query and collect every row as owned values
    fn query_rows(&self, sql: &str, params: &[&dyn ToSql]) -> rusqlite::Result<Vec<Vec<Value>>>;

    fn begin(&self) -> rusqlite::Result<()> {
        self.execute_batch("BEGIN")
    }

    fn commit(&self) -> rusqlite::Result<()> {
        self.execute_batch("COMMIT")
    }

    fn rollback(&self) -> rusqlite::Result<()> {
        self.execute_batch("ROLLBACK")
    }

    /// Check if a table exists in the database
    fn table_exists(&self, table_name: &str) -> rusqlite::Result<bool> {
        let rows = self.query_rows(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
            &[&table_name],
        )?;
        Ok(!rows.is_empty())
    }

    /// Column names of a table, in declaration order (empty if the table is absent)
    fn column_names(&self, table_name: &str) -> rusqlite::Result<Vec<String>> {
        let rows = self.query_rows(
            "SELECT name FROM pragma_table_info(?1) ORDER BY cid",
            &[&table_name],
        )?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_iter().next() {
                Some(Value::Text(name)) => Some(name),
                _ => None,
            })
            .collect())
    }
}

impl DatabaseHandle for Connection {
    fn execute(&self, sql: &str) -> rusqlite::Result<usize> {
        Connection::execute(self, sql, [])
    }

    fn execute_with_params(&self, sql: &str, params: &[&dyn ToSql]) -> rusqlite::Result<usize> {
        Connection::execute(self, sql, params)
    }

    fn execute_batch(&self, sql: &str) -> rusqlite::Result<()> {
        Connection::execute_batch(self, sql)
    }

    fn query_rows(&self, sql: &str, params: &[&dyn ToSql]) -> rusqlite::Result<Vec<Vec<Value>>> {
        let mut stmt = self.prepare(sql)?;
        let column_count = stmt.column_count();
        let rows = stmt.query_map(params, |row| {
            (0..column_count)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<Value>>>()
        })?;
        rows.collect()
    }
}

impl<T: DatabaseHandle + ?Sized> DatabaseHandle for &T {
    fn execute(&self, sql: &str) -> rusqlite::Result<usize> {
        (**self).execute(sql)
    }

    fn execute_with_params(&self, sql: &str, params: &[&dyn ToSql]) -> rusqlite::Result<usize> {
        (**self).execute_with_params(sql, params)
    }

    fn execute_batch(&self, sql: &str) -> rusqlite::Result<()> {
        (**self).execute_batch(sql)
    }

    fn query_rows(&self, sql: &str, params: &[&dyn ToSql]) -> rusqlite::Result<Vec<Vec<Value>>> {
        (**self).query_rows(sql, params)
    }

    fn begin(&self) -> rusqlite::Result<()> {
        (**self).begin()
    }

    fn commit(&self) -> rusqlite::Result<()> {
        (**self).commit()
    }

    fn rollback(&self) -> rusqlite::Result<()> {
        (**self).rollback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_handle() {
        let conn = Connection::open_in_memory().unwrap();
        let handle: &dyn DatabaseHandle = &conn;

        handle
            .execute("CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT)")
            .unwrap();
        assert!(handle.table_exists("users").unwrap());
        assert!(!handle.table_exists("missing").unwrap());
        assert_eq!(
            handle.column_names("users").unwrap(),
            vec!["id".to_string(), "email".to_string()]
        );
        assert!(handle.column_names("missing").unwrap().is_empty());
    }

    #[test]
    fn test_transaction_rollback() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();

        DatabaseHandle::begin(&conn).unwrap();
        DatabaseHandle::execute(&conn, "INSERT INTO t VALUES (1)").unwrap();
        DatabaseHandle::rollback(&conn).unwrap();

        let rows = conn.query_rows("SELECT x FROM t", &[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_query_rows_with_params() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER, y TEXT); INSERT INTO t VALUES (1, 'a'), (2, 'b');")
            .unwrap();

        let rows = conn
            .query_rows("SELECT x, y FROM t WHERE x > ?1", &[&1i64])
            .unwrap();
        assert_eq!(
            rows,
            vec![vec![Value::Integer(2), Value::Text("b".to_string())]]
        );
    }
}
