//! SQL directory source
//!
//! Loads raw-SQL migrations from a directory laid out as:
//!
//! ```text
//! migrations/
//! ├── 0001_create_users.up.sql
//! ├── 0001_create_users.down.sql   # optional
//! └── 0002_seed_users.up.sql
//! ```
//!
//! The numeric prefix becomes the migration identity and the rest of the stem
//! its name. Migrations are returned in ascending identity order.

use crate::error::{MigrationError, Result};
use crate::migration::{Migration, MigrationId};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const UP_SUFFIX: &str = ".up.sql";
const DOWN_SUFFIX: &str = ".down.sql";

#[derive(Default)]
struct SqlPair {
    name: String,
    up: Option<PathBuf>,
    down: Option<PathBuf>,
}

/// Load every migration in `dir`
pub fn load_directory(dir: impl AsRef<Path>) -> Result<Vec<Migration>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| source_error(dir, e.to_string()))?;

    let mut pairs: BTreeMap<u64, SqlPair> = BTreeMap::new();
    for entry in entries {
        let path = entry.map_err(|e| source_error(dir, e.to_string()))?.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let (stem, is_up) = if let Some(stem) = file_name.strip_suffix(UP_SUFFIX) {
            (stem, true)
        } else if let Some(stem) = file_name.strip_suffix(DOWN_SUFFIX) {
            (stem, false)
        } else {
            debug!("Ignoring non-migration file {}", path.display());
            continue;
        };

        let (version, name) = parse_stem(stem).ok_or_else(|| {
            source_error(
                &path,
                format!(
                    "expected <version>_<name>.up.sql or <version>_<name>.down.sql \
                     with a version of at most {}",
                    MigrationId::MAX
                ),
            )
        })?;

        let pair = pairs.entry(version).or_insert_with(|| SqlPair {
            name: name.to_string(),
            ..Default::default()
        });
        if pair.name != name {
            return Err(source_error(
                &path,
                format!(
                    "version {} is already used by migration '{}'",
                    version, pair.name
                ),
            ));
        }

        let slot = if is_up { &mut pair.up } else { &mut pair.down };
        if let Some(existing) = slot.as_ref() {
            let reason = format!("version {} is already used by {}", version, existing.display());
            return Err(source_error(&path, reason));
        }
        *slot = Some(path);
    }

    let mut migrations = Vec::with_capacity(pairs.len());
    for (version, pair) in pairs {
        let up_path = match pair.up {
            Some(p) => p,
            None => {
                let down = pair.down.unwrap_or_else(|| dir.to_path_buf());
                return Err(source_error(
                    &down,
                    "down migration has no matching up migration".to_string(),
                ));
            }
        };

        let up_sql = read_sql(&up_path)?;
        let migration = match pair.down {
            Some(down_path) => {
                let down_sql = read_sql(&down_path)?;
                Migration::sql_reversible(version, pair.name, up_sql, down_sql)
            }
            None => Migration::sql(version, pair.name, up_sql),
        };
        migrations.push(migration);
    }

    debug!("Loaded {} migration(s) from {}", migrations.len(), dir.display());
    Ok(migrations)
}

/// Split `0001_create_users` into `(1, "create_users")`
fn parse_stem(stem: &str) -> Option<(u64, &str)> {
    let (version, name) = stem.split_once('_')?;
    if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit()) || name.is_empty() {
        return None;
    }
    let version: u64 = version.parse().ok()?;
    if !MigrationId::new(version).in_range() {
        return None;
    }
    Some((version, name))
}

fn read_sql(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| source_error(path, e.to_string()))
}

fn source_error(path: &Path, reason: String) -> MigrationError {
    MigrationError::Source {
        path: path.display().to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, sql: &str) {
        fs::write(dir.join(name), sql).unwrap();
    }

    #[test]
    fn test_parse_stem() {
        assert_eq!(parse_stem("0001_create_users"), Some((1, "create_users")));
        assert_eq!(
            parse_stem("20250503000000_add_brand"),
            Some((20250503000000, "add_brand"))
        );
        assert_eq!(parse_stem("create_users"), None);
        assert_eq!(parse_stem("0001_"), None);
        assert_eq!(parse_stem("v1_users"), None);
        assert_eq!(
            parse_stem("9223372036854775807_last"),
            Some((9223372036854775807, "last"))
        );
        assert_eq!(parse_stem("9223372036854775808_too_big"), None);
    }

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0002_seed.up.sql", "INSERT INTO users DEFAULT VALUES;");
        write(dir.path(), "0001_users.up.sql", "CREATE TABLE users (id INTEGER PRIMARY KEY);");
        write(dir.path(), "0001_users.down.sql", "DROP TABLE users;");
        write(dir.path(), "README.md", "not a migration");

        let migrations = load_directory(dir.path()).unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].id(), MigrationId::new(1));
        assert_eq!(migrations[0].name(), "users");
        assert!(migrations[0].is_reversible());
        assert_eq!(migrations[1].id(), MigrationId::new(2));
        assert!(!migrations[1].is_reversible());
    }

    #[test]
    fn test_down_without_up() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0001_users.down.sql", "DROP TABLE users;");

        assert!(matches!(
            load_directory(dir.path()).unwrap_err(),
            MigrationError::Source { .. }
        ));
    }

    #[test]
    fn test_duplicate_version() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0001_users.up.sql", "CREATE TABLE users (id INTEGER);");
        write(dir.path(), "1_posts.up.sql", "CREATE TABLE posts (id INTEGER);");

        let err = load_directory(dir.path()).unwrap_err();
        assert!(err.to_string().contains("already used"));

        // same version and name spelled with different padding
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0001_users.up.sql", "CREATE TABLE users (id INTEGER);");
        write(dir.path(), "1_users.up.sql", "CREATE TABLE users (id INTEGER);");

        let err = load_directory(dir.path()).unwrap_err();
        assert!(matches!(err, MigrationError::Source { .. }));
        assert!(err.to_string().contains("already used"));
    }

    #[test]
    fn test_malformed_name() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "users.up.sql", "CREATE TABLE users (id INTEGER);");

        assert!(load_directory(dir.path()).is_err());
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_directory(dir.path().join("nope")).is_err());
    }
}
