use crate::database::{DatabaseConn, DatabaseHandle, TrackingTable, DEFAULT_TRACKING_TABLE};
use crate::migration::{ManagerOptions, MigrateFlags};
use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub struct StepwiseConfig {
    /// Path to the directory holding stepwise's default database
    pub data_dir: String,

    /// SQLite database migrations are applied to
    pub database_path: String,

    /// Directory of `<version>_<name>.up.sql` / `.down.sql` files
    pub migrations_dir: String,

    /// Name of the table recording applied migrations
    pub tracking_table: String,

    /// How long to wait on a locked database, in milliseconds (default: 5000)
    pub busy_timeout_ms: u64,

    /// Skip failed migrations instead of stopping at the first one
    pub continue_on_failure: bool,
}

const EMPTY_CONFIG: &str = r#"### stepwise configuration file

### directory for stepwise's default database
# data_dir = "~/.stepwise"

### database to migrate (defaults to <data_dir>/stepwise.sqlite3)
# database_path = "./app.sqlite3"

### directory holding <version>_<name>.up.sql and <version>_<name>.down.sql files
# migrations_dir = "./migrations"

### table recording applied migrations
# tracking_table = "__stepwise_migrations"

### run behaviour
# busy_timeout_ms = 5000
# continue_on_failure = false
"#;

impl Default for StepwiseConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());
        let data_dir = format!("{}/.stepwise", home_dir);

        Self {
            database_path: format!("{}/stepwise.sqlite3", data_dir),
            data_dir,
            migrations_dir: "./migrations".to_string(),
            tracking_table: DEFAULT_TRACKING_TABLE.to_string(),
            busy_timeout_ms: 5000,
            continue_on_failure: false,
        }
    }
}

impl StepwiseConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<StepwiseConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.stepwise/stepwise.toml as the configuration file path
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let stepwise_dir = format!("{}/.stepwise", home_dir.as_str());

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(stepwise_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create stepwise directory: {}", e))?;
                let p = format!("{}/stepwise.toml", stepwise_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of STEPWISE)
        // E.g., `STEPWISE_DATABASE_PATH=./app.sqlite3 ./stepwise migrate`
        builder = builder.add_source(config::Environment::with_prefix("STEPWISE"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config, &stepwise_dir)
    }

    fn from_map(config: &HashMap<String, String>, default_data_dir: &str) -> Result<Self> {
        let data_dir = config
            .get("data_dir")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| default_data_dir.to_string());

        let database_path = config
            .get("database_path")
            .cloned()
            .unwrap_or_else(|| format!("{}/stepwise.sqlite3", data_dir));

        let migrations_dir = config
            .get("migrations_dir")
            .cloned()
            .unwrap_or_else(|| "./migrations".to_string());

        let tracking_table = match config.get("tracking_table") {
            Some(t) if t.trim().is_empty() => {
                return Err(anyhow!("tracking_table must not be empty"));
            }
            Some(t) => t.trim().to_string(),
            None => DEFAULT_TRACKING_TABLE.to_string(),
        };

        // Parse busy timeout (default: 5 seconds)
        let busy_timeout_ms = match config.get("busy_timeout_ms") {
            Some(v) => v.trim().parse::<u64>().map_err(|_| {
                anyhow!("busy_timeout_ms must be a number of milliseconds, got '{}'", v)
            })?,
            None => 5000,
        };

        let continue_on_failure = match config.get("continue_on_failure") {
            Some(v) => v
                .parse::<bool>()
                .map_err(|_| anyhow!("continue_on_failure must be true or false, got '{}'", v))?,
            None => false,
        };

        Ok(StepwiseConfig {
            data_dir,
            database_path,
            migrations_dir,
            tracking_table,
            busy_timeout_ms,
            continue_on_failure,
        })
    }

    /// Get busy timeout as Duration
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Manager construction parameters derived from this configuration
    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            tracking_table: self.tracking_table.clone(),
        }
    }

    /// Flags every run starts from, before command-line overrides
    pub fn default_flags(&self) -> MigrateFlags {
        if self.continue_on_failure {
            MigrateFlags::CONTINUE_ON_FAILURE
        } else {
            MigrateFlags::empty()
        }
    }

    /// Open the configured database
    pub fn open_database(&self) -> Result<DatabaseConn> {
        if let Some(parent) = Path::new(&self.database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    anyhow!("Unable to create database directory {}: {}", parent.display(), e)
                })?;
            }
        }
        DatabaseConn::open_with_timeout(Some(self.database_path.as_str()), self.busy_timeout())
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Data Directory:       {}", self.data_dir),
            format!("Database Path:        {}", self.database_path),
            format!("Migrations Directory: {}", self.migrations_dir),
            format!("Tracking Table:       {}", self.tracking_table),
            format!("Busy Timeout:         {} ms", self.busy_timeout_ms),
            format!("Continue On Failure:  {}", self.continue_on_failure),
        ]
        .join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.stepwise/stepwise.toml", home_dir)
    }
}

/// Information about the configured database file
#[derive(Debug, Serialize, Clone)]
pub struct DatabaseInfo {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    pub tracking_table: String,
    pub tracking_initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_applied_at: Option<String>,
}

/// Inspect the configured database without creating it
pub fn get_database_info(config: &StepwiseConfig) -> DatabaseInfo {
    let path = config.database_path.clone();
    let exists = Path::new(&path).exists();
    let size_bytes = if exists {
        std::fs::metadata(&path).ok().map(|m| m.len())
    } else {
        None
    };

    let mut info = DatabaseInfo {
        path,
        exists,
        size_bytes,
        tracking_table: config.tracking_table.clone(),
        tracking_initialized: false,
        applied_count: None,
        last_applied_at: None,
    };

    if !exists {
        return info;
    }

    if let Ok(db) = DatabaseConn::open_with_timeout(Some(info.path.as_str()), config.busy_timeout()) {
        let tracking = TrackingTable::new(&db, &config.tracking_table);
        if db.table_exists(&config.tracking_table).unwrap_or(false) {
            info.tracking_initialized = true;
            if let Ok(records) = tracking.records() {
                info.applied_count = Some(records.len());
                info.last_applied_at = records.last().map(|r| r.applied_at.clone());
            }
        }
    }

    info
}

/// Format a byte size into a human-readable string
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{ddl, MigrationManager};

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = StepwiseConfig::default();
        assert_eq!(config.tracking_table, DEFAULT_TRACKING_TABLE);
        assert_eq!(config.busy_timeout_ms, 5000);
        assert!(!config.continue_on_failure);
        assert!(config.database_path.ends_with("/.stepwise/stepwise.sqlite3"));
    }

    #[test]
    fn test_from_map_defaults() {
        let config = StepwiseConfig::from_map(&HashMap::new(), "/test/dir").unwrap();
        assert_eq!(config.data_dir, "/test/dir");
        assert_eq!(config.database_path, "/test/dir/stepwise.sqlite3");
        assert_eq!(config.migrations_dir, "./migrations");
        assert_eq!(config.default_flags(), MigrateFlags::empty());
    }

    #[test]
    fn test_from_map_values() {
        let config = StepwiseConfig::from_map(
            &map(&[
                ("data_dir", "/data/"),
                ("tracking_table", "schema_history"),
                ("busy_timeout_ms", "250"),
                ("continue_on_failure", "true"),
            ]),
            "/unused",
        )
        .unwrap();

        assert_eq!(config.database_path, "/data/stepwise.sqlite3");
        assert_eq!(config.manager_options().tracking_table, "schema_history");
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));
        assert_eq!(config.default_flags(), MigrateFlags::CONTINUE_ON_FAILURE);
    }

    #[test]
    fn test_from_map_rejects_bad_values() {
        assert!(StepwiseConfig::from_map(&map(&[("tracking_table", " ")]), "/d").is_err());
        assert!(StepwiseConfig::from_map(&map(&[("continue_on_failure", "maybe")]), "/d").is_err());
        assert!(StepwiseConfig::from_map(&map(&[("busy_timeout_ms", "soon")]), "/d").is_err());
        assert!(StepwiseConfig::from_map(&map(&[("busy_timeout_ms", "-1")]), "/d").is_err());
    }

    #[test]
    fn test_new_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stepwise.toml");
        std::fs::write(
            &path,
            "database_path = \"/tmp/app.sqlite3\"\ntracking_table = \"history\"\ncontinue_on_failure = true\n",
        )
        .unwrap();

        let config = StepwiseConfig::new(&Some(path.to_string_lossy().to_string())).unwrap();
        assert_eq!(config.database_path, "/tmp/app.sqlite3");
        assert_eq!(config.tracking_table, "history");
        assert!(config.continue_on_failure);
    }

    #[test]
    fn test_new_creates_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.toml");

        StepwiseConfig::new(&Some(path.to_string_lossy().to_string())).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("tracking_table"));
    }

    #[test]
    fn test_database_info() {
        let dir = tempfile::tempdir().unwrap();
        let config = StepwiseConfig {
            database_path: dir.path().join("db.sqlite3").to_string_lossy().to_string(),
            ..Default::default()
        };

        let info = get_database_info(&config);
        assert!(!info.exists);
        assert!(!info.tracking_initialized);

        let mut manager = MigrationManager::with_options(
            config.open_database().unwrap(),
            config.manager_options(),
        );
        manager
            .migrate(
                &[ddl::create_table("users", "id").into_migration(1)],
                config.default_flags(),
            )
            .unwrap();
        drop(manager);

        let info = get_database_info(&config);
        assert!(info.exists);
        assert!(info.tracking_initialized);
        assert_eq!(info.applied_count, Some(1));
        assert!(info.last_applied_at.is_some());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }
}
