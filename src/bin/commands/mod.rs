pub mod config;
pub mod migrate;
pub mod rollback;
pub mod status;

use std::path::Path;
use stepwise::{load_directory, DatabaseConn, Migration, MigrationManager, StepwiseConfig};

/// Open the configured database and wrap it in a manager, exiting on failure
pub(crate) fn open_manager(config: &StepwiseConfig) -> MigrationManager<DatabaseConn> {
    match config.open_database() {
        Ok(db) => MigrationManager::with_options(db, config.manager_options()),
        Err(e) => {
            eprintln!("ERROR: Failed to open database: {}", e);
            std::process::exit(1);
        }
    }
}

/// Load migrations from `dir` (falling back to the configured directory), exiting on failure
pub(crate) fn load_migrations(config: &StepwiseConfig, dir: Option<&str>) -> Vec<Migration> {
    let dir = dir.unwrap_or(config.migrations_dir.as_str());
    if !Path::new(dir).exists() {
        eprintln!("ERROR: Migrations directory '{}' does not exist", dir);
        std::process::exit(1);
    }
    match load_directory(dir) {
        Ok(migrations) => migrations,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    }
}
