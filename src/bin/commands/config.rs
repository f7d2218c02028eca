use clap::Args;
use serde::Serialize;
use std::path::Path;
use stepwise::{format_size, get_database_info, DatabaseInfo, OutputFormat, StepwiseConfig};

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Also list the migration files found in the migrations directory
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    data_dir: String,
    migrations_dir: String,
    migrations_dir_exists: bool,
    busy_timeout_ms: u64,
    continue_on_failure: bool,
    database: DatabaseInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    files: Option<Vec<String>>,
}

pub fn run(config: &StepwiseConfig, args: ConfigArgs, output_format: OutputFormat) {
    let ConfigArgs { verbose } = args;

    let migrations_dir_exists = Path::new(&config.migrations_dir).is_dir();

    let files = if verbose && migrations_dir_exists {
        let mut names: Vec<String> = std::fs::read_dir(&config.migrations_dir)
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "sql"))
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        Some(names)
    } else {
        None
    };

    let config_info = ConfigInfo {
        config_file: StepwiseConfig::config_file_path(),
        data_dir: config.data_dir.clone(),
        migrations_dir: config.migrations_dir.clone(),
        migrations_dir_exists,
        busy_timeout_ms: config.busy_timeout_ms,
        continue_on_failure: config.continue_on_failure,
        database: get_database_info(config),
        files,
    };

    match output_format.render_json(&config_info) {
        Some(Ok(json)) => println!("{}", json),
        Some(Err(e)) => eprintln!("Error serializing config info: {}", e),
        None => print_config_table(&config_info),
    }
}

fn print_config_table(info: &ConfigInfo) {
    println!("Stepwise Configuration");
    println!("======================\n");

    println!("General:");
    println!("  Config file:    {}", info.config_file);
    println!("  Data dir:       {}", info.data_dir);
    println!(
        "  Migrations:     {}{}",
        info.migrations_dir,
        if info.migrations_dir_exists {
            ""
        } else {
            " (missing)"
        }
    );
    println!("  Busy timeout:   {} ms", info.busy_timeout_ms);
    println!(
        "  On failure:     {}",
        if info.continue_on_failure {
            "continue"
        } else {
            "stop"
        }
    );
    println!();

    println!("Database:");
    println!("  Path:           {}", info.database.path);
    println!(
        "  Status:         {}",
        if info.database.exists {
            "exists"
        } else {
            "not created"
        }
    );
    if let Some(size) = info.database.size_bytes {
        println!("  Size:           {}", format_size(size));
    }
    println!("  Tracking table: {}", info.database.tracking_table);
    if info.database.tracking_initialized {
        println!(
            "  Applied:        {} migration(s)",
            info.database.applied_count.unwrap_or(0)
        );
        if let Some(at) = &info.database.last_applied_at {
            println!("  Last applied:   {}", at);
        }
    } else {
        println!("  Applied:        tracking table not initialized");
    }

    if let Some(files) = &info.files {
        println!();
        println!("Migration Files:");
        for name in files {
            println!("  {}", name);
        }
    }
}
