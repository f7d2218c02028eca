#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::{Parser, Subcommand};
use stepwise::{OutputFormat, StepwiseConfig};
use tracing::Level;

mod commands;

use commands::config::ConfigArgs;
use commands::migrate::MigrateArgs;
use commands::rollback::RollbackArgs;
use commands::status::StatusArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.stepwise/stepwise.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format: table (default), markdown, json, json-pretty, json-line
    #[clap(long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show applied, pending and orphaned migrations
    Status(StatusArgs),

    /// Apply every pending migration in order
    Migrate(MigrateArgs),

    /// Revert applied migrations, newest first
    Rollback(RollbackArgs),

    /// Show configuration and database status
    Config(ConfigArgs),
}

fn main() {
    let cli = Cli::parse();

    let config = match StepwiseConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let level = if cli.debug { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let output_format = cli.format;

    match cli.command {
        Commands::Status(args) => commands::status::run(&config, args, output_format),
        Commands::Migrate(args) => commands::migrate::run(&config, args, output_format),
        Commands::Rollback(args) => commands::rollback::run(&config, args, output_format),
        Commands::Config(args) => commands::config::run(&config, args, output_format),
    }
}
