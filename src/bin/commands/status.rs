use clap::Args;
use stepwise::{MigrationState, MigrationStatus, OutputFormat, StepwiseConfig};
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Arguments for the Status command
#[derive(Args)]
pub struct StatusArgs {
    /// Directory of migration files, defaults to the configured migrations_dir
    #[clap(short, long)]
    pub dir: Option<String>,
}

#[derive(Tabled)]
struct StatusRow {
    identity: u64,
    name: String,
    state: String,
    applied_at: String,
    reversible: bool,
}

impl From<&MigrationStatus> for StatusRow {
    fn from(status: &MigrationStatus) -> Self {
        StatusRow {
            identity: status.identity.value(),
            name: status.name.clone(),
            state: status.state.to_string(),
            applied_at: status.applied_at.clone().unwrap_or_else(|| "-".to_string()),
            reversible: status.reversible,
        }
    }
}

pub fn run(config: &StepwiseConfig, args: StatusArgs, output_format: OutputFormat) {
    let migrations = super::load_migrations(config, args.dir.as_deref());
    let manager = super::open_manager(config);

    let statuses = match manager.status(&migrations) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    match output_format {
        OutputFormat::JsonLine => {
            for s in &statuses {
                match serde_json::to_string(s) {
                    Ok(json) => println!("{}", json),
                    Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
                }
            }
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            if let Some(rendered) = output_format.render_json(&statuses) {
                match rendered {
                    Ok(json) => println!("{}", json),
                    Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
                }
            }
        }
        OutputFormat::Table | OutputFormat::Markdown => {
            if statuses.is_empty() {
                println!("No migrations found");
                return;
            }
            let rows: Vec<StatusRow> = statuses.iter().map(StatusRow::from).collect();
            if output_format == OutputFormat::Markdown {
                println!("{}", Table::new(rows).with(Style::markdown()));
            } else {
                println!("{}", Table::new(rows).with(Style::rounded()));
            }

            let pending = statuses
                .iter()
                .filter(|s| s.state == MigrationState::Pending)
                .count();
            println!("\n{} pending, {} total", pending, statuses.len());
        }
    }
}
