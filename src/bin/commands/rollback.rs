use clap::Args;
use stepwise::{MigrateFlags, MigrationId, OutputFormat, RollbackReport, StepwiseConfig};

/// Arguments for the Rollback command
#[derive(Args)]
pub struct RollbackArgs {
    /// Directory of migration files, defaults to the configured migrations_dir
    #[clap(short, long)]
    pub dir: Option<String>,

    /// Number of most recently applied migrations to revert
    #[clap(short = 'n', long, default_value_t = 1)]
    pub steps: usize,

    /// Revert every applied migration
    #[clap(long, conflicts_with_all = ["steps", "to"])]
    pub all: bool,

    /// Revert everything applied after this migration, keeping it applied
    #[clap(long, conflicts_with = "steps")]
    pub to: Option<MigrationId>,

    /// Only list the migrations that would be reverted
    #[clap(long)]
    pub dry_run: bool,
}

pub fn run(config: &StepwiseConfig, args: RollbackArgs, output_format: OutputFormat) {
    let RollbackArgs {
        dir,
        steps,
        all,
        to,
        dry_run,
    } = args;

    let flags = if dry_run {
        MigrateFlags::DRY_RUN
    } else {
        MigrateFlags::empty()
    };

    let migrations = super::load_migrations(config, dir.as_deref());
    let mut manager = super::open_manager(config);

    let result = match (all, to) {
        (true, _) => manager.rollback_all(&migrations, flags),
        (false, Some(target)) => manager.rollback_to(&migrations, target, flags),
        (false, None) => manager.rollback(&migrations, steps, flags),
    };

    let report = match result {
        Ok(r) => r,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    print_report(&report, output_format);
}

fn print_report(report: &RollbackReport, output_format: OutputFormat) {
    if let Some(rendered) = output_format.render_json(report) {
        match rendered {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
        }
        return;
    }

    if report.reverted.is_empty() {
        println!("Nothing to roll back");
        return;
    }

    let verb = if report.dry_run {
        "Would revert"
    } else {
        "Reverted"
    };
    for id in &report.reverted {
        println!("{} migration {}", verb, id);
    }
}
