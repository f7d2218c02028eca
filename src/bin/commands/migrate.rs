use clap::Args;
use stepwise::{MigrateFlags, MigrateReport, OutputFormat, StepwiseConfig};
use tabled::settings::Style;
use tabled::Table;

/// Arguments for the Migrate command
#[derive(Args)]
pub struct MigrateArgs {
    /// Directory of migration files, defaults to the configured migrations_dir
    #[clap(short, long)]
    pub dir: Option<String>,

    /// Only list pending migrations, do not apply them
    #[clap(long)]
    pub dry_run: bool,

    /// Skip a failed migration and continue with the next one
    #[clap(long)]
    pub continue_on_failure: bool,
}

pub fn run(config: &StepwiseConfig, args: MigrateArgs, output_format: OutputFormat) {
    let MigrateArgs {
        dir,
        dry_run,
        continue_on_failure,
    } = args;

    let mut flags = config.default_flags();
    flags.set(MigrateFlags::DRY_RUN, dry_run);
    if continue_on_failure {
        flags.insert(MigrateFlags::CONTINUE_ON_FAILURE);
    }

    let migrations = super::load_migrations(config, dir.as_deref());
    let mut manager = super::open_manager(config);

    let report = match manager.migrate(&migrations, flags) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            if let Ok(records) = manager.applied_records() {
                eprintln!("{} migration(s) recorded as applied", records.len());
            }
            std::process::exit(1);
        }
    };

    print_report(&report, output_format);

    if !report.is_clean() {
        std::process::exit(1);
    }
}

fn print_report(report: &MigrateReport, output_format: OutputFormat) {
    if let Some(rendered) = output_format.render_json(report) {
        match rendered {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
        }
        return;
    }

    if report.pending.is_empty() {
        println!("Database is up to date");
        return;
    }

    if report.dry_run {
        println!("{} pending migration(s):", report.pending.len());
        for id in &report.pending {
            println!("  {}", id);
        }
        return;
    }

    if !report.applied.is_empty() {
        let mut table = Table::new(&report.applied);
        match output_format {
            OutputFormat::Markdown => table.with(Style::markdown()),
            _ => table.with(Style::rounded()),
        };
        println!("{}", table);
    }

    for failed in &report.failed {
        eprintln!(
            "FAILED: migration {} ({}): {}",
            failed.identity, failed.name, failed.error
        );
        if let Some(statement) = &failed.statement {
            eprintln!("  statement: {}", statement);
        }
    }

    println!(
        "Applied {} of {} pending migration(s)",
        report.applied.len(),
        report.pending.len()
    );
}
