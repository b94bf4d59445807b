//! `agency migrate` — apply pending migrations, or list their state.

use agency_core::migrations::UnitOutcome;
use agency_core::Database;

pub async fn run(show_status: bool) -> Result<(), String> {
    let settings = super::load_settings()?;
    let db = Database::new(&settings.database).map_err(|e| e.to_string())?;
    let runner = super::migration_runner(&settings);

    if show_status {
        let units = runner.status(&db).await.map_err(|e| e.to_string())?;
        for unit in units {
            match unit.applied_at {
                Some(at) => println!("  applied  {}  {}", at.format("%Y-%m-%d %H:%M:%S"), unit.name),
                None if unit.applied => println!("  applied  {:19}  {}", "", unit.name),
                None => println!("  pending  {:19}  {}", "", unit.name),
            }
        }
        return Ok(());
    }

    let report = runner.run(&db).await;
    for unit in &report.outcomes {
        let label = match unit.outcome {
            UnitOutcome::Applied => "applied",
            UnitOutcome::AlreadyApplied => "skipped (already applied)",
            UnitOutcome::SkippedMissing => "skipped (file missing)",
        };
        println!("  {}: {}", unit.name, label);
    }

    match report.failure {
        None => {
            println!(
                "Migrations complete: {} applied, {} already applied",
                report.count(UnitOutcome::Applied),
                report.count(UnitOutcome::AlreadyApplied)
            );
            Ok(())
        }
        Some(failure) => Err(match failure.unit {
            Some(unit) => format!("Migration {} failed: {}", unit, failure.message),
            None => format!("Migration failed: {}", failure.message),
        }),
    }
}
