//! Store tests against a live Postgres.
//!
//! Skipped unless `TEST_DATABASE_URL` points at a disposable database.

use agency_core::config::DatabaseConfig;
use agency_core::migrations::{MigrationRunner, MigrationUnit, UnitOutcome};
use agency_core::Database;

fn test_database() -> Option<Database> {
    let url = std::env::var("TEST_DATABASE_URL").ok().filter(|v| !v.trim().is_empty())?;
    let config = DatabaseConfig::from_lookup(|key| (key == "DATABASE_URL").then(|| url.clone()));
    Some(Database::new(&config).unwrap())
}

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn cleanup(db: &Database, tables: &[&str], names: &[&str]) {
    let mut sql = String::new();
    for table in tables {
        sql.push_str(&format!("DROP TABLE IF EXISTS {};\n", table));
    }
    for name in names {
        sql.push_str(&format!("DELETE FROM migration_history WHERE migration_name = '{}';\n", name));
    }
    let mut conn = db.connect().await.unwrap();
    conn.ensure_history_table().await.unwrap();
    conn.apply(&unique("agency_cleanup"), &sql).await.unwrap();
    conn.close().await;
}

#[tokio::test]
async fn test_second_run_reports_already_applied() {
    let Some(db) = test_database() else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let table = unique("agency_model");
    let name = unique("agency_unit");
    let runner = MigrationRunner::new(vec![MigrationUnit::inline(
        name.clone(),
        format!("CREATE TABLE {} (id SERIAL PRIMARY KEY, name TEXT NOT NULL);", table),
    )]);

    let first = runner.run(&db).await;
    assert!(first.success(), "{:?}", first.failure);
    assert_eq!(first.count(UnitOutcome::Applied), 1);

    let second = runner.run(&db).await;
    assert!(second.success(), "{:?}", second.failure);
    assert_eq!(second.count(UnitOutcome::AlreadyApplied), 1);

    let blocking = runner.run_blocking(&db);
    assert_eq!(blocking.count(UnitOutcome::AlreadyApplied), 1);

    let status = runner.status(&db).await.unwrap();
    assert!(status[0].applied);
    assert!(status[0].applied_at.is_some());

    cleanup(&db, &[&table], &[&name]).await;
}

#[tokio::test]
async fn test_broken_batch_rolls_back() {
    let Some(db) = test_database() else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let table = unique("agency_partial");
    let name = unique("agency_broken");
    let runner = MigrationRunner::new(vec![MigrationUnit::inline(
        name.clone(),
        format!("CREATE TABLE {} (id INTEGER); SELECT * FROM agency_no_such_table;", table),
    )]);

    let report = runner.run(&db).await;
    let failure = report.failure.expect("batch should fail");
    assert_eq!(failure.unit.as_deref(), Some(name.as_str()));

    let mut conn = db.connect().await.unwrap();
    assert!(!conn.is_applied(&name).await.unwrap());
    // The CREATE from the failed batch must not survive.
    let select_table = format!("SELECT 1 FROM {};", table);
    assert!(conn.apply(&unique("agency_check"), &select_table).await.is_err());
    conn.close().await;
}

#[tokio::test]
async fn test_duplicate_history_row_is_rejected() {
    let Some(db) = test_database() else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let name = unique("agency_dup");

    let mut conn = db.connect().await.unwrap();
    conn.ensure_history_table().await.unwrap();
    conn.apply(&name, "SELECT 1;").await.unwrap();
    assert!(conn.apply(&name, "SELECT 1;").await.is_err());

    let rows = conn.applied().await.unwrap();
    assert_eq!(rows.iter().filter(|r| r.name == name).count(), 1);
    conn.close().await;

    cleanup(&db, &[], &[&name]).await;
}
