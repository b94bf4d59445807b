//! `agency db-status` — check both access paths.

use agency_core::db::redact;
use agency_core::Database;

pub async fn status() -> Result<(), String> {
    let settings = super::load_settings()?;
    let db = Database::new(&settings.database).map_err(|e| e.to_string())?;

    println!("Database: {}", redact(&settings.database.url));
    let sync_ok = db.check_connection();
    let async_ok = db.check_connection_async().await;

    super::print_json(&serde_json::json!({
        "backend": db.backend(),
        "sync_connected": sync_ok,
        "async_connected": async_ok,
    }));

    if sync_ok && async_ok {
        Ok(())
    } else {
        Err("Database is unreachable".to_string())
    }
}
