use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(database_status))
        .route("/migrate", post(run_migrations))
}

async fn database_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let connected = state.db.check_connection_async().await;
    Json(serde_json::json!({
        "database_connected": connected,
        "status": if connected { "connected" } else { "disconnected" },
    }))
}

/// Always 200; the outcome is in the `status` field.
async fn run_migrations(State(state): State<AppState>) -> Json<serde_json::Value> {
    let report = state.migrations.run(&state.db).await;
    match report.failure {
        None => Json(serde_json::json!({
            "status": "success",
            "message": "Database migrations completed",
            "outcomes": report.outcomes,
        })),
        Some(failure) => Json(serde_json::json!({
            "status": "error",
            "message": format!("Migration failed: {}", failure.message),
            "unit": failure.unit,
            "outcomes": report.outcomes,
        })),
    }
}
