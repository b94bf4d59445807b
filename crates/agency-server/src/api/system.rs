use axum::{extract::State, routing::get, Json, Router};

use agency_core::config::PublicConfig;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/config", get(get_config))
}

/// Liveness only; never touches the database.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "message": "agency is running",
    }))
}

async fn index(State(state): State<AppState>) -> Json<serde_json::Value> {
    let workflows: serde_json::Map<String, serde_json::Value> = state
        .workflows
        .iter()
        .map(|wf| (wf.name.to_string(), serde_json::Value::from(wf.description)))
        .collect();

    Json(serde_json::json!({
        "message": "Agency deployment",
        "workflows": workflows,
        "endpoints": {
            "/health": "Health check",
            "/workflows": "Workflow API endpoints",
            "/db/status": "Database connectivity",
            "/db/migrate": "Run database migrations",
            "/config": "Public configuration",
        },
    }))
}

async fn get_config(State(state): State<AppState>) -> Json<PublicConfig> {
    Json(state.settings.public_view())
}
