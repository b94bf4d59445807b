use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use agency_core::error::ServerError;
use agency_core::workflow::{WorkflowOutput, WorkflowRequest};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_workflows))
        .route("/{name}", post(run_workflow))
}

async fn list_workflows(State(state): State<AppState>) -> Json<serde_json::Value> {
    let workflows: Vec<serde_json::Value> = state
        .workflows
        .iter()
        .map(|wf| {
            serde_json::json!({
                "name": wf.name,
                "description": wf.description,
                "endpoint": format!("/workflows/{}", wf.name),
            })
        })
        .collect();

    Json(serde_json::json!({
        "total": workflows.len(),
        "workflows": workflows,
    }))
}

/// An empty body runs the workflow with its defaults.
async fn run_workflow(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<WorkflowOutput>, ServerError> {
    if state.workflows.get(&name).is_none() {
        return Err(ServerError::NotFound(format!("Workflow '{}' not found", name)));
    }

    let params = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ServerError::BadRequest(format!("Invalid JSON body: {}", e)))?
    };

    let request = WorkflowRequest::parse(&name, params)?;
    let output = state.runner.invoke(request).await?;
    Ok(Json(output))
}
