pub mod db;
pub mod system;
pub mod workflows;

use axum::Router;

use crate::AppState;

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(system::router())
        .nest("/db", db::router())
        .nest("/workflows", workflows::router())
}
