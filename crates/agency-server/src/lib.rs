//! Agency Server - HTTP surface for the agency deployment
//!
//! A thin axum layer over `agency-core`, providing:
//! - health, configuration and workflow listing endpoints
//! - database status and on-demand migrations
//! - `POST /workflows/{name}` to run a registered conversation
//!
//! The CLI's `serve` command builds the state and calls
//! [`start_server_with_state`]; tests drive [`build_router`] in-process.

pub mod api;

use std::net::SocketAddr;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use agency_core::state::{AppState, AppStateInner};

/// Listener configuration for the HTTP server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: agency_core::config::DEFAULT_PORT,
        }
    }
}

/// The complete application router: every route plus CORS and request tracing.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::api_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server with a pre-built `AppState`.
///
/// Runs the async connectivity check once before binding; an unreachable
/// database is logged and the server starts anyway. Returns the actual
/// address the server is listening on.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    if state.db.check_connection_async().await {
        tracing::info!("Database connection verified");
    } else {
        tracing::warn!("Database connection failed, but the server will start anyway");
    }

    if state.settings.web_ui_enabled {
        tracing::info!("ENABLE_WEB_UI is set; only the REST API is served by this binary");
    } else {
        tracing::info!("Web UI disabled, serving the REST API only");
    }

    let app = build_router(state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("Agency server listening on {}", local_addr);

    // Spawn the server in a background task
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}
