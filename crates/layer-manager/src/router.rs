//! Local invoke server
//!
//! Outside Lambda the handler is served over HTTP so it can be driven with
//! plain `curl`. `POST /invoke` takes the same event document the Lambda
//! runtime would deliver and returns the same response document.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::runtime::handle_event;
use crate::AppState;

/// Create the router for the local invoke server
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/invoke", post(invoke))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn invoke(State(state): State<Arc<AppState>>, Json(event): Json<Value>) -> Json<Value> {
    let invocation_id = Uuid::new_v4().to_string();
    tracing::debug!(invocation_id = %invocation_id, "Incoming invocation");

    let response = handle_event(&state.services, &state.config, &event, &invocation_id).await;
    Json(response.to_json())
}

/// Serve the local invoke server until the listener fails
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", state.config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Invoke server listening on {}", addr);

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
