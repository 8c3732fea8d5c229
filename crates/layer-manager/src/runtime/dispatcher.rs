//! Invocation dispatcher
//!
//! `validating -> probing_access -> routing -> {creating | reading | updating} -> done`
//!
//! Nothing is staged, installed or published until the request has passed
//! validation and both access probes.

use layer_manager_sdk::{Action, LayerError, LayerRequest, LayerResponse};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use super::lifecycle::LayerManager;
use super::probe::probe_access;
use crate::config::AppConfig;
use crate::services::Services;

/// Handle one invocation event. Every failure is turned into a response.
#[instrument(skip_all, fields(invocation = %invocation_id))]
pub async fn handle_event(
    services: &Services,
    config: &AppConfig,
    event: &Value,
    invocation_id: &str,
) -> LayerResponse {
    match dispatch(services, config, event, invocation_id).await {
        Ok(response) => response,
        Err(e) if e.is_diagnostic() => {
            warn!("Request rejected: {}", e);
            e.to_response()
        }
        Err(e) => {
            error!("Request failed: {}", e);
            e.to_response()
        }
    }
}

async fn dispatch(
    services: &Services,
    config: &AppConfig,
    event: &Value,
    invocation_id: &str,
) -> Result<LayerResponse, LayerError> {
    debug!("Validating request");
    let request = LayerRequest::from_event(event)?;

    debug!(bucket = %request.s3_bucket, "Probing access");
    probe_access(services, &request.s3_bucket).await?;

    let action = request.action()?;
    info!(
        %action,
        layer = %request.layer_name,
        libraries = request.libraries.len(),
        "Routing request"
    );

    let manager = LayerManager::new(services, &config.scratch_dir, invocation_id);
    match action {
        Action::CreateNew => manager.create(&request).await,
        Action::ReadOnly => manager.read(&request).await,
        Action::Update => manager.update(&request).await,
    }
}
