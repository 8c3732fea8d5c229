//! Access probing
//!
//! Fails an invocation early when the function cannot reach the bucket or the
//! Lambda API, before anything is staged or installed.

use layer_manager_sdk::LayerError;

use crate::services::Services;

/// One cheap read against storage, then one against the platform
pub async fn probe_access(services: &Services, bucket: &str) -> Result<(), LayerError> {
    if let Err(e) = services.storage.probe(bucket).await {
        tracing::warn!(%bucket, error = %e, "Storage access probe failed");
        return Err(LayerError::StorageAccess);
    }

    if let Err(e) = services.platform.probe().await {
        tracing::warn!(error = %e, "Platform access probe failed");
        return Err(LayerError::PlatformAccess);
    }

    Ok(())
}
