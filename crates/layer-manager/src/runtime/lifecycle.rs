//! Layer lifecycle
//!
//! Implements the three actions on top of the service traits:
//!
//! | Action | Staging | Install | Size guard | Publish |
//! |--------|---------|---------|------------|---------|
//! | `create_new` | empty, layer must not exist | yes | yes | yes |
//! | `read_only` | latest version | no | no | no (lists packages) |
//! | `update` | latest version | yes | yes | yes |

use std::path::{Path, PathBuf};

use layer_manager_sdk::listing::parse_listing;
use layer_manager_sdk::{LayerError, LayerRequest, LayerResponse};
use tokio::task;
use tracing::{debug, info, instrument};

use crate::bundle::{check_size_limit, pack_directory, unpack_archive, StagingArea, ARCHIVE_KEY, ARCHIVE_ROOT};
use crate::services::{LayerVersion, PublishRequest, ServiceError, Services};

/// Runtimes every published version declares
pub const COMPATIBLE_RUNTIMES: &[&str] = &["python3.11"];

/// Architectures every published version declares
pub const COMPATIBLE_ARCHITECTURES: &[&str] = &["x86_64", "arm64"];

/// Runs one action for one invocation
pub struct LayerManager<'a> {
    services: &'a Services,
    scratch_dir: &'a Path,
    invocation_id: &'a str,
}

impl<'a> LayerManager<'a> {
    pub fn new(services: &'a Services, scratch_dir: &'a Path, invocation_id: &'a str) -> Self {
        Self {
            services,
            scratch_dir,
            invocation_id,
        }
    }

    /// Publish the first version of a layer
    #[instrument(skip_all, fields(layer = %request.layer_name))]
    pub async fn create(&self, request: &LayerRequest) -> Result<LayerResponse, LayerError> {
        let existing = self.versions(&request.layer_name).await?;
        if !existing.is_empty() {
            info!(versions = existing.len(), "Layer already exists");
            return Err(LayerError::AlreadyExists);
        }

        let staging = self.staging()?;
        let outcome = self.install_and_publish(request, &staging).await;
        staging.remove().await;
        let published = outcome?;

        info!(version = published.version, arn = %published.arn, "Layer created");
        Ok(LayerResponse::created(published.arn))
    }

    /// List the packages installed in the latest version
    #[instrument(skip_all, fields(layer = %request.layer_name))]
    pub async fn read(&self, request: &LayerRequest) -> Result<LayerResponse, LayerError> {
        let staging = self.stage_latest(&request.layer_name).await?;
        let outcome = self
            .services
            .installer
            .list_installed(&staging.package_root())
            .await;
        staging.remove().await;

        let raw = outcome.map_err(|e| match e {
            ServiceError::Timeout => LayerError::Timeout("listing installed packages".into()),
            other => LayerError::Listing(other.to_string()),
        })?;

        let listing = parse_listing(&raw)?;
        info!(packages = listing.len(), "Layer inspected");
        Ok(LayerResponse::inspected(listing))
    }

    /// Install packages on top of the latest version and publish the result
    #[instrument(skip_all, fields(layer = %request.layer_name))]
    pub async fn update(&self, request: &LayerRequest) -> Result<LayerResponse, LayerError> {
        let staging = self.stage_latest(&request.layer_name).await?;
        let outcome = self.install_and_publish(request, &staging).await;
        staging.remove().await;
        let published = outcome?;

        info!(version = published.version, arn = %published.arn, "Layer updated");
        Ok(LayerResponse::updated(published.arn))
    }

    /// Install, size-check and publish a staged tree
    async fn install_and_publish(
        &self,
        request: &LayerRequest,
        staging: &StagingArea,
    ) -> Result<LayerVersion, LayerError> {
        self.install_all(&request.libraries, staging).await?;
        enforce_size_limit(staging)?;
        self.publish(request, staging).await
    }

    fn staging(&self) -> Result<StagingArea, LayerError> {
        let staging = StagingArea::prepare(self.scratch_dir, self.invocation_id)?;
        debug!("Staging in {:?}", staging.workdir());
        Ok(staging)
    }

    async fn versions(&self, layer_name: &str) -> Result<Vec<LayerVersion>, LayerError> {
        self.services
            .platform
            .list_layer_versions(layer_name)
            .await
            .map_err(|e| LayerError::Platform(e.to_string()))
    }

    /// Download the highest-numbered version and unpack it into a fresh staging area
    async fn stage_latest(&self, layer_name: &str) -> Result<StagingArea, LayerError> {
        let latest = self
            .versions(layer_name)
            .await?
            .into_iter()
            .max_by_key(|v| v.version)
            .ok_or_else(|| LayerError::LayerNotFound(layer_name.to_string()))?;

        let location = self
            .services
            .platform
            .layer_content_location(layer_name, latest.version)
            .await
            .map_err(|e| LayerError::Platform(e.to_string()))?;

        let archive = self
            .services
            .platform
            .download_content(&location)
            .await
            .map_err(|e| match e {
                ServiceError::Timeout => LayerError::Timeout(format!("downloading version {}", latest.version)),
                other => LayerError::Download(other.to_string()),
            })?;

        let staging = self.staging()?;
        let workdir = staging.workdir().to_path_buf();
        let files = task::spawn_blocking(move || unpack_archive(&archive, &workdir))
            .await
            .map_err(|e| LayerError::Archive(e.to_string()))??;

        info!(version = latest.version, files, "Staged current layer contents");
        Ok(staging)
    }

    /// Install each package in order; the first failure stops the invocation
    async fn install_all(&self, libraries: &[String], staging: &StagingArea) -> Result<(), LayerError> {
        let root = staging.package_root();
        for package in libraries {
            self.services
                .installer
                .install(package, &root)
                .await
                .map_err(|e| match e {
                    ServiceError::Timeout => LayerError::Timeout(format!("installing {}", package)),
                    other => LayerError::Install {
                        package: package.clone(),
                        detail: other.to_string(),
                    },
                })?;
        }
        Ok(())
    }

    /// Pack, upload and publish the staged package root
    async fn publish(&self, request: &LayerRequest, staging: &StagingArea) -> Result<LayerVersion, LayerError> {
        let root: PathBuf = staging.package_root();
        let archive = task::spawn_blocking(move || pack_directory(&root, ARCHIVE_ROOT))
            .await
            .map_err(|e| LayerError::Archive(e.to_string()))??;

        debug!(bytes = archive.len(), bucket = %request.s3_bucket, key = ARCHIVE_KEY, "Uploading layer archive");
        self.services
            .storage
            .put_object(&request.s3_bucket, ARCHIVE_KEY, archive)
            .await
            .map_err(|e| LayerError::Upload(e.to_string()))?;

        let publish = PublishRequest {
            layer_name: request.layer_name.clone(),
            bucket: request.s3_bucket.clone(),
            key: ARCHIVE_KEY.to_string(),
            compatible_runtimes: COMPATIBLE_RUNTIMES.iter().map(|r| r.to_string()).collect(),
            compatible_architectures: COMPATIBLE_ARCHITECTURES.iter().map(|a| a.to_string()).collect(),
        };

        self.services
            .platform
            .publish_layer_version(&publish)
            .await
            .map_err(|e| LayerError::Publish(e.to_string()))
    }
}

/// Size guard: runs after installation and before anything is archived
fn enforce_size_limit(staging: &StagingArea) -> Result<(), LayerError> {
    let size_mb = staging.size_mb()?;
    debug!(size_mb, "Measured staged layer");
    check_size_limit(size_mb)
}
