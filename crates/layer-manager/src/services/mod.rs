//! Service Connectors
//!
//! The layer manager talks to three collaborators:
//! - Object storage (S3) - receives the packed layer archive
//! - Layer platform (AWS Lambda) - lists, downloads and publishes layer versions
//! - Package installer (pip) - see [`crate::installer`]
//!
//! Each is a trait so the lifecycle can run against in-memory doubles.

pub mod s3;
pub mod lambda;
#[cfg(test)]
pub mod memory;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;

use crate::config::AppConfig;
use crate::installer::{PackageInstaller, PipInstaller};

pub use lambda::LambdaPlatform;
pub use s3::S3ObjectStore;

/// Boxed future returned by service trait methods
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'a>>;

/// Errors related to service operations
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Object storage holding the archive that a layer version is published from
pub trait ObjectStore: Send + Sync {
    /// Cheapest possible read: list at most one object
    fn probe<'a>(&'a self, bucket: &'a str) -> ServiceFuture<'a, ()>;

    /// Store an object, replacing any previous content under the key
    fn put_object<'a>(&'a self, bucket: &'a str, key: &'a str, data: Vec<u8>) -> ServiceFuture<'a, ()>;
}

/// A published layer version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerVersion {
    pub version: i64,
    pub arn: String,
}

/// Parameters of a publish call
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub layer_name: String,
    pub bucket: String,
    pub key: String,
    pub compatible_runtimes: Vec<String>,
    pub compatible_architectures: Vec<String>,
}

/// Compute-platform control API for layers
pub trait LayerPlatform: Send + Sync {
    /// Cheapest possible read: list at most one function
    fn probe(&self) -> ServiceFuture<'_, ()>;

    /// All versions of a layer; empty when the layer has never been published
    fn list_layer_versions<'a>(&'a self, layer_name: &'a str) -> ServiceFuture<'a, Vec<LayerVersion>>;

    /// Download location of a version's archive
    fn layer_content_location<'a>(&'a self, layer_name: &'a str, version: i64) -> ServiceFuture<'a, String>;

    /// Fetch an archive from a location returned by [`LayerPlatform::layer_content_location`]
    fn download_content<'a>(&'a self, location: &'a str) -> ServiceFuture<'a, Vec<u8>>;

    /// Publish a new version from an uploaded archive
    fn publish_layer_version<'a>(&'a self, request: &'a PublishRequest) -> ServiceFuture<'a, LayerVersion>;
}

/// Container for the collaborators an invocation uses
#[derive(Clone)]
pub struct Services {
    pub storage: Arc<dyn ObjectStore>,
    pub platform: Arc<dyn LayerPlatform>,
    pub installer: Arc<dyn PackageInstaller>,
}

impl Services {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        platform: Arc<dyn LayerPlatform>,
        installer: Arc<dyn PackageInstaller>,
    ) -> Self {
        Self { storage, platform, installer }
    }

    /// Build the production services (S3, Lambda, pip) from configuration
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let storage = S3ObjectStore::from_config(config)?;
        let platform = LambdaPlatform::from_config(config).await?;
        let installer = PipInstaller::new(&config.python_bin, config.install_timeout());

        tracing::info!(region = %config.region, python = %config.python_bin, "Services initialised");

        Ok(Self::new(Arc::new(storage), Arc::new(platform), Arc::new(installer)))
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
