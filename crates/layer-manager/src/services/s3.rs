//! S3 object storage connector

use std::future::Future;
use std::time::Duration;

use s3::creds::Credentials;
use s3::{Bucket, Region};

use super::{ObjectStore, ServiceError, ServiceFuture};
use crate::config::AppConfig;

/// S3 connector. Buckets are named per request, so only the region and
/// credentials are held here.
///
/// Missing credentials are not fatal: every bucket call is then denied, and
/// the invocation reports that it has no access to the bucket.
pub struct S3ObjectStore {
    region: Region,
    credentials: Result<Credentials, String>,
    timeout: Duration,
}

impl S3ObjectStore {
    pub fn new(region: Region, credentials: Result<Credentials, String>, timeout: Duration) -> Self {
        Self { region, credentials, timeout }
    }

    /// Resolve region and credentials (environment, profile or instance role)
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let region: Region = config
            .region
            .parse()
            .map_err(|e| ServiceError::InvalidConfig(format!("region {:?}: {}", config.region, e)))?;

        let credentials = Credentials::default().map_err(|e| {
            tracing::warn!("No S3 credentials resolved, bucket access will be denied: {}", e);
            e.to_string()
        });

        Ok(Self::new(region, credentials, config.service_timeout()))
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>, ServiceError> {
        let credentials = self
            .credentials
            .as_ref()
            .map_err(|e| ServiceError::AccessDenied(format!("no S3 credentials: {}", e)))?;

        Bucket::new(name, self.region.clone(), credentials.clone())
            .map_err(|e| ServiceError::InvalidConfig(format!("bucket {}: {}", name, e)))
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ServiceError::Timeout)?
    }
}

impl ObjectStore for S3ObjectStore {
    fn probe<'a>(&'a self, bucket: &'a str) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            let handle = self.bucket(bucket)?;
            self.bounded(async move {
                let (_, status) = handle
                    .list_page(String::new(), None, None, None, Some(1))
                    .await
                    .map_err(|e| ServiceError::AccessDenied(e.to_string()))?;

                if !(200..300).contains(&status) {
                    return Err(ServiceError::AccessDenied(format!(
                        "ListObjectsV2 on {} returned status {}",
                        bucket, status
                    )));
                }
                Ok(())
            })
            .await
        })
    }

    fn put_object<'a>(&'a self, bucket: &'a str, key: &'a str, data: Vec<u8>) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            let handle = self.bucket(bucket)?;
            self.bounded(async move {
                let response = handle
                    .put_object(key, &data)
                    .await
                    .map_err(|e| ServiceError::OperationFailed(e.to_string()))?;

                let status = response.status_code();
                if !(200..300).contains(&status) {
                    return Err(ServiceError::OperationFailed(format!(
                        "PutObject {}/{} returned status {}",
                        bucket, key, status
                    )));
                }

                tracing::debug!(%bucket, %key, bytes = data.len(), "Object uploaded");
                Ok(())
            })
            .await
        })
    }
}
