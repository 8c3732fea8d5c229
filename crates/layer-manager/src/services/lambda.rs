//! AWS Lambda layer platform connector

use anyhow::{Context, Result};
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_lambda::types::{Architecture, LayerVersionContentInput, Runtime};
use aws_sdk_lambda::Client;
use tracing::{debug, instrument};

use super::{LayerPlatform, LayerVersion, PublishRequest, ServiceError, ServiceFuture};
use crate::config::AppConfig;

/// Lambda control-plane client plus an HTTP client for layer content downloads
pub struct LambdaPlatform {
    client: Client,
    http: reqwest::Client,
}

impl LambdaPlatform {
    pub fn new(client: Client, http: reqwest::Client) -> Self {
        Self { client, http }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(config.service_timeout())
            .build();

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .timeout_config(timeouts)
            .load()
            .await;

        let http = reqwest::Client::builder()
            .timeout(config.service_timeout())
            .build()
            .context("build layer download client")?;

        tracing::info!(region = %config.region, "Lambda client initialised");
        Ok(Self::new(Client::new(&sdk_config), http))
    }
}

impl LayerPlatform for LambdaPlatform {
    fn probe(&self) -> ServiceFuture<'_, ()> {
        Box::pin(async move {
            self.client
                .list_functions()
                .max_items(1)
                .send()
                .await
                .map_err(|e| ServiceError::AccessDenied(e.to_string()))?;
            Ok(())
        })
    }

    fn list_layer_versions<'a>(&'a self, layer_name: &'a str) -> ServiceFuture<'a, Vec<LayerVersion>> {
        Box::pin(list_layer_versions(&self.client, layer_name))
    }

    fn layer_content_location<'a>(&'a self, layer_name: &'a str, version: i64) -> ServiceFuture<'a, String> {
        Box::pin(async move {
            let resp = self
                .client
                .get_layer_version()
                .layer_name(layer_name)
                .version_number(version)
                .send()
                .await
                .map_err(|e| ServiceError::OperationFailed(e.to_string()))?;

            resp.content()
                .and_then(|content| content.location())
                .map(str::to_string)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("content location of {}:{}", layer_name, version))
                })
        })
    }

    fn download_content<'a>(&'a self, location: &'a str) -> ServiceFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let resp = self
                .http
                .get(location)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        ServiceError::Timeout
                    } else {
                        ServiceError::OperationFailed(e.to_string())
                    }
                })?
                .error_for_status()
                .map_err(|e| ServiceError::OperationFailed(e.to_string()))?;

            let bytes = resp
                .bytes()
                .await
                .map_err(|e| ServiceError::OperationFailed(e.to_string()))?;

            debug!(bytes = bytes.len(), "Layer content downloaded");
            Ok(bytes.to_vec())
        })
    }

    fn publish_layer_version<'a>(&'a self, request: &'a PublishRequest) -> ServiceFuture<'a, LayerVersion> {
        Box::pin(async move {
            let content = LayerVersionContentInput::builder()
                .s3_bucket(&request.bucket)
                .s3_key(&request.key)
                .build();

            let runtimes = request
                .compatible_runtimes
                .iter()
                .map(|r| Runtime::from(r.as_str()))
                .collect();
            let architectures = request
                .compatible_architectures
                .iter()
                .map(|a| Architecture::from(a.as_str()))
                .collect();

            let resp = self
                .client
                .publish_layer_version()
                .layer_name(&request.layer_name)
                .content(content)
                .set_compatible_runtimes(Some(runtimes))
                .set_compatible_architectures(Some(architectures))
                .send()
                .await
                .map_err(|e| ServiceError::OperationFailed(e.to_string()))?;

            let arn = resp.layer_version_arn().ok_or_else(|| {
                ServiceError::OperationFailed("publish response carried no layer version ARN".into())
            })?;

            Ok(LayerVersion {
                version: resp.version(),
                arn: arn.to_string(),
            })
        })
    }
}

/// List every version of a layer, following pagination markers.
///
/// A layer that does not exist has no versions.
#[instrument(skip(client))]
async fn list_layer_versions(client: &Client, layer_name: &str) -> Result<Vec<LayerVersion>, ServiceError> {
    let mut versions = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        let mut req = client.list_layer_versions().layer_name(layer_name);
        if let Some(ref m) = marker {
            req = req.marker(m);
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(err) => {
                if err
                    .as_service_error()
                    .map_or(false, |e| e.is_resource_not_found_exception())
                {
                    debug!("layer does not exist");
                    return Ok(Vec::new());
                }
                return Err(ServiceError::OperationFailed(err.to_string()));
            }
        };

        for item in resp.layer_versions() {
            versions.push(LayerVersion {
                version: item.version(),
                arn: item.layer_version_arn().unwrap_or_default().to_string(),
            });
        }

        match resp.next_marker() {
            Some(next) => marker = Some(next.to_string()),
            None => break,
        }
    }

    debug!(count = versions.len(), "listed layer versions");
    Ok(versions)
}
