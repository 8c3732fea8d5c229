//! Layer Manager - Main entry point
//!
//! Builds, inspects and updates Python dependency layers for AWS Lambda.
//! Inside Lambda it runs as a function handler; anywhere else it serves the
//! same handler over a local HTTP endpoint.

mod bundle;
mod config;
mod installer;
mod router;
mod runtime;
mod services;

use std::sync::Arc;

use anyhow::Result;
use lambda_runtime::{service_fn, LambdaEvent};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::services::Services;

/// Shared application state
pub struct AppState {
    pub config: AppConfig,
    pub services: Services,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env();

    // CloudWatch does not render ANSI colours
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,layer_manager=debug".into()))
        .with(tracing_subscriber::fmt::layer().with_ansi(!config.in_lambda()))
        .init();

    tracing::info!("Starting Layer Manager");
    tracing::info!("Configuration loaded: {:?}", config);

    let services = Services::connect(&config).await?;
    let state = Arc::new(AppState { config, services });

    if state.config.in_lambda() {
        run_lambda(state).await
    } else {
        router::serve(state).await
    }
}

async fn run_lambda(state: Arc<AppState>) -> Result<()> {
    tracing::info!("Running under the Lambda runtime");

    let handler = service_fn(move |event: LambdaEvent<Value>| {
        let state = state.clone();
        async move {
            let response = runtime::handle_event(
                &state.services,
                &state.config,
                &event.payload,
                &event.context.request_id,
            )
            .await;
            Ok::<Value, lambda_runtime::Error>(response.to_json())
        }
    });

    lambda_runtime::run(handler)
        .await
        .map_err(|e| anyhow::anyhow!("Lambda runtime exited: {}", e))
}
