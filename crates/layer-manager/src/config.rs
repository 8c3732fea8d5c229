//! Application configuration

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory under which each invocation gets its own staging directory
    pub scratch_dir: PathBuf,

    /// AWS region for S3 and Lambda
    pub region: String,

    /// Port for the local invoke server (when not running inside Lambda)
    pub listen_port: u16,

    /// Python interpreter used to run pip
    pub python_bin: String,

    /// Timeout for a single package install or listing, in seconds
    pub install_timeout_secs: u64,

    /// Timeout for S3, Lambda API and content download calls, in seconds
    pub service_timeout_secs: u64,

    /// Lambda runtime API endpoint, set by the platform inside Lambda
    pub lambda_runtime_api: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            scratch_dir: env::var("LAYER_MANAGER_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir()),

            region: env::var("AWS_REGION")
                .unwrap_or_else(|_| "us-east-1".to_string()),

            listen_port: env::var("LAYER_MANAGER_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(9000),

            python_bin: env::var("LAYER_MANAGER_PYTHON")
                .unwrap_or_else(|_| "python3".to_string()),

            install_timeout_secs: env::var("LAYER_MANAGER_INSTALL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),

            service_timeout_secs: env::var("LAYER_MANAGER_SERVICE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),

            lambda_runtime_api: env::var("AWS_LAMBDA_RUNTIME_API").ok(),
        }
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.service_timeout_secs)
    }

    /// Whether the process was started by the Lambda runtime
    pub fn in_lambda(&self) -> bool {
        self.lambda_runtime_api.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
