//! Package installer service
//!
//! Installs Python packages into a layer's package root by shelling out to
//! `python -m pip`, and reports what a package root contains.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::services::{ServiceError, ServiceFuture};

/// Installs packages into, and lists packages of, a target directory
pub trait PackageInstaller: Send + Sync {
    /// Install one package (and its dependencies) into `target`
    fn install<'a>(&'a self, package: &'a str, target: &'a Path) -> ServiceFuture<'a, ()>;

    /// Tabular `Package Version` listing of everything installed in `target`
    fn list_installed<'a>(&'a self, target: &'a Path) -> ServiceFuture<'a, String>;
}

/// pip-backed installer
pub struct PipInstaller {
    python: String,
    timeout: Duration,
}

impl PipInstaller {
    pub fn new(python: impl Into<String>, timeout: Duration) -> Self {
        Self {
            python: python.into(),
            timeout,
        }
    }

    /// Build the pip command line for `args`
    fn command(&self, args: &[&OsStr]) -> Command {
        let mut cmd = Command::new(&self.python);
        cmd.args(["-m", "pip", "--disable-pip-version-check", "--no-input"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run a pip command, killing it if it outlives the timeout
    async fn run(&self, mut cmd: Command, what: &str) -> Result<Output, ServiceError> {
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| {
                ServiceError::OperationFailed(format!("failed to spawn {}: {}", self.python, e))
            })?,
            Err(_) => {
                tracing::warn!("{} exceeded {:?}", what, self.timeout);
                return Err(ServiceError::Timeout);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServiceError::OperationFailed(format!(
                "{} failed (status {}): {}",
                what,
                output.status,
                stderr.trim()
            )));
        }

        Ok(output)
    }
}

impl PackageInstaller for PipInstaller {
    fn install<'a>(&'a self, package: &'a str, target: &'a Path) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            tracing::info!("Installing {} into {:?}", package, target);

            let cmd = self.command(&[
                OsStr::new("install"),
                OsStr::new(package),
                OsStr::new("-t"),
                target.as_os_str(),
            ]);
            self.run(cmd, &format!("pip install {}", package)).await?;

            tracing::debug!("Installed {}", package);
            Ok(())
        })
    }

    fn list_installed<'a>(&'a self, target: &'a Path) -> ServiceFuture<'a, String> {
        Box::pin(async move {
            let cmd = self.command(&[OsStr::new("list"), OsStr::new("--path"), target.as_os_str()]);
            let output = self.run(cmd, "pip list").await?;
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        })
    }
}
