//! In-memory collaborators for testing
//!
//! `MemoryObjectStore` keeps objects in a map, `MemoryPlatform` publishes
//! versions by copying the referenced object out of that store, and
//! `RecordingInstaller` writes a minimal package tree for each install.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{LayerPlatform, LayerVersion, ObjectStore, PublishRequest, ServiceError, ServiceFuture};
use crate::installer::PackageInstaller;

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    denied: bool,
    fail_puts: bool,
    puts: Mutex<usize>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose probe always fails
    pub fn denied() -> Self {
        Self { denied: true, ..Self::default() }
    }

    /// A store that rejects every upload
    pub fn read_only() -> Self {
        Self { fail_puts: true, ..Self::default() }
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn put_count(&self) -> usize {
        *self.puts.lock().unwrap()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn probe<'a>(&'a self, bucket: &'a str) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            if self.denied {
                return Err(ServiceError::AccessDenied(format!("bucket {}", bucket)));
            }
            Ok(())
        })
    }

    fn put_object<'a>(&'a self, bucket: &'a str, key: &'a str, data: Vec<u8>) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            *self.puts.lock().unwrap() += 1;
            if self.fail_puts {
                return Err(ServiceError::AccessDenied(format!("PutObject {}/{}", bucket, key)));
            }
            self.objects
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), data);
            Ok(())
        })
    }
}

struct StoredVersion {
    version: i64,
    arn: String,
    archive: Vec<u8>,
}

pub struct MemoryPlatform {
    storage: Arc<MemoryObjectStore>,
    layers: Mutex<HashMap<String, Vec<StoredVersion>>>,
    publishes: Mutex<Vec<PublishRequest>>,
    denied: bool,
    fail_publish: bool,
}

impl MemoryPlatform {
    pub fn new(storage: Arc<MemoryObjectStore>) -> Self {
        Self {
            storage,
            layers: Mutex::new(HashMap::new()),
            publishes: Mutex::new(Vec::new()),
            denied: false,
            fail_publish: false,
        }
    }

    /// A platform whose probe always fails
    pub fn denied(storage: Arc<MemoryObjectStore>) -> Self {
        Self { denied: true, ..Self::new(storage) }
    }

    /// A platform that rejects every publish
    pub fn rejecting_publish(storage: Arc<MemoryObjectStore>) -> Self {
        Self { fail_publish: true, ..Self::new(storage) }
    }

    /// Seed a version directly, bypassing the object store
    pub fn seed(&self, layer_name: &str, archive: Vec<u8>) -> LayerVersion {
        let mut layers = self.layers.lock().unwrap();
        let versions = layers.entry(layer_name.to_string()).or_default();
        let version = versions.len() as i64 + 1;
        let arn = layer_arn(layer_name, version);
        versions.push(StoredVersion { version, arn: arn.clone(), archive });
        LayerVersion { version, arn }
    }

    pub fn publishes(&self) -> Vec<PublishRequest> {
        self.publishes.lock().unwrap().clone()
    }

    pub fn version_count(&self, layer_name: &str) -> usize {
        self.layers
            .lock()
            .unwrap()
            .get(layer_name)
            .map_or(0, Vec::len)
    }
}

fn layer_arn(layer_name: &str, version: i64) -> String {
    format!("arn:aws:lambda:us-east-1:123456789012:layer:{}:{}", layer_name, version)
}

impl LayerPlatform for MemoryPlatform {
    fn probe(&self) -> ServiceFuture<'_, ()> {
        Box::pin(async move {
            if self.denied {
                return Err(ServiceError::AccessDenied("lambda:ListFunctions".into()));
            }
            Ok(())
        })
    }

    fn list_layer_versions<'a>(&'a self, layer_name: &'a str) -> ServiceFuture<'a, Vec<LayerVersion>> {
        Box::pin(async move {
            let layers = self.layers.lock().unwrap();
            // Newest first, as the real API reports them
            Ok(layers
                .get(layer_name)
                .map(|versions| {
                    versions
                        .iter()
                        .rev()
                        .map(|v| LayerVersion { version: v.version, arn: v.arn.clone() })
                        .collect()
                })
                .unwrap_or_default())
        })
    }

    fn layer_content_location<'a>(&'a self, layer_name: &'a str, version: i64) -> ServiceFuture<'a, String> {
        Box::pin(async move {
            let layers = self.layers.lock().unwrap();
            let exists = layers
                .get(layer_name)
                .map_or(false, |versions| versions.iter().any(|v| v.version == version));
            if !exists {
                return Err(ServiceError::NotFound(format!("{}:{}", layer_name, version)));
            }
            Ok(format!("memory://{}/{}", layer_name, version))
        })
    }

    fn download_content<'a>(&'a self, location: &'a str) -> ServiceFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let not_found = || ServiceError::NotFound(location.to_string());
            let (layer_name, version) = location
                .strip_prefix("memory://")
                .and_then(|rest| rest.rsplit_once('/'))
                .ok_or_else(not_found)?;
            let version: i64 = version.parse().map_err(|_| not_found())?;

            let layers = self.layers.lock().unwrap();
            layers
                .get(layer_name)
                .and_then(|versions| versions.iter().find(|v| v.version == version))
                .map(|v| v.archive.clone())
                .ok_or_else(not_found)
        })
    }

    fn publish_layer_version<'a>(&'a self, request: &'a PublishRequest) -> ServiceFuture<'a, LayerVersion> {
        Box::pin(async move {
            self.publishes.lock().unwrap().push(request.clone());
            if self.fail_publish {
                return Err(ServiceError::OperationFailed("layer quota exceeded".into()));
            }

            let archive = self
                .storage
                .get(&request.bucket, &request.key)
                .ok_or_else(|| ServiceError::NotFound(format!("{}/{}", request.bucket, request.key)))?;
            Ok(self.seed(&request.layer_name, archive))
        })
    }
}

/// Installer that writes `<name>/__init__.py` and `<name>-<version>.dist-info/METADATA`
/// for each package and lists packages from the `.dist-info` directories.
pub struct RecordingInstaller {
    installs: Mutex<Vec<String>>,
    payload_bytes: u64,
    failing: Option<String>,
}

impl RecordingInstaller {
    pub fn new() -> Self {
        Self {
            installs: Mutex::new(Vec::new()),
            payload_bytes: 0,
            failing: None,
        }
    }

    /// Every install also creates a sparse file of `bytes` length
    pub fn with_payload(bytes: u64) -> Self {
        Self { payload_bytes: bytes, ..Self::new() }
    }

    /// Installing `package` fails
    pub fn failing_on(package: &str) -> Self {
        Self { failing: Some(package.to_string()), ..Self::new() }
    }

    pub fn installs(&self) -> Vec<String> {
        self.installs.lock().unwrap().clone()
    }
}

/// Version the recording installer assigns to a package
pub fn fake_version(package: &str) -> String {
    format!("1.{}.0", package.len())
}

impl PackageInstaller for RecordingInstaller {
    fn install<'a>(&'a self, package: &'a str, target: &'a Path) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            self.installs.lock().unwrap().push(package.to_string());
            if self.failing.as_deref() == Some(package) {
                return Err(ServiceError::OperationFailed(format!(
                    "No matching distribution found for {}",
                    package
                )));
            }

            let write = || -> std::io::Result<()> {
                let module = target.join(package);
                fs::create_dir_all(&module)?;
                fs::write(module.join("__init__.py"), format!("NAME = {:?}\n", package))?;
                let dist_info = target.join(format!("{}-{}.dist-info", package, fake_version(package)));
                fs::create_dir_all(&dist_info)?;
                fs::write(
                    dist_info.join("METADATA"),
                    format!("Name: {}\nVersion: {}\n", package, fake_version(package)),
                )?;
                if self.payload_bytes > 0 {
                    fs::File::create(module.join("payload.bin"))?.set_len(self.payload_bytes)?;
                }
                Ok(())
            };
            write().map_err(|e| ServiceError::OperationFailed(e.to_string()))
        })
    }

    fn list_installed<'a>(&'a self, target: &'a Path) -> ServiceFuture<'a, String> {
        Box::pin(async move {
            let mut rows = Vec::new();
            let entries = fs::read_dir(target).map_err(|e| ServiceError::OperationFailed(e.to_string()))?;
            for entry in entries {
                let name = entry
                    .map_err(|e| ServiceError::OperationFailed(e.to_string()))?
                    .file_name()
                    .to_string_lossy()
                    .into_owned();
                if let Some(dist) = name.strip_suffix(".dist-info") {
                    if let Some((package, version)) = dist.rsplit_once('-') {
                        rows.push((package.to_string(), version.to_string()));
                    }
                }
            }
            rows.sort();

            let mut out = String::from("Package Version\n------- -------\n");
            for (package, version) in rows {
                out.push_str(&format!("{} {}\n", package, version));
            }
            Ok(out)
        })
    }
}
