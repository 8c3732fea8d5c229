//! Per-invocation staging directory and size guard

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use layer_manager_sdk::LayerError;
use walkdir::WalkDir;

use super::ARCHIVE_ROOT;

/// Largest layer size accepted, in whole megabytes (exclusive)
pub const SIZE_LIMIT_MB: u64 = 250;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Working tree for one invocation.
///
/// Lives at `<scratch>/layer-<invocation id>/` and holds the package root
/// `python/`. The directory is removed when the area is dropped.
#[derive(Debug)]
pub struct StagingArea {
    workdir: PathBuf,
}

impl StagingArea {
    /// Create an empty staging area, clearing anything a previous invocation
    /// with the same id left behind.
    pub fn prepare(scratch_dir: &Path, invocation_id: &str) -> io::Result<Self> {
        let workdir = scratch_dir.join(format!("layer-{}", sanitize(invocation_id)));

        if workdir.exists() {
            tracing::debug!("Clearing stale staging directory {:?}", workdir);
            fs::remove_dir_all(&workdir)?;
        }
        fs::create_dir_all(workdir.join(ARCHIVE_ROOT))?;

        Ok(Self { workdir })
    }

    /// Directory archives are unpacked into
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Directory packages are installed into
    pub fn package_root(&self) -> PathBuf {
        self.workdir.join(ARCHIVE_ROOT)
    }

    /// Total size of the package root in bytes
    pub fn size_bytes(&self) -> io::Result<u64> {
        directory_size(&self.package_root())
    }

    /// Total size of the package root in whole megabytes
    pub fn size_mb(&self) -> io::Result<u64> {
        Ok(self.size_bytes()? / BYTES_PER_MB)
    }
}

impl StagingArea {
    /// Remove the staging directory on the blocking pool
    pub async fn remove(mut self) {
        let workdir = std::mem::take(&mut self.workdir);
        if let Err(e) = tokio::task::spawn_blocking(move || remove_workdir(&workdir)).await {
            tracing::warn!("Staging cleanup task failed: {}", e);
        }
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        // Empty after `remove`
        if !self.workdir.as_os_str().is_empty() {
            remove_workdir(&self.workdir);
        }
    }
}

fn remove_workdir(workdir: &Path) {
    if let Err(e) = fs::remove_dir_all(workdir) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove staging directory {:?}: {}", workdir, e);
        }
    }
}

/// Reject layers at or above [`SIZE_LIMIT_MB`]
pub fn check_size_limit(size_mb: u64) -> Result<(), LayerError> {
    if size_mb >= SIZE_LIMIT_MB {
        return Err(LayerError::SizeLimit { size_mb });
    }
    Ok(())
}

/// Sum of the lengths of all files under `path`, following symlinks
pub fn directory_size(path: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(path).follow_links(true) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            total += entry.metadata().map_err(io::Error::from)?.len();
        }
    }
    Ok(total)
}

/// Keep invocation ids usable as a single path component
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit_boundary() {
        assert!(check_size_limit(249).is_ok());
        assert!(matches!(
            check_size_limit(250),
            Err(LayerError::SizeLimit { size_mb: 250 })
        ));
        assert!(check_size_limit(0).is_ok());
    }

    #[test]
    fn test_prepare_clears_previous_contents() {
        let scratch = tempfile::tempdir().unwrap();
        let stale = scratch.path().join("layer-abc/python/old");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("module.py"), "x = 1").unwrap();

        let staging = StagingArea::prepare(scratch.path(), "abc").unwrap();
        assert!(staging.package_root().is_dir());
        assert_eq!(fs::read_dir(staging.package_root()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_removes_workdir() {
        let scratch = tempfile::tempdir().unwrap();
        let workdir = {
            let staging = StagingArea::prepare(scratch.path(), "req-1").unwrap();
            staging.workdir().to_path_buf()
        };
        assert!(!workdir.exists());
    }

    #[tokio::test]
    async fn test_remove_deletes_workdir() {
        let scratch = tempfile::tempdir().unwrap();
        let staging = StagingArea::prepare(scratch.path(), "req-2").unwrap();
        fs::write(staging.package_root().join("module.py"), "x = 1").unwrap();
        let workdir = staging.workdir().to_path_buf();

        staging.remove().await;
        assert!(!workdir.exists());
        assert!(scratch.path().exists());
    }

    #[test]
    fn test_invocations_do_not_share_directories() {
        let scratch = tempfile::tempdir().unwrap();
        let first = StagingArea::prepare(scratch.path(), "one").unwrap();
        let second = StagingArea::prepare(scratch.path(), "two").unwrap();
        assert_ne!(first.workdir(), second.workdir());
    }

    #[test]
    fn test_invocation_id_stays_inside_scratch() {
        let scratch = tempfile::tempdir().unwrap();
        let staging = StagingArea::prepare(scratch.path(), "../../etc").unwrap();
        assert_eq!(staging.workdir().parent(), Some(scratch.path()));
    }

    #[test]
    fn test_size_counts_files() {
        let scratch = tempfile::tempdir().unwrap();
        let staging = StagingArea::prepare(scratch.path(), "sized").unwrap();
        let root = staging.package_root();
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::write(root.join("pkg/a.py"), vec![0u8; 1000]).unwrap();
        fs::write(root.join("b.py"), vec![0u8; 24]).unwrap();

        assert_eq!(staging.size_bytes().unwrap(), 1024);
        assert_eq!(staging.size_mb().unwrap(), 0);

        let big = fs::File::create(root.join("big.bin")).unwrap();
        big.set_len(3 * BYTES_PER_MB).unwrap();
        assert_eq!(staging.size_mb().unwrap(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_size_counts_symlink_targets() {
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("lib.so"), vec![0u8; 2048]).unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let staging = StagingArea::prepare(scratch.path(), "linked").unwrap();
        std::os::unix::fs::symlink(outside.path().join("lib.so"), staging.package_root().join("lib.so")).unwrap();

        assert_eq!(staging.size_bytes().unwrap(), 2048);
    }
}
