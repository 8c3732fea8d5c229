//! Layer archive packing and unpacking

use std::fs;
use std::io::{self, Cursor};
use std::path::Path;

use layer_manager_sdk::LayerError;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Pack every regular file under `source` into a zip archive.
///
/// Entries are named `<prefix>/<path relative to source>` with `/`
/// separators, in file-name order. Symlinks are followed and stored as the
/// files they point to.
pub fn pack_directory(source: &Path, prefix: &str) -> Result<Vec<u8>, LayerError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut count = 0;

    for entry in WalkDir::new(source).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| LayerError::Archive(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| LayerError::Archive(e.to_string()))?;
        let name = archive_entry_name(prefix, relative);

        let mut options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        if let Some(mode) = file_mode(entry.path())? {
            options = options.unix_permissions(mode);
        }

        writer
            .start_file(name.as_str(), options)
            .map_err(|e| LayerError::Archive(format!("{}: {}", name, e)))?;
        let mut input = fs::File::open(entry.path())?;
        io::copy(&mut input, &mut writer)?;
        count += 1;
    }

    let cursor = writer
        .finish()
        .map_err(|e| LayerError::Archive(e.to_string()))?;

    tracing::debug!("Packed {} files from {:?}", count, source);
    Ok(cursor.into_inner())
}

/// Unpack a zip archive into `dest`, returning the number of files written.
///
/// Entries whose path would land outside `dest` are skipped.
pub fn unpack_archive(zip_bytes: &[u8], dest: &Path) -> Result<usize, LayerError> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))
        .map_err(|e| LayerError::Archive(format!("Failed to read zip archive: {}", e)))?;

    let mut count = 0;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| LayerError::Archive(e.to_string()))?;

        let Some(relative) = file.enclosed_name() else {
            tracing::warn!("Skipping archive entry outside the target: {:?}", file.name());
            continue;
        };
        let target = dest.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&target)?;
        io::copy(&mut file, &mut out)?;
        restore_mode(&target, file.unix_mode())?;

        count += 1;
    }

    tracing::debug!("Unpacked {} files into {:?}", count, dest);
    Ok(count)
}

fn archive_entry_name(prefix: &str, relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("{}/{}", prefix, parts.join("/"))
}

#[cfg(unix)]
fn file_mode(path: &Path) -> Result<Option<u32>, LayerError> {
    use std::os::unix::fs::PermissionsExt;
    Ok(Some(fs::metadata(path)?.permissions().mode() & 0o777))
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> Result<Option<u32>, LayerError> {
    Ok(None)
}

#[cfg(unix)]
fn restore_mode(path: &Path, mode: Option<u32>) -> Result<(), LayerError> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn restore_mode(_path: &Path, _mode: Option<u32>) -> Result<(), LayerError> {
    Ok(())
}
