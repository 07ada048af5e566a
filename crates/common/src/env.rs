//! Environment/runtime helpers
//!
//! Startup checks on the configured session storage location. Creating the
//! directory is left to the storage itself; this only catches paths that
//! can never work so the console fails with a clear message.

use std::path::Path;

use anyhow::bail;
use tracing::debug;

/// Reject storage paths that cannot hold a session file.
///
/// Fails when the path is an existing directory, when an existing ancestor
/// in place of the parent directory is a regular file, or when the parent
/// directory is read-only. A parent that does not exist yet is accepted.
pub async fn check_storage_path(storage_path: &str) -> anyhow::Result<()> {
    let path = Path::new(storage_path);
    if storage_path.trim().is_empty() {
        bail!("storage path is empty");
    }
    if let Ok(meta) = tokio::fs::metadata(path).await {
        if meta.is_dir() {
            bail!("storage path {} is a directory, expected a file", path.display());
        }
    }

    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    // walk up to the nearest existing ancestor; everything below it gets created later
    for dir in parent.ancestors().filter(|p| !p.as_os_str().is_empty()) {
        let Ok(meta) = tokio::fs::metadata(dir).await else {
            continue;
        };
        if !meta.is_dir() {
            bail!("{} is not a directory; cannot store {}", dir.display(), path.display());
        }
        if meta.permissions().readonly() {
            bail!("storage directory {} is read-only", dir.display());
        }
        debug!(dir = %dir.display(), "storage location usable");
        return Ok(());
    }
    debug!(dir = %parent.display(), "no existing ancestor; storage will create it");
    Ok(())
}
