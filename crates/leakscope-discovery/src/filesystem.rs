//! Input directory discovery and path confinement.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// List the pending inputs in `input_dir`.
///
/// Only regular files directly inside the directory are returned, sorted by
/// file name so passes over the same inputs are reproducible. Dot-files (the
/// dedup state file among them), the processed directory and symlinks are
/// skipped.
///
/// # Errors
/// Returns error if `input_dir` itself cannot be read.
pub async fn discover_inputs(input_dir: &Path, processed_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    let mut entries = fs::read_dir(input_dir).await?;

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read entry in {:?}: {}", input_dir, e);
                break;
            }
        };
        let path = entry.path();

        if entry.file_name().to_string_lossy().starts_with('.') || path == processed_dir {
            continue;
        }

        // symlink_metadata: a symlink must not be followed out of the input dir
        let metadata = match fs::symlink_metadata(&path).await {
            Ok(m) => m,
            Err(e) => {
                debug!("Failed to read metadata for {:?}: {}", path, e);
                continue;
            }
        };

        if metadata.is_symlink() {
            debug!("Skipping symlink: {:?}", path);
            continue;
        }
        if metadata.is_file() {
            inputs.push(path);
        }
    }

    inputs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Discovered {} inputs in {:?}", inputs.len(), input_dir);
    Ok(inputs)
}

/// Resolve `candidate` and confirm it lies under `root`.
///
/// Both paths are canonicalized, so `..` segments and symlinks cannot escape
/// the root. Relative candidates are taken relative to `root`. Returns `None`
/// when the path does not exist or resolves outside the root.
#[must_use]
pub fn resolve_under(root: &Path, candidate: &Path) -> Option<PathBuf> {
    let root = std::fs::canonicalize(root).ok()?;
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    let resolved = std::fs::canonicalize(joined).ok()?;
    resolved.starts_with(&root).then_some(resolved)
}
