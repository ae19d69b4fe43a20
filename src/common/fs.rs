use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Create the directory if it doesn’t exist; error if a non-directory exists there.
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Directory an output file will be written into.
fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Check that `path` can be written: create its parent directory and try a temporary file in it.
pub(crate) fn prepare_output_path(path: &Path) -> Result<()> {
    if path.is_dir() {
        anyhow::bail!("Output path is a directory: {}", path.display());
    }
    let dir = parent_dir(path);
    ensure_dir_exists(&dir)?;
    NamedTempFile::new_in(&dir)
        .with_context(|| format!("Output directory is not writable: {}", dir.display()))?;
    Ok(())
}

/// Write `bytes` to a temporary file next to `path`, then rename it into place.
/// An existing file at `path` is untouched until the rename.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = parent_dir(path);
    ensure_dir_exists(&dir)?;

    let mut file = NamedTempFile::new_in(&dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.as_file().sync_all()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    file.persist(path)
        .map_err(|e| anyhow::anyhow!("failed to move output into {}: {}", path.display(), e.error))?;
    Ok(())
}
