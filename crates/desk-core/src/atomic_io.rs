//! Crash-safe file writes for uploaded content.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context, Result};

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stages `content` next to `path`, syncs it, then renames it into place.
/// Concurrent writers in one process never share a staging file.
pub fn write_bytes_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
        bail!("destination '{}' has no file name", path.display());
    };
    if path.is_dir() {
        bail!("destination '{}' is a directory", path.display());
    }

    let parent_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("failed to create {}", parent_dir.display()))?;

    let staging_path = parent_dir.join(format!(
        ".{file_name}.partial-{}-{}",
        std::process::id(),
        STAGING_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let staged = File::create(&staging_path)
        .and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        })
        .and_then(|()| std::fs::rename(&staging_path, path));
    if let Err(error) = staged {
        let _ = std::fs::remove_file(&staging_path);
        return Err(error).with_context(|| format!("failed to store {}", path.display()));
    }
    Ok(())
}
