//! Filesystem helpers shared by the report generator and the patch engine

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{IoContext, Result};

/// Suffix inserted between a file name and the backup timestamp
pub const BACKUP_SUFFIX: &str = ".bak.";

/// Places a file referenced from a run result or report may live, in order:
/// relative to the project root, under the tests directory, verbatim.
pub fn candidate_paths(root: &Path, tests_dir: &Path, file: &str) -> Vec<PathBuf> {
    let file = file.trim();
    if file.is_empty() {
        return Vec::new();
    }
    vec![
        root.join(file),
        root.join(tests_dir).join(file),
        PathBuf::from(file),
    ]
}

/// First candidate that exists as a regular file.
pub fn resolve_existing(root: &Path, tests_dir: &Path, file: &str) -> Option<PathBuf> {
    candidate_paths(root, tests_dir, file)
        .into_iter()
        .find(|p| p.is_file())
}

/// Epoch milliseconds used to name reports and backups.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Pick `make(stamp)` for the current instant, bumping the stamp until the
/// path is unused. Keeps names unique and increasing inside one millisecond.
pub fn unique_stamped_path(make: impl Fn(i64) -> PathBuf) -> PathBuf {
    let mut stamp = now_millis();
    loop {
        let path = make(stamp);
        if !path.exists() {
            return path;
        }
        stamp += 1;
    }
}

/// Copy `path` byte-for-byte to `<path>.bak.<millis>` and return the copy.
pub fn backup_file(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let backup = unique_stamped_path(|stamp| {
        path.with_file_name(format!("{}{}{}", file_name, BACKUP_SUFFIX, stamp))
    });
    std::fs::copy(path, &backup).at(path)?;
    debug!("Backed up {} to {}", path.display(), backup.display());
    Ok(backup)
}

/// Read `path`, apply `rewrite`, and persist the result behind a backup.
///
/// Returns `None` when the rewrite leaves the text unchanged; nothing is
/// copied or written in that case.
pub fn rewrite_with_backup(
    path: &Path,
    rewrite: impl FnOnce(&str) -> String,
) -> Result<Option<PathBuf>> {
    let original = std::fs::read_to_string(path).at(path)?;
    let updated = rewrite(&original);
    if updated == original {
        return Ok(None);
    }
    let backup = backup_file(path)?;
    std::fs::write(path, updated).at(path)?;
    Ok(Some(backup))
}
