use log::debug;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("failed to walk {}: {source}", .root.display())]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },
}

/// Recursively collects the record files under `root`, in a deterministic
/// traversal order (entries sorted by file name at every level).
///
/// Determinism here is what makes manifest tie-breaking reproducible: two
/// records with the same series time keep the order this function returned
/// them in. Files without the expected extension are skipped with a log line.
pub fn discover_records(root: &Path, extension: &str) -> Result<Vec<PathBuf>, DiscoverError> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| DiscoverError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        match path.extension().and_then(OsStr::to_str) {
            Some(ext) if ext.eq_ignore_ascii_case(extension) => paths.push(path),
            _ => debug!("not a record file, leaving it out: {}", path.display()),
        }
    }

    Ok(paths)
}
