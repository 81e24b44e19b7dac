use log::{info, warn};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use zip::ZipArchive;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to open archive {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("invalid archive {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error(
        "archive entry '{entry}' uses path syntax from another platform; \
         copy the files to this machine first"
    )]
    ForeignPathSyntax { entry: String },

    #[error("archive entry '{entry}' is encrypted")]
    Encrypted { entry: String },

    #[error("failed to extract '{entry}': {source}")]
    Write { entry: String, source: io::Error },
}

/// What [`extract`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// The archive was extracted; `files` entries were written.
    Extracted { files: usize },
    /// No archive at the given path; nothing to do.
    NoArchive,
}

// Entries written with backslash separators or a drive-letter prefix come
// from a different platform's path rules and cannot be mapped onto this
// filesystem faithfully.
fn uses_foreign_path_syntax(name: &str) -> bool {
    if name.contains('\\') {
        return true;
    }
    let mut chars = name.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(first), Some(':')) if first.is_ascii_alphabetic()
    )
}

// Keeps only the normal components of an entry path, dropping parent
// references, current-dir references and absolute prefixes. Returns None if
// nothing is left.
fn sanitize_entry_path(name: &str) -> Option<PathBuf> {
    let mut sanitized = PathBuf::new();
    for component in Path::new(name).components() {
        if let Component::Normal(part) = component {
            sanitized.push(part);
        }
    }
    if sanitized.as_os_str().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Extracts a ZIP archive into `dest`, preserving the entries' relative
/// directory structure.
///
/// An absent archive is an idempotent no-op ([`ExtractOutcome::NoArchive`]),
/// so callers can run the extraction step unconditionally. Entry names are
/// sanitized before use; entries that sanitize to nothing are skipped with a
/// warning, while names written with another platform's path syntax fail the
/// extraction distinctly with [`ExtractError::ForeignPathSyntax`].
pub fn extract(archive_path: &Path, dest: &Path) -> Result<ExtractOutcome, ExtractError> {
    if !archive_path.exists() {
        return Ok(ExtractOutcome::NoArchive);
    }

    let file = File::open(archive_path).map_err(|source| ExtractError::Open {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let mut archive = ZipArchive::new(reader).map_err(|source| ExtractError::Archive {
        path: archive_path.to_path_buf(),
        source,
    })?;

    let mut files = 0;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|source| ExtractError::Archive {
                path: archive_path.to_path_buf(),
                source,
            })?;

        let raw_name = entry.name().to_string();

        if uses_foreign_path_syntax(&raw_name) {
            return Err(ExtractError::ForeignPathSyntax { entry: raw_name });
        }
        if entry.encrypted() {
            return Err(ExtractError::Encrypted { entry: raw_name });
        }

        let Some(relative) = sanitize_entry_path(&raw_name) else {
            warn!("skipping archive entry with unusable path: '{raw_name}'");
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|source| ExtractError::Write {
                entry: raw_name,
                source,
            })?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| ExtractError::Write {
                entry: raw_name.clone(),
                source,
            })?;
        }

        let mut out = File::create(&target).map_err(|source| ExtractError::Write {
            entry: raw_name.clone(),
            source,
        })?;
        io::copy(&mut entry, &mut out).map_err(|source| ExtractError::Write {
            entry: raw_name,
            source,
        })?;
        files += 1;
    }

    info!(
        "extracted {files} file(s) from {} into {}",
        archive_path.display(),
        dest.display()
    );

    Ok(ExtractOutcome::Extracted { files })
}
