use crate::config::{Config, SuffixRule};
use crate::fields::Field;
use crate::record::RecordFields;
use log::debug;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("no series time in {}", .path.display())]
    MissingSortKey { path: PathBuf },

    #[error("conflicting rename target {}", .target.display())]
    RenameCollision { target: PathBuf },

    #[error("failed to create directory {}: {source}", .path.display())]
    DirectoryCreate { path: PathBuf, source: io::Error },
}

/// A rename batch that failed partway through.
///
/// Already-moved files stay moved; the caller can resume from `pending`
/// instead of re-deriving state from a half-renamed directory.
#[derive(Error, Debug)]
#[error(
    "failed to move {} to {}: {source} ({} moved, {} pending)",
    .failed.from.display(),
    .failed.to.display(),
    .completed.len(),
    .pending.len()
)]
pub struct RenameBatchError {
    pub completed: Vec<PlannedMove>,
    pub failed: PlannedMove,
    pub pending: Vec<PlannedMove>,
    pub source: io::Error,
}

/// One record's place in the chronological order: its series-time key and the
/// path it was discovered at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub time_key: String,
    pub path: PathBuf,
}

/// All discovered records sorted ascending by series time, ties preserving
/// the deterministic traversal order.
///
/// Built once per invocation and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedManifest {
    entries: Vec<ManifestEntry>,
}

impl OrderedManifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }
}

/// A single planned file move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// The complete old-path to new-path mapping for one manifest, validated for
/// collisions before any file is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    moves: Vec<PlannedMove>,
}

impl RenamePlan {
    pub fn moves(&self) -> &[PlannedMove] {
        &self.moves
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Performs the moves in rank order.
    ///
    /// A move whose source equals its target is skipped, so re-running a plan
    /// over an already-renamed directory is a no-op. On the first failure the
    /// error reports completed, failed and pending entries; nothing is rolled
    /// back.
    pub fn execute(self) -> Result<Vec<PlannedMove>, RenameBatchError> {
        let mut completed = Vec::with_capacity(self.moves.len());
        let mut moves = self.moves.into_iter();

        while let Some(planned) = moves.next() {
            if planned.from == planned.to {
                debug!("{} already has its target name", planned.from.display());
                completed.push(planned);
                continue;
            }
            match fs::rename(&planned.from, &planned.to) {
                Ok(()) => completed.push(planned),
                Err(source) => {
                    return Err(RenameBatchError {
                        completed,
                        failed: planned,
                        pending: moves.collect(),
                        source,
                    });
                }
            }
        }

        Ok(completed)
    }
}

/// Idempotent directory creation: succeeds silently when the directory is
/// already there, fails for any other OS-level reason.
pub fn ensure_output_directory(path: &Path) -> Result<(), SequenceError> {
    fs::create_dir_all(path).map_err(|source| SequenceError::DirectoryCreate {
        path: path.to_path_buf(),
        source,
    })
}

fn decimal_digits(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Orders records chronologically and assigns them deterministic sequential
/// names in a flat output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequencer {
    suffix_rules: Vec<SuffixRule>,
    file_extension: String,
    min_width: usize,
}

impl Sequencer {
    pub fn new(config: &Config) -> Self {
        Self {
            suffix_rules: config.suffix_rules().to_vec(),
            file_extension: config.file_extension().to_string(),
            min_width: config.sequence_min_width(),
        }
    }

    /// Builds the chronological manifest from records in their deterministic
    /// traversal order.
    ///
    /// Every record must carry a series time; a record without one fails the
    /// whole build rather than being silently dropped, since omission would
    /// corrupt the ranks of everything after it.
    pub fn build_manifest<R: RecordFields>(
        &self,
        records: &[(PathBuf, R)],
    ) -> Result<OrderedManifest, SequenceError> {
        let mut entries = Vec::with_capacity(records.len());
        for (path, record) in records {
            let time_key =
                record
                    .get(Field::SeriesTime)
                    .ok_or_else(|| SequenceError::MissingSortKey {
                        path: path.clone(),
                    })?;
            entries.push(ManifestEntry {
                time_key,
                path: path.clone(),
            });
        }

        // stable: equal keys keep their traversal order
        entries.sort_by(|a, b| a.time_key.cmp(&b.time_key));

        Ok(OrderedManifest { entries })
    }

    // Pad width grows with the record count so that names keep sorting
    // lexicographically past 999 records; 3 is the historical floor.
    fn width_for(&self, count: usize) -> usize {
        self.min_width
            .max(decimal_digits(count.saturating_sub(1)))
    }

    fn suffix_for(&self, path: &Path) -> &str {
        let path_str = path.to_string_lossy();
        self.suffix_rules
            .iter()
            .find(|rule| path_str.contains(rule.token()))
            .map(|rule| rule.suffix())
            .unwrap_or("")
    }

    /// Computes the full old-path to new-path mapping for `manifest`.
    ///
    /// Pure: no file is touched. The entry at rank `i` becomes
    /// `output_dir/{zero-padded i}{suffix}.{extension}`, with the suffix
    /// taken from the first configured rule whose token occurs in the
    /// original path. The whole set is checked for pairwise-distinct targets,
    /// and for targets that already exist on disk without being part of the
    /// plan, before anything is moved.
    pub fn plan_renames(
        &self,
        manifest: &OrderedManifest,
        output_dir: &Path,
    ) -> Result<RenamePlan, SequenceError> {
        let width = self.width_for(manifest.len());
        let mut moves = Vec::with_capacity(manifest.len());
        let mut targets: HashSet<PathBuf> = HashSet::with_capacity(manifest.len());

        for (rank, entry) in manifest.entries().iter().enumerate() {
            let suffix = self.suffix_for(&entry.path);
            let file_name = format!("{rank:0width$}{suffix}.{}", self.file_extension);
            let target = output_dir.join(file_name);

            if !targets.insert(target.clone()) {
                return Err(SequenceError::RenameCollision { target });
            }

            moves.push(PlannedMove {
                from: entry.path.clone(),
                to: target,
            });
        }

        // a file already sitting at a target would be overwritten by the
        // move; only a self-rename is acceptable
        for planned in &moves {
            if planned.from != planned.to && planned.to.exists() {
                return Err(SequenceError::RenameCollision {
                    target: planned.to.clone(),
                });
            }
        }

        Ok(RenamePlan { moves })
    }
}
