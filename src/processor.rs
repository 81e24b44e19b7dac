use crate::archive::{extract, ExtractError, ExtractOutcome};
use crate::config::Config;
use crate::discover::{discover_records, DiscoverError};
use crate::record::{DicomRecord, RecordError};
use crate::redactor::{RedactError, RedactionPreview, Redactor};
use crate::sequencer::{
    ensure_output_directory, PlannedMove, RenameBatchError, SequenceError, Sequencer,
};
use log::{info, warn};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const ARCHIVE_EXTENSION: &str = "zip";

#[derive(Error, Debug)]
pub enum PatientError {
    #[error("{}: failed to list directory: {source}", .patient.display())]
    List { patient: PathBuf, source: io::Error },

    #[error("{}: no archive or record directory found", .patient.display())]
    NoInput { patient: PathBuf },

    #[error(
        "{}: the input is still an archive; previewing needs an expanded directory",
        .patient.display()
    )]
    ArchivedInput { patient: PathBuf },

    #[error("{}: {source}", .patient.display())]
    Extract {
        patient: PathBuf,
        source: ExtractError,
    },

    #[error("{}: {source}", .patient.display())]
    Discover {
        patient: PathBuf,
        source: DiscoverError,
    },

    #[error("{}: {source}", .patient.display())]
    Record {
        patient: PathBuf,
        source: RecordError,
    },

    #[error("{}: failed to redact {}: {source}", .patient.display(), .path.display())]
    Redact {
        patient: PathBuf,
        path: PathBuf,
        source: RedactError,
    },

    #[error("{}: {source}", .patient.display())]
    Sequence {
        patient: PathBuf,
        source: SequenceError,
    },

    #[error("{}: {source}", .patient.display())]
    Rename {
        patient: PathBuf,
        source: RenameBatchError,
    },

    #[error("{}: failed to remove {}: {source}", .patient.display(), .path.display())]
    Cleanup {
        patient: PathBuf,
        path: PathBuf,
        source: io::Error,
    },
}

/// Where a patient directory's records come from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SeriesSource {
    /// An already-expanded directory of record files.
    Directory(PathBuf),
    /// An archive to be extracted into a sibling directory named after its
    /// stem.
    Archive { archive: PathBuf, dest: PathBuf },
}

/// The result of processing one patient directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientSummary {
    pub patient: PathBuf,
    pub anonymization_tag: String,
    pub records: usize,
    pub output_dir: PathBuf,
}

/// What processing one patient directory would do, without doing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientPreview {
    pub patient: PathBuf,
    pub anonymization_tag: String,
    pub redactions: Vec<(PathBuf, RedactionPreview)>,
    pub planned: Vec<PlannedMove>,
}

/// Runs the full pipeline over one patient directory: locate the input,
/// extract an archive if there is one, redact every record in place, build
/// the chronological manifest, move the records into the flat output
/// directory under their sequential names, and clean up the emptied sources.
///
/// Each invocation owns its patient subtree exclusively for the duration of
/// the run; different patient directories are independent.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientProcessor {
    config: Config,
}

impl PatientProcessor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn anonymization_tag(&self, patient_dir: &Path) -> String {
        if let Some(tag) = self.config.patient_name_override() {
            return tag.to_string();
        }
        patient_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ANONYMOUS".to_string())
    }

    // The patient directory holds either an archive or an already-expanded
    // directory. An archive wins when both are present, matching its stem.
    fn locate_input(
        &self,
        patient_dir: &Path,
        output_name: &str,
    ) -> Result<SeriesSource, PatientError> {
        let list_err = |source| PatientError::List {
            patient: patient_dir.to_path_buf(),
            source,
        };

        let mut entries: Vec<PathBuf> = fs::read_dir(patient_dir)
            .map_err(list_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(list_err)?
            .into_iter()
            .map(|entry| entry.path())
            .collect();
        entries.sort();

        let archive = entries.iter().find(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(OsStr::to_str)
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
        });
        if let Some(archive) = archive {
            let stem = archive
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "records".to_string());
            return Ok(SeriesSource::Archive {
                archive: archive.clone(),
                dest: patient_dir.join(stem),
            });
        }

        let directory = entries.iter().find(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .is_some_and(|name| name != OsStr::new(output_name))
        });
        match directory {
            Some(directory) => Ok(SeriesSource::Directory(directory.clone())),
            None => Err(PatientError::NoInput {
                patient: patient_dir.to_path_buf(),
            }),
        }
    }

    fn load_records(
        &self,
        patient_dir: &Path,
        series_dir: &Path,
    ) -> Result<Vec<(PathBuf, DicomRecord)>, PatientError> {
        let paths = discover_records(series_dir, self.config.file_extension()).map_err(
            |source| PatientError::Discover {
                patient: patient_dir.to_path_buf(),
                source,
            },
        )?;

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let record = DicomRecord::open(&path).map_err(|source| PatientError::Record {
                patient: patient_dir.to_path_buf(),
                source,
            })?;
            records.push((path, record));
        }
        Ok(records)
    }

    /// Processes one patient directory to completion.
    pub fn process(&self, patient_dir: &Path) -> Result<PatientSummary, PatientError> {
        let tag = self.anonymization_tag(patient_dir);
        let source = self.locate_input(patient_dir, &tag)?;

        let series_dir = match &source {
            SeriesSource::Directory(dir) => dir.clone(),
            SeriesSource::Archive { archive, dest } => {
                ensure_output_directory(dest).map_err(|source| PatientError::Sequence {
                    patient: patient_dir.to_path_buf(),
                    source,
                })?;
                match extract(archive, dest).map_err(|source| PatientError::Extract {
                    patient: patient_dir.to_path_buf(),
                    source,
                })? {
                    ExtractOutcome::Extracted { files } => {
                        info!("{}: extracted {files} file(s)", patient_dir.display())
                    }
                    ExtractOutcome::NoArchive => warn!(
                        "{}: archive vanished before extraction",
                        patient_dir.display()
                    ),
                }
                dest.clone()
            }
        };

        let mut records = self.load_records(patient_dir, &series_dir)?;

        let redactor = Redactor::new(&self.config, &tag);
        for (path, record) in records.iter_mut() {
            let report = redactor.detect_presence(record);
            redactor
                .redact(record, &report.present)
                .map_err(|source| PatientError::Redact {
                    patient: patient_dir.to_path_buf(),
                    path: path.clone(),
                    source,
                })?;
            record.save().map_err(|source| PatientError::Record {
                patient: patient_dir.to_path_buf(),
                source,
            })?;
        }

        let sequencer = Sequencer::new(&self.config);
        let manifest =
            sequencer
                .build_manifest(&records)
                .map_err(|source| PatientError::Sequence {
                    patient: patient_dir.to_path_buf(),
                    source,
                })?;

        let output_dir = patient_dir.join(&tag);
        ensure_output_directory(&output_dir).map_err(|source| PatientError::Sequence {
            patient: patient_dir.to_path_buf(),
            source,
        })?;

        let plan = sequencer
            .plan_renames(&manifest, &output_dir)
            .map_err(|source| PatientError::Sequence {
                patient: patient_dir.to_path_buf(),
                source,
            })?;
        let moved = plan.execute().map_err(|source| PatientError::Rename {
            patient: patient_dir.to_path_buf(),
            source,
        })?;

        self.clean_up(patient_dir, &source, &series_dir)?;

        info!(
            "{}: {} record(s) redacted and sequenced into {}",
            patient_dir.display(),
            moved.len(),
            output_dir.display()
        );

        Ok(PatientSummary {
            patient: patient_dir.to_path_buf(),
            anonymization_tag: tag,
            records: moved.len(),
            output_dir,
        })
    }

    /// Reports what [`PatientProcessor::process`] would change, without
    /// touching the filesystem.
    ///
    /// Only expanded directories can be previewed; extracting an archive is
    /// itself a side effect.
    pub fn preview(&self, patient_dir: &Path) -> Result<PatientPreview, PatientError> {
        let tag = self.anonymization_tag(patient_dir);
        let series_dir = match self.locate_input(patient_dir, &tag)? {
            SeriesSource::Directory(dir) => dir,
            SeriesSource::Archive { .. } => {
                return Err(PatientError::ArchivedInput {
                    patient: patient_dir.to_path_buf(),
                });
            }
        };

        let records = self.load_records(patient_dir, &series_dir)?;

        let redactor = Redactor::new(&self.config, &tag);
        let redactions = records
            .iter()
            .map(|(path, record)| (path.clone(), redactor.preview(record)))
            .collect();

        let sequencer = Sequencer::new(&self.config);
        let manifest =
            sequencer
                .build_manifest(&records)
                .map_err(|source| PatientError::Sequence {
                    patient: patient_dir.to_path_buf(),
                    source,
                })?;
        let plan = sequencer
            .plan_renames(&manifest, &patient_dir.join(&tag))
            .map_err(|source| PatientError::Sequence {
                patient: patient_dir.to_path_buf(),
                source,
            })?;

        Ok(PatientPreview {
            patient: patient_dir.to_path_buf(),
            anonymization_tag: tag,
            redactions,
            planned: plan.moves().to_vec(),
        })
    }

    // The renamed files are all that is left worth keeping: drop the emptied
    // source tree and the consumed archive. An already-absent archive is
    // tolerated, mirroring the extraction step.
    fn clean_up(
        &self,
        patient_dir: &Path,
        source: &SeriesSource,
        series_dir: &Path,
    ) -> Result<(), PatientError> {
        fs::remove_dir_all(series_dir).map_err(|source| PatientError::Cleanup {
            patient: patient_dir.to_path_buf(),
            path: series_dir.to_path_buf(),
            source,
        })?;

        if let SeriesSource::Archive { archive, .. } = source {
            match fs::remove_file(archive) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(PatientError::Cleanup {
                        patient: patient_dir.to_path_buf(),
                        path: archive.clone(),
                        source: err,
                    });
                }
            }
        }

        Ok(())
    }
}
