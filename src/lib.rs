//! Batch redaction and chronological sequencing of patient DICOM directories.
//!
//! Two independent components are composed by a thin per-patient driver:
//!
//! * the [`Redactor`](redactor::Redactor) detects which identifying metadata
//!   fields are populated in a decoded record and overwrites them with
//!   replacement values, substituting a caller-supplied anonymization tag for
//!   the patient name;
//! * the [`Sequencer`](sequencer::Sequencer) orders a directory subtree of
//!   records by their series time and moves them into a flat output
//!   directory under stable, zero-padded sequential names.
//!
//! The [`PatientProcessor`](processor::PatientProcessor) runs both over one
//! patient directory in strict phase order (discover, redact, build the
//! manifest, rename, clean up), optionally extracting a ZIP archive first.
//! All behaviour is driven by an explicit [`Config`](config::Config); there
//! is no process-wide state.

pub mod archive;
pub mod config;
pub mod discover;
pub mod fields;
pub mod processor;
pub mod record;
pub mod redactor;
pub mod sequencer;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{Config, ConfigBuilder, SuffixRule};
pub use fields::Field;
pub use processor::{PatientError, PatientPreview, PatientProcessor, PatientSummary};
pub use record::{DicomRecord, RecordFields};
pub use redactor::{PresenceReport, Redactor};
pub use sequencer::{OrderedManifest, RenamePlan, Sequencer};
