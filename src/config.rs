use crate::fields::Field;
use garde::Validate;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

static FILE_EXTENSION_REGEX: OnceLock<Regex> = OnceLock::new();

const FILE_EXTENSION_DEFAULT: &str = "dcm";
const SEQUENCE_MIN_WIDTH: usize = 3;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{0} is not a valid file extension")]
pub struct FileExtensionError(String);

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ConfigError {
    #[error("invalid file extension: {0}")]
    InvalidFileExtension(String),

    #[error("invalid suffix rule: {0}")]
    InvalidSuffixRule(String),
}

impl From<FileExtensionError> for ConfigError {
    fn from(err: FileExtensionError) -> Self {
        ConfigError::InvalidFileExtension(err.0)
    }
}

/// The file extension shared by the record files this crate discovers and the
/// renamed files it produces, without the leading dot.
///
/// # Example
///
/// ```
/// use dicom_batch_curate::config::FileExtension;
///
/// let ext = "dcm".parse::<FileExtension>().unwrap();
/// assert_eq!(ext.as_ref(), "dcm");
///
/// // A dot or path separator is rejected
/// assert!(".dcm".parse::<FileExtension>().is_err());
/// ```
#[derive(Serialize, Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct FileExtension(String);

impl FileExtension {
    pub fn new(extension: &str) -> Result<Self, FileExtensionError> {
        let regex =
            FILE_EXTENSION_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9]{1,16}$").unwrap());

        if !regex.is_match(extension) {
            return Err(FileExtensionError(format!(
                "file extension must be 1-16 alphanumeric characters without a leading dot, got {extension:?}"
            )));
        }

        Ok(Self(extension.into()))
    }
}

impl Default for FileExtension {
    fn default() -> Self {
        Self(FILE_EXTENSION_DEFAULT.into())
    }
}

impl FromStr for FileExtension {
    type Err = FileExtensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileExtension::new(s)
    }
}

impl AsRef<str> for FileExtension {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for FileExtension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        FileExtension::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// A naming rule applied by the sequencer: a path that contains `token`
/// receives `suffix` between its sequence tag and the file extension.
///
/// Rules are matched in configuration order and the first match wins.
#[derive(Serialize, Validate, Debug, Clone, Eq, PartialEq)]
pub struct SuffixRule {
    #[garde(length(min = 1))]
    token: String,

    #[garde(pattern(r"^[A-Za-z0-9_.-]+$"))]
    suffix: String,
}

impl SuffixRule {
    pub fn new(token: &str, suffix: &str) -> Result<Self, ConfigError> {
        let rule = Self {
            token: token.into(),
            suffix: suffix.into(),
        };
        rule.validate()
            .map_err(|err| ConfigError::InvalidSuffixRule(format!("{err}")))?;
        Ok(rule)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

impl<'de> Deserialize<'de> for SuffixRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawSuffixRule {
            token: String,
            suffix: String,
        }

        let raw = RawSuffixRule::deserialize(deserializer)?;
        SuffixRule::new(&raw.token, &raw.suffix).map_err(serde::de::Error::custom)
    }
}

fn default_replacements() -> BTreeMap<Field, String> {
    let mut replacements = BTreeMap::new();
    replacements.insert(Field::PerformingPhysicianName, "Doctor".into());
    replacements.insert(Field::ScheduledPerformingPhysicianName, "Doctor2".into());
    replacements.insert(Field::InstitutionName, "Hospital".into());
    replacements.insert(Field::InstitutionalDepartmentName, "Department".into());
    replacements.insert(Field::PatientName, "Patient".into());
    replacements.insert(Field::PatientId, "000000000000".into());
    replacements.insert(Field::PatientBirthDate, "00000000".into());
    replacements.insert(Field::PatientSex, "X".into());
    replacements
}

fn default_suffix_rules() -> Vec<SuffixRule> {
    vec![
        SuffixRule {
            token: "TEST1".into(),
            suffix: "_t1".into(),
        },
        SuffixRule {
            token: "TEST2".into(),
            suffix: "_t2".into(),
        },
    ]
}

fn default_sequence_min_width() -> usize {
    SEQUENCE_MIN_WIDTH
}

/// Configuration for redacting and sequencing patient directories.
///
/// This struct contains all the settings that control how record files will
/// be processed:
///
/// * `replacements` - the field replacement table applied by the
///   [`Redactor`](crate::redactor::Redactor)
/// * `patient_name_override` - an optional anonymization tag replacing the
///   patient name; when unset, the driver derives the tag from the patient
///   directory name
/// * `suffix_rules` - ordered [`SuffixRule`]s consulted when naming renamed
///   files
/// * `file_extension` - the extension identifying record files on disk
/// * `sequence_min_width` - the minimum zero-padding width of sequence tags;
///   the effective width grows with the record count so that names always
///   sort lexicographically
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_replacements")]
    replacements: BTreeMap<Field, String>,

    #[serde(default)]
    patient_name_override: Option<String>,

    #[serde(default = "default_suffix_rules")]
    suffix_rules: Vec<SuffixRule>,

    #[serde(default)]
    file_extension: FileExtension,

    #[serde(default = "default_sequence_min_width")]
    sequence_min_width: usize,
}

impl Config {
    /// The redaction fields and their replacement values, in report order.
    pub fn replacements(&self) -> impl Iterator<Item = (Field, &str)> {
        self.replacements
            .iter()
            .map(|(field, value)| (*field, value.as_str()))
    }

    pub fn replacement(&self, field: Field) -> Option<&str> {
        self.replacements.get(&field).map(String::as_str)
    }

    pub fn patient_name_override(&self) -> Option<&str> {
        self.patient_name_override.as_deref()
    }

    pub fn suffix_rules(&self) -> &[SuffixRule] {
        &self.suffix_rules
    }

    pub fn file_extension(&self) -> &str {
        self.file_extension.as_ref()
    }

    pub fn sequence_min_width(&self) -> usize {
        self.sequence_min_width
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            replacements: BTreeMap::new(),
            patient_name_override: None,
            suffix_rules: Vec::new(),
            file_extension: FileExtension::default(),
            sequence_min_width: SEQUENCE_MIN_WIDTH,
        }
    }
}

/// A builder for [`Config`].
///
/// [`ConfigBuilder::new`] starts from an empty replacement table and no
/// suffix rules; [`ConfigBuilder::default`] starts from the standard table
/// used by the command line tool.
///
/// # Example
///
/// ```
/// use dicom_batch_curate::config::{ConfigBuilder, SuffixRule};
/// use dicom_batch_curate::fields::Field;
///
/// let config = ConfigBuilder::new()
///     .replacement(Field::PatientName, "Patient")
///     .replacement(Field::PatientId, "000000000000")
///     .suffix_rule(SuffixRule::new("TEST1", "_t1").unwrap())
///     .build();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigBuilder(Config);

impl ConfigBuilder {
    pub fn new() -> Self {
        ConfigBuilder(Config::default())
    }

    /// Sets the replacement value written into `field` during redaction.
    ///
    /// Setting a field that is already present overwrites its replacement.
    pub fn replacement(mut self, field: Field, value: impl Into<String>) -> Self {
        self.0.replacements.insert(field, value.into());
        self
    }

    /// Sets the anonymization tag that replaces the patient name, taking
    /// precedence over the tag derived from the patient directory name.
    pub fn patient_name_override(mut self, tag: impl Into<String>) -> Self {
        self.0.patient_name_override = Some(tag.into());
        self
    }

    /// Appends a [`SuffixRule`]; rules are consulted in insertion order.
    pub fn suffix_rule(mut self, rule: SuffixRule) -> Self {
        self.0.suffix_rules.push(rule);
        self
    }

    pub fn file_extension(mut self, extension: FileExtension) -> Self {
        self.0.file_extension = extension;
        self
    }

    pub fn sequence_min_width(mut self, width: usize) -> Self {
        self.0.sequence_min_width = width;
        self
    }

    pub fn build(self) -> Config {
        self.0
    }
}

impl Default for ConfigBuilder {
    /// Creates a `ConfigBuilder` seeded with the standard replacement table
    /// and suffix rules.
    fn default() -> Self {
        let mut builder = Self::new();
        builder.0.replacements = default_replacements();
        builder.0.suffix_rules = default_suffix_rules();
        builder
    }
}

impl From<Config> for ConfigBuilder {
    fn from(config: Config) -> Self {
        ConfigBuilder(config)
    }
}
