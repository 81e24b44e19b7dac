use crate::config::Config;
use crate::fields::Field;
use crate::record::{FieldWriteError, RecordFields};
use log::{info, warn};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RedactError {
    #[error("failed to redact {field}: {source}")]
    FieldWrite {
        field: Field,
        source: FieldWriteError,
    },
}

/// The partition of the configured redaction fields into those populated in a
/// record and those absent from it.
///
/// Computed fresh per record; `present` and `missing` together always cover
/// the full replacement table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceReport {
    pub present: Vec<Field>,
    pub missing: Vec<Field>,
}

/// One field's value before and after redaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: Field,
    pub before: String,
    pub after: String,
}

/// The changes a redaction pass would make to a record, without applying them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RedactionPreview {
    pub changes: Vec<FieldChange>,
}

/// Overwrites identifying fields of decoded records with replacement values.
///
/// The replacement table comes from the [`Config`]; the patient name
/// replacement is the anonymization tag supplied at construction rather than
/// the table's static default.
#[derive(Debug, Clone, PartialEq)]
pub struct Redactor {
    rules: Vec<(Field, String)>,
}

impl Redactor {
    pub fn new(config: &Config, anonymization_tag: &str) -> Self {
        let rules = config
            .replacements()
            .map(|(field, value)| {
                let replacement = if field == Field::PatientName {
                    anonymization_tag.to_string()
                } else {
                    value.to_string()
                };
                (field, replacement)
            })
            .collect();
        Self { rules }
    }

    fn replacement_for(&self, field: Field) -> Option<&str> {
        self.rules
            .iter()
            .find(|(rule_field, _)| *rule_field == field)
            .map(|(_, value)| value.as_str())
    }

    /// Tests each configured field for presence in `record`.
    ///
    /// Missing fields are logged and excluded from redaction; they never fail
    /// the record.
    pub fn detect_presence(&self, record: &impl RecordFields) -> PresenceReport {
        let mut present = Vec::new();
        let mut missing = Vec::new();

        for (field, _) in &self.rules {
            if record.get(*field).is_some() {
                present.push(*field);
            } else {
                info!("missing '{field}' tag, it will be left out of redaction");
                missing.push(*field);
            }
        }

        PresenceReport { present, missing }
    }

    /// Overwrites every field in `present` with its replacement value, in
    /// place.
    ///
    /// Fields absent from the record are left untouched, and no field outside
    /// the replacement table is ever modified. A value rejected by the
    /// underlying format fails with the offending field; the caller decides
    /// whether to skip the record or abort.
    pub fn redact(
        &self,
        record: &mut impl RecordFields,
        present: &[Field],
    ) -> Result<(), RedactError> {
        for field in present {
            let Some(replacement) = self.replacement_for(*field) else {
                warn!("'{field}' is not in the replacement table, skipping it");
                continue;
            };
            record
                .set(*field, replacement)
                .map_err(|source| RedactError::FieldWrite {
                    field: *field,
                    source,
                })?;
        }
        Ok(())
    }

    /// Returns the present fields' current values and the values they would
    /// take after redaction, without mutating the record.
    pub fn preview(&self, record: &impl RecordFields) -> RedactionPreview {
        let changes = self
            .rules
            .iter()
            .filter_map(|(field, replacement)| {
                record.get(*field).map(|before| FieldChange {
                    field: *field,
                    before,
                    after: replacement.clone(),
                })
            })
            .collect();
        RedactionPreview { changes }
    }
}
