use dicom_core::Tag;
use dicom_dictionary_std::tags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The metadata fields this crate knows how to read and write through the
/// narrow [`RecordFields`](crate::record::RecordFields) interface.
///
/// The first eight variants are the identifying fields subject to redaction;
/// [`Field::SeriesTime`] is the chronological sort key used by the
/// [`Sequencer`](crate::sequencer::Sequencer) and is never redacted by the
/// default configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    PerformingPhysicianName,
    ScheduledPerformingPhysicianName,
    InstitutionName,
    InstitutionalDepartmentName,
    PatientName,
    #[serde(rename = "PatientID")]
    PatientId,
    PatientBirthDate,
    PatientSex,
    SeriesTime,
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{0} is not a known field name")]
pub struct UnknownFieldError(String);

impl Field {
    /// The identifying fields, in the order they are reported and redacted.
    pub const IDENTIFYING: [Field; 8] = [
        Field::PerformingPhysicianName,
        Field::ScheduledPerformingPhysicianName,
        Field::InstitutionName,
        Field::InstitutionalDepartmentName,
        Field::PatientName,
        Field::PatientId,
        Field::PatientBirthDate,
        Field::PatientSex,
    ];

    /// The DICOM tag this field maps to.
    pub fn tag(self) -> Tag {
        match self {
            Field::PerformingPhysicianName => tags::PERFORMING_PHYSICIAN_NAME,
            Field::ScheduledPerformingPhysicianName => tags::SCHEDULED_PERFORMING_PHYSICIAN_NAME,
            Field::InstitutionName => tags::INSTITUTION_NAME,
            Field::InstitutionalDepartmentName => tags::INSTITUTIONAL_DEPARTMENT_NAME,
            Field::PatientName => tags::PATIENT_NAME,
            Field::PatientId => tags::PATIENT_ID,
            Field::PatientBirthDate => tags::PATIENT_BIRTH_DATE,
            Field::PatientSex => tags::PATIENT_SEX,
            Field::SeriesTime => tags::SERIES_TIME,
        }
    }

    /// The canonical DICOM keyword for this field.
    pub fn keyword(self) -> &'static str {
        match self {
            Field::PerformingPhysicianName => "PerformingPhysicianName",
            Field::ScheduledPerformingPhysicianName => "ScheduledPerformingPhysicianName",
            Field::InstitutionName => "InstitutionName",
            Field::InstitutionalDepartmentName => "InstitutionalDepartmentName",
            Field::PatientName => "PatientName",
            Field::PatientId => "PatientID",
            Field::PatientBirthDate => "PatientBirthDate",
            Field::PatientSex => "PatientSex",
            Field::SeriesTime => "SeriesTime",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for Field {
    type Err = UnknownFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let all = [
            Field::PerformingPhysicianName,
            Field::ScheduledPerformingPhysicianName,
            Field::InstitutionName,
            Field::InstitutionalDepartmentName,
            Field::PatientName,
            Field::PatientId,
            Field::PatientBirthDate,
            Field::PatientSex,
            Field::SeriesTime,
        ];
        all.into_iter()
            .find(|field| field.keyword() == s)
            .ok_or_else(|| UnknownFieldError(s.into()))
    }
}
