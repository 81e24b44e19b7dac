use crate::fields::Field;
use dicom_core::header::Header;
use dicom_core::value::Value;
use dicom_core::VR;
use dicom_object::mem::InMemElement;
use dicom_object::{open_file, DefaultDicomObject};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: dicom_object::ReadError,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: dicom_object::WriteError,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldWriteError {
    #[error("field {field} is not present in the record")]
    NotPresent { field: Field },

    #[error("value for {field} exceeds the maximum length of {max} characters")]
    TooLong { field: Field, max: usize },
}

/// Narrow field access to a decoded record.
///
/// The redactor and sequencer only ever see this interface; the actual
/// decoder stays behind the [`DicomRecord`] adapter.
pub trait RecordFields {
    /// Returns the populated value of `field`, or `None` when the tag is
    /// absent or present with empty content.
    fn get(&self, field: Field) -> Option<String>;

    /// Overwrites the value of an already-present `field`.
    ///
    /// Fields that are not present are never fabricated; attempting to write
    /// one fails with [`FieldWriteError::NotPresent`].
    fn set(&mut self, field: Field, value: &str) -> Result<(), FieldWriteError>;
}

// Maximum value lengths (in characters) from PS3.5 for the string VRs this
// crate writes through. VRs without a defined limit yield None.
fn vr_max_length(vr: VR) -> Option<usize> {
    match vr {
        VR::AE => Some(16),
        VR::AS => Some(4),
        VR::CS => Some(16),
        VR::DA => Some(8),
        VR::DS => Some(16),
        VR::DT => Some(26),
        VR::IS => Some(12),
        VR::LO => Some(64),
        VR::LT => Some(10240),
        VR::PN => Some(64),
        VR::SH => Some(16),
        VR::ST => Some(1024),
        VR::TM => Some(14),
        VR::UI => Some(64),
        _ => None,
    }
}

/// A decoded DICOM file together with its originating path.
///
/// The path is the record's identity until the sequencer renames it.
#[derive(Debug, Clone)]
pub struct DicomRecord {
    path: PathBuf,
    obj: DefaultDicomObject,
}

impl DicomRecord {
    /// Wraps an already-decoded object.
    pub fn new(path: impl Into<PathBuf>, obj: DefaultDicomObject) -> Self {
        Self {
            path: path.into(),
            obj,
        }
    }

    /// Decodes the file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RecordError> {
        let path = path.into();
        let obj = open_file(&path).map_err(|source| RecordError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, obj })
    }

    /// Encodes the record back to its originating path.
    pub fn save(&self) -> Result<(), RecordError> {
        self.obj
            .write_to_file(&self.path)
            .map_err(|source| RecordError::Write {
                path: self.path.clone(),
                source,
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn object(&self) -> &DefaultDicomObject {
        &self.obj
    }
}

impl RecordFields for DicomRecord {
    fn get(&self, field: Field) -> Option<String> {
        let elem = self.obj.element(field.tag()).ok()?;
        let value = elem.to_str().ok()?;
        let trimmed = value.trim_matches([' ', '\0']);
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.to_string())
    }

    fn set(&mut self, field: Field, value: &str) -> Result<(), FieldWriteError> {
        let vr = match self.obj.element(field.tag()) {
            Ok(elem) => elem.vr(),
            Err(_) => return Err(FieldWriteError::NotPresent { field }),
        };

        if let Some(max) = vr_max_length(vr) {
            if value.chars().count() > max {
                return Err(FieldWriteError::TooLong { field, max });
            }
        }

        let new_elem = InMemElement::new(field.tag(), vr, Value::from(value));
        self.obj.put(new_elem);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_file_meta;
    use dicom_core::PrimitiveValue;
    use dicom_object::{FileDicomObject, InMemDicomObject};

    fn make_record() -> DicomRecord {
        let mut obj: FileDicomObject<InMemDicomObject> =
            FileDicomObject::new_empty_with_meta(make_file_meta());
        obj.put(InMemElement::new(
            Field::PatientName.tag(),
            VR::PN,
            Value::from("Doe^John"),
        ));
        obj.put(InMemElement::new(
            Field::PatientSex.tag(),
            VR::CS,
            Value::Primitive(PrimitiveValue::Empty),
        ));
        obj.put(InMemElement::new(
            Field::SeriesTime.tag(),
            VR::TM,
            Value::from("093000"),
        ));
        DicomRecord::new("in-memory.dcm", obj)
    }

    #[test]
    fn test_get_present_field() {
        let record = make_record();
        assert_eq!(record.get(Field::PatientName), Some("Doe^John".into()));
        assert_eq!(record.get(Field::SeriesTime), Some("093000".into()));
    }

    #[test]
    fn test_get_absent_tag_is_none() {
        let record = make_record();
        assert_eq!(record.get(Field::PatientId), None);
    }

    #[test]
    fn test_get_empty_tag_is_none() {
        let record = make_record();
        assert_eq!(record.get(Field::PatientSex), None);
    }

    #[test]
    fn test_get_trims_padding() {
        let mut obj: FileDicomObject<InMemDicomObject> =
            FileDicomObject::new_empty_with_meta(make_file_meta());
        obj.put(InMemElement::new(
            Field::InstitutionName.tag(),
            VR::LO,
            Value::from("Hospital "),
        ));
        let record = DicomRecord::new("padded.dcm", obj);
        assert_eq!(record.get(Field::InstitutionName), Some("Hospital".into()));
    }

    #[test]
    fn test_set_overwrites_and_keeps_vr() {
        let mut record = make_record();
        record.set(Field::PatientName, "Patient").unwrap();
        let elem = record.object().element(Field::PatientName.tag()).unwrap();
        assert_eq!(elem.vr(), VR::PN);
        assert_eq!(record.get(Field::PatientName), Some("Patient".into()));
    }

    #[test]
    fn test_set_absent_field_fails() {
        let mut record = make_record();
        let err = record.set(Field::PatientId, "000000000000").unwrap_err();
        assert_eq!(
            err,
            FieldWriteError::NotPresent {
                field: Field::PatientId
            }
        );
    }

    #[test]
    fn test_set_rejects_too_long_value() {
        let mut record = make_record();
        let too_long = "X".repeat(65);
        let err = record.set(Field::PatientName, &too_long).unwrap_err();
        assert_eq!(
            err,
            FieldWriteError::TooLong {
                field: Field::PatientName,
                max: 64
            }
        );
    }

    #[test]
    fn test_set_empty_tag_is_allowed() {
        // present-but-empty still counts as present for writing
        let mut record = make_record();
        record.set(Field::PatientSex, "X").unwrap();
        assert_eq!(record.get(Field::PatientSex), Some("X".into()));
    }
}
