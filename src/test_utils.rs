use crate::fields::Field;
use crate::record::{FieldWriteError, RecordFields};
use dicom_object::meta::FileMetaTableBuilder;
use dicom_object::FileMetaTable;
use std::collections::BTreeMap;

pub(crate) fn make_file_meta() -> FileMetaTable {
    FileMetaTableBuilder::new()
        .media_storage_sop_class_uid("1.2.3")
        .media_storage_sop_instance_uid("2.3.4")
        .transfer_syntax("1.2.840.10008.1.2.1") // Explicit VR Little Endian
        .build()
        .unwrap()
}

/// An in-memory [`RecordFields`] implementation for tests that do not need a
/// real decoder.
///
/// An inserted empty value models a tag that is present but unpopulated, so
/// `get` treats it as missing while `set` accepts it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FakeRecord {
    values: BTreeMap<Field, String>,
    failing: Option<Field>,
}

impl FakeRecord {
    pub(crate) fn insert(&mut self, field: Field, value: &str) {
        self.values.insert(field, value.to_string());
    }

    pub(crate) fn remove(&mut self, field: Field) {
        self.values.remove(&field);
    }

    pub(crate) fn fail_writes_to(&mut self, field: Field) {
        self.failing = Some(field);
    }
}

impl RecordFields for FakeRecord {
    fn get(&self, field: Field) -> Option<String> {
        self.values
            .get(&field)
            .filter(|value| !value.is_empty())
            .cloned()
    }

    fn set(&mut self, field: Field, value: &str) -> Result<(), FieldWriteError> {
        if self.failing == Some(field) {
            return Err(FieldWriteError::TooLong { field, max: 0 });
        }
        if !self.values.contains_key(&field) {
            return Err(FieldWriteError::NotPresent { field });
        }
        self.values.insert(field, value.to_string());
        Ok(())
    }
}
