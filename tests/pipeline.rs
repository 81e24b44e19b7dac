use dicom_batch_curate::config::ConfigBuilder;
use dicom_batch_curate::fields::Field;
use dicom_batch_curate::processor::{PatientError, PatientProcessor};
use dicom_batch_curate::record::{DicomRecord, RecordFields};
use dicom_batch_curate::sequencer::SequenceError;
use dicom_core::value::Value;
use dicom_core::VR;
use dicom_dictionary_std::tags;
use dicom_object::mem::InMemElement;
use dicom_object::meta::FileMetaTableBuilder;
use dicom_object::{FileDicomObject, InMemDicomObject};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

struct RecordSpec<'a> {
    series_time: Option<&'a str>,
    with_birth_date: bool,
    instance: u32,
}

impl Default for RecordSpec<'_> {
    fn default() -> Self {
        Self {
            series_time: Some("090000"),
            with_birth_date: true,
            instance: 1,
        }
    }
}

fn write_record(path: &Path, spec: &RecordSpec) {
    let meta = FileMetaTableBuilder::new()
        .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
        .media_storage_sop_instance_uid(format!("1.2.3.{}", spec.instance))
        .transfer_syntax("1.2.840.10008.1.2.1") // Explicit VR Little Endian
        .build()
        .unwrap();
    let mut obj: FileDicomObject<InMemDicomObject> = FileDicomObject::new_empty_with_meta(meta);

    obj.put(InMemElement::new(
        tags::PATIENT_NAME,
        VR::PN,
        Value::from("Doe^John"),
    ));
    obj.put(InMemElement::new(
        tags::PATIENT_ID,
        VR::LO,
        Value::from("19991231"),
    ));
    obj.put(InMemElement::new(
        tags::PATIENT_SEX,
        VR::CS,
        Value::from("M"),
    ));
    obj.put(InMemElement::new(
        tags::INSTITUTION_NAME,
        VR::LO,
        Value::from("General Hospital"),
    ));
    if spec.with_birth_date {
        obj.put(InMemElement::new(
            tags::PATIENT_BIRTH_DATE,
            VR::DA,
            Value::from("19700101"),
        ));
    }
    if let Some(series_time) = spec.series_time {
        obj.put(InMemElement::new(
            tags::SERIES_TIME,
            VR::TM,
            Value::from(series_time),
        ));
    }

    fs::create_dir_all(path.parent().unwrap()).unwrap();
    obj.write_to_file(path).unwrap();
}

fn record_bytes(spec: &RecordSpec) -> Vec<u8> {
    let scratch = tempdir().unwrap();
    let path = scratch.path().join("record.dcm");
    write_record(&path, spec);
    fs::read(&path).unwrap()
}

#[test]
fn expanded_directory_patient_is_redacted_and_sequenced() {
    let root = tempdir().unwrap();
    let patient = root.path().join("TAG_DATA_HOSPITAL-07");
    let scans = patient.join("SCANS");

    write_record(
        &scans.join("sub1").join("scan_TEST1.dcm"),
        &RecordSpec {
            series_time: Some("093000"),
            instance: 1,
            ..Default::default()
        },
    );
    write_record(
        &scans.join("sub1").join("scan_b.dcm"),
        &RecordSpec {
            series_time: Some("091500"),
            instance: 2,
            ..Default::default()
        },
    );
    write_record(
        &scans.join("sub2").join("scan_c.dcm"),
        &RecordSpec {
            series_time: Some("093000"),
            instance: 3,
            ..Default::default()
        },
    );

    let processor = PatientProcessor::new(ConfigBuilder::default().build());
    let summary = processor.process(&patient).unwrap();

    assert_eq!(summary.records, 3);
    assert_eq!(summary.anonymization_tag, "TAG_DATA_HOSPITAL-07");

    let output = patient.join("TAG_DATA_HOSPITAL-07");
    // earliest series time first; the TEST1 marker keeps its suffix; the tie
    // between the two 093000 records is broken by traversal order
    assert!(output.join("000.dcm").is_file());
    assert!(output.join("001_t1.dcm").is_file());
    assert!(output.join("002.dcm").is_file());

    // the source tree is gone, only the output remains
    assert!(!scans.exists());

    let renamed = DicomRecord::open(output.join("001_t1.dcm")).unwrap();
    assert_eq!(
        renamed.get(Field::PatientName),
        Some("TAG_DATA_HOSPITAL-07".into())
    );
    assert_eq!(renamed.get(Field::PatientId), Some("000000000000".into()));
    assert_eq!(renamed.get(Field::PatientSex), Some("X".into()));
    assert_eq!(
        renamed.get(Field::InstitutionName),
        Some("Hospital".into())
    );
    // the sort key is not an identifying field and survives redaction
    assert_eq!(renamed.get(Field::SeriesTime), Some("093000".into()));
}

#[test]
fn archived_patient_is_extracted_processed_and_cleaned_up() {
    let root = tempdir().unwrap();
    let patient = root.path().join("TAG_DATA_HOSPITAL-08");
    fs::create_dir_all(&patient).unwrap();

    let archive_path = patient.join("PATIENT1.zip");
    let mut writer = ZipWriter::new(File::create(&archive_path).unwrap());
    let options = SimpleFileOptions::default();
    for (name, time, instance) in [
        ("INNER/raw1.dcm", "092000", 1u32),
        ("INNER/raw2.dcm", "090000", 2u32),
    ] {
        writer.start_file(name, options).unwrap();
        let bytes = record_bytes(&RecordSpec {
            series_time: Some(time),
            instance,
            ..Default::default()
        });
        writer.write_all(&bytes).unwrap();
    }
    writer.finish().unwrap();

    let config = ConfigBuilder::default()
        .patient_name_override("CASE-08")
        .build();
    let processor = PatientProcessor::new(config);
    let summary = processor.process(&patient).unwrap();

    assert_eq!(summary.records, 2);
    assert_eq!(summary.anonymization_tag, "CASE-08");

    let output = patient.join("CASE-08");
    assert!(output.join("000.dcm").is_file());
    assert!(output.join("001.dcm").is_file());

    // raw2 is earlier, so it became 000
    let first = DicomRecord::open(output.join("000.dcm")).unwrap();
    assert_eq!(first.get(Field::SeriesTime), Some("090000".into()));
    assert_eq!(first.get(Field::PatientName), Some("CASE-08".into()));

    // both the archive and the extracted tree are consumed
    assert!(!archive_path.exists());
    assert!(!patient.join("PATIENT1").exists());
}

#[test]
fn record_without_series_time_fails_the_whole_patient() {
    let root = tempdir().unwrap();
    let patient = root.path().join("TAG_DATA_HOSPITAL-09");
    let scans = patient.join("SCANS");

    write_record(
        &scans.join("good.dcm"),
        &RecordSpec {
            series_time: Some("090000"),
            instance: 1,
            ..Default::default()
        },
    );
    write_record(
        &scans.join("no_time.dcm"),
        &RecordSpec {
            series_time: None,
            instance: 2,
            ..Default::default()
        },
    );

    let processor = PatientProcessor::new(ConfigBuilder::default().build());
    let err = processor.process(&patient).unwrap_err();

    match err {
        PatientError::Sequence {
            source: SequenceError::MissingSortKey { path },
            ..
        } => assert!(path.ends_with("no_time.dcm")),
        other => panic!("unexpected error: {other}"),
    }

    // fail fast: nothing was renamed
    assert!(scans.join("good.dcm").is_file());
    assert!(!patient.join("TAG_DATA_HOSPITAL-09").exists());
}

#[test]
fn missing_fields_are_tolerated_and_left_absent() {
    let root = tempdir().unwrap();
    let patient = root.path().join("TAG_DATA_HOSPITAL-10");
    let scans = patient.join("SCANS");

    write_record(
        &scans.join("partial.dcm"),
        &RecordSpec {
            with_birth_date: false,
            ..Default::default()
        },
    );

    let processor = PatientProcessor::new(ConfigBuilder::default().build());
    let summary = processor.process(&patient).unwrap();
    assert_eq!(summary.records, 1);

    let renamed = DicomRecord::open(summary.output_dir.join("000.dcm")).unwrap();
    // absent before, still absent after: redaction never fabricates a tag
    assert_eq!(renamed.get(Field::PatientBirthDate), None);
    assert_eq!(renamed.get(Field::PatientId), Some("000000000000".into()));
    assert_eq!(renamed.get(Field::InstitutionName), Some("Hospital".into()));
}

#[test]
fn preview_reports_changes_without_touching_files() {
    let root = tempdir().unwrap();
    let patient = root.path().join("TAG_DATA_HOSPITAL-11");
    let scans = patient.join("SCANS");

    write_record(&scans.join("only.dcm"), &RecordSpec::default());

    let processor = PatientProcessor::new(ConfigBuilder::default().build());
    let preview = processor.preview(&patient).unwrap();

    assert_eq!(preview.redactions.len(), 1);
    assert_eq!(preview.planned.len(), 1);
    let (_, redaction) = &preview.redactions[0];
    let name_change = redaction
        .changes
        .iter()
        .find(|change| change.field == Field::PatientName)
        .unwrap();
    assert_eq!(name_change.before, "Doe^John");
    assert_eq!(name_change.after, "TAG_DATA_HOSPITAL-11");

    // nothing moved, nothing redacted
    assert!(scans.join("only.dcm").is_file());
    assert!(!patient.join("TAG_DATA_HOSPITAL-11").exists());
    let untouched = DicomRecord::open(scans.join("only.dcm")).unwrap();
    assert_eq!(untouched.get(Field::PatientName), Some("Doe^John".into()));
}
