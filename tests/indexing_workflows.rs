//
// indexing_workflows.rs
// dicom-headers
//
// Integration-style tests covering directory indexing, minimal dataset extraction, header trees, and the job surface.
//

use std::path::Path;
use std::sync::Mutex;

use dicom::core::value::DataSetSequence;
use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::{tags, uids, StandardDataDictionary};
use dicom::object::{FileDicomObject, FileMetaTableBuilder, InMemDicomObject};
use dicom::transfer_syntax::entries::EXPLICIT_VR_LITTLE_ENDIAN;
use dicom_headers::dictionary::TagDictionary;
use dicom_headers::index::{self, ScanProgress};
use dicom_headers::jobs::{self, HeadersReply, ScanMessage};
use dicom_headers::models::{HeaderNode, ValueKind};
use dicom_headers::{headers, metadata};
use tempfile::tempdir;

const STUDY_UID: &str = "1.2.826.0.1.3680043.2.1125.100";
const SERIES_UID: &str = "1.2.826.0.1.3680043.2.1125.100.1";

fn write_file(path: &Path, obj: InMemDicomObject<StandardDataDictionary>, sop_uid: &str) {
    let meta = FileMetaTableBuilder::new()
        .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN.uid())
        .media_storage_sop_class_uid(uids::SECONDARY_CAPTURE_IMAGE_STORAGE)
        .media_storage_sop_instance_uid(sop_uid)
        .build()
        .expect("meta");

    let mut file_obj = FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, meta);
    for elem in obj {
        file_obj.put(elem);
    }
    file_obj.write_to_file(path).expect("write test dicom");
}

/// One CT slice with predictable identifiers; geometry is optional so tests
/// can steer the series sample selection.
fn series_slice(instance_number: i32, with_geometry: bool) -> (InMemDicomObject<StandardDataDictionary>, String) {
    let sop_uid = format!("{SERIES_UID}.{instance_number}");
    let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
    obj.put(DataElement::new(
        tags::PATIENT_NAME,
        VR::PN,
        PrimitiveValue::from("Test^Patient"),
    ));
    obj.put(DataElement::new(
        tags::PATIENT_ID,
        VR::LO,
        PrimitiveValue::from("PAT123"),
    ));
    obj.put(DataElement::new(
        tags::STUDY_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from(STUDY_UID),
    ));
    obj.put(DataElement::new(
        tags::SERIES_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from(SERIES_UID),
    ));
    obj.put(DataElement::new(
        tags::SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from(sop_uid.as_str()),
    ));
    obj.put(DataElement::new(
        tags::MODALITY,
        VR::CS,
        PrimitiveValue::from("CT"),
    ));
    obj.put(DataElement::new(
        tags::SERIES_DESCRIPTION,
        VR::LO,
        PrimitiveValue::from("Chest axial"),
    ));
    obj.put(DataElement::new(
        tags::INSTANCE_NUMBER,
        VR::IS,
        PrimitiveValue::from(instance_number.to_string().as_str()),
    ));
    obj.put(DataElement::new(
        tags::ACQUISITION_DATE,
        VR::DA,
        PrimitiveValue::from("20240110"),
    ));
    obj.put(DataElement::new(
        tags::ACQUISITION_TIME,
        VR::TM,
        PrimitiveValue::from("101500"),
    ));
    if with_geometry {
        obj.put(DataElement::new(
            tags::ROWS,
            VR::US,
            PrimitiveValue::from(512_u16),
        ));
        obj.put(DataElement::new(
            tags::COLUMNS,
            VR::US,
            PrimitiveValue::from(512_u16),
        ));
        obj.put(DataElement::new(
            tags::PIXEL_SPACING,
            VR::DS,
            PrimitiveValue::from("0.5\\0.5"),
        ));
    }
    (obj, sop_uid)
}

fn write_series_slice(dir: &Path, file_name: &str, instance_number: i32, with_geometry: bool) {
    let (obj, sop_uid) = series_slice(instance_number, with_geometry);
    write_file(&dir.join(file_name), obj, &sop_uid);
}

fn find<'a>(nodes: &'a [HeaderNode], tag_hex: &str) -> &'a HeaderNode {
    nodes
        .iter()
        .find(|node| node.tag_hex == tag_hex)
        .unwrap_or_else(|| panic!("no node for {tag_hex}"))
}

#[test]
fn scan_orders_instances_and_tracks_counters() {
    let dir = tempdir().expect("tempdir");
    // Written out of order on purpose; the index must sort by number.
    write_series_slice(dir.path(), "c.dcm", 3, true);
    write_series_slice(dir.path(), "a.dcm", 1, false);
    write_series_slice(dir.path(), "b.dcm", 2, true);
    // Too short to be DICOM, and a full-size impostor.
    std::fs::write(dir.path().join("tiny.bin"), b"short").expect("write tiny");
    std::fs::write(dir.path().join("noise.dcm"), vec![0xFF_u8; 256]).expect("write noise");

    let progress: Mutex<Vec<ScanProgress>> = Mutex::new(Vec::new());
    let index = index::scan_directory(dir.path(), |p| progress.lock().unwrap().push(p));

    assert_eq!(index.stats.files_total, 5);
    assert_eq!(index.stats.files_parsed, 3);
    assert_eq!(index.stats.patients, 1);
    assert_eq!(index.stats.studies, 1);
    assert_eq!(index.stats.series, 1);
    assert_eq!(index.stats.instances, 3);
    assert_eq!(index.stats.modality_by_series["CT"], 1);

    let patient = &index.patients[0];
    assert_eq!(patient.patient_id, "PAT123");
    let series = &patient.studies[0].series[0];
    let order: Vec<i64> = series
        .instances
        .iter()
        .map(|i| i.instance_number.expect("instance number"))
        .collect();
    assert_eq!(order, vec![1, 2, 3]);

    // Sample selection skips the geometry-less first instance.
    assert_eq!(series.rows, Some(512));
    assert_eq!(series.columns, Some(512));
    assert_eq!(series.pixel_spacing.as_deref(), Some(&[0.5, 0.5][..]));
    assert_eq!(series.series_description.as_deref(), Some("Chest axial"));

    let progress = progress.into_inner().unwrap();
    let last = progress.last().expect("final progress");
    assert!((last.percent - 1.0).abs() < f64::EPSILON);
    assert!(last.current_path.is_none());
}

#[test]
fn scan_of_empty_directory_still_reports_completion() {
    let dir = tempdir().expect("tempdir");
    let progress: Mutex<Vec<ScanProgress>> = Mutex::new(Vec::new());
    let index = index::scan_directory(dir.path(), |p| progress.lock().unwrap().push(p));

    assert_eq!(index.stats.files_total, 0);
    assert!(index.patients.is_empty());

    let progress = progress.into_inner().unwrap();
    assert_eq!(progress.len(), 1);
    assert!((progress[0].percent - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn scan_job_streams_progress_then_one_terminal_result() {
    let dir = tempdir().expect("tempdir");
    write_series_slice(dir.path(), "a.dcm", 1, true);
    std::fs::write(dir.path().join("noise.dcm"), vec![0xAB_u8; 128]).expect("write noise");

    let (job_id, mut rx) = jobs::start_scan(dir.path().to_path_buf());
    let mut terminal = Vec::new();
    let mut saw_progress = false;
    while let Some(message) = rx.recv().await {
        match message {
            ScanMessage::Progress { job_id: id, .. } => {
                assert_eq!(id, job_id);
                saw_progress = true;
            }
            other => terminal.push(other),
        }
    }

    assert!(saw_progress);
    assert_eq!(terminal.len(), 1);
    match &terminal[0] {
        ScanMessage::Result { job_id: id, index } => {
            assert_eq!(*id, job_id);
            // The corrupt file is excluded, never surfaced as an error.
            assert_eq!(index.stats.files_total, 2);
            assert_eq!(index.stats.files_parsed, 1);
        }
        other => panic!("expected result message, got {other:?}"),
    }
}

#[test]
fn minimal_dataset_uses_the_date_fallback_chain() {
    let dir = tempdir().expect("tempdir");
    let (obj, sop_uid) = series_slice(1, false);
    let path = dir.path().join("acq.dcm");
    write_file(&path, obj, &sop_uid);

    // Acquisition date/time present: they win outright.
    let record = metadata::read_minimal_dataset(&path).expect("minimal dataset");
    assert_eq!(record.date.as_deref(), Some("20240110"));
    assert_eq!(record.time.as_deref(), Some("101500"));
    assert_eq!(record.modality.as_deref(), Some("CT"));

    // Without acquisition or creation fields, content-level values win
    // over series-level ones.
    let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
    obj.put(DataElement::new(
        tags::SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from("1.2.3.4"),
    ));
    obj.put(DataElement::new(
        tags::CONTENT_DATE,
        VR::DA,
        PrimitiveValue::from("20240120"),
    ));
    obj.put(DataElement::new(
        tags::SERIES_DATE,
        VR::DA,
        PrimitiveValue::from("20240121"),
    ));
    obj.put(DataElement::new(
        tags::SERIES_TIME,
        VR::TM,
        PrimitiveValue::from("235900"),
    ));
    let path = dir.path().join("content.dcm");
    write_file(&path, obj, "1.2.3.4");

    let record = metadata::read_minimal_dataset(&path).expect("minimal dataset");
    assert_eq!(record.date.as_deref(), Some("20240120"));
    assert_eq!(record.time.as_deref(), Some("235900"));
    assert!(record.study_instance_uid.is_none());
}

#[test]
fn quick_instance_meta_degrades_to_none_for_non_dicom() {
    let dir = tempdir().expect("tempdir");
    let garbage = dir.path().join("garbage.dcm");
    std::fs::write(&garbage, vec![0x00_u8; 256]).expect("write garbage");
    assert!(metadata::quick_instance_meta(&garbage).is_none());

    let (obj, sop_uid) = series_slice(7, false);
    let path = dir.path().join("real.dcm");
    write_file(&path, obj, &sop_uid);
    let meta = metadata::quick_instance_meta(&path).expect("quick meta");
    assert_eq!(meta.modality.as_deref(), Some("CT"));
    assert_eq!(meta.instance_number, Some(7));
    assert_eq!(meta.date.as_deref(), Some("20240110"));
}

/// Builds one file exercising every preview/VM class the tree reports.
fn write_header_fixture(path: &Path) {
    let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
    obj.put(DataElement::new(
        tags::SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from("1.2.840.99.1"),
    ));
    obj.put(DataElement::new(
        tags::MODALITY,
        VR::CS,
        PrimitiveValue::from("CT"),
    ));
    obj.put(DataElement::new(
        tags::PIXEL_SPACING,
        VR::DS,
        PrimitiveValue::from("0.5\\0.5"),
    ));
    obj.put(DataElement::new(
        tags::ACQUISITION_MATRIX,
        VR::US,
        PrimitiveValue::from([0_u16, 512, 512, 0]),
    ));
    // Private element: no dictionary entry, keyword degrades by parity.
    obj.put(DataElement::new(
        Tag(0x0009, 0x0010),
        VR::LO,
        PrimitiveValue::from("ACME 1.0"),
    ));
    // Bulk payload outside PixelData survives truncation as binary.
    obj.put(DataElement::new(
        Tag(0x0042, 0x0011),
        VR::OB,
        PrimitiveValue::from(vec![0_u8; 32]),
    ));

    // Two-item sequence; the second item nests another sequence.
    let inner_item = InMemDicomObject::from_element_iter([DataElement::new(
        tags::REFERENCED_SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from("1.2.840.99.1.9"),
    )]);
    let nested = DataElement::new(
        tags::REFERENCED_IMAGE_SEQUENCE,
        VR::SQ,
        DataSetSequence::from(vec![inner_item]),
    );

    let item_one = InMemDicomObject::from_element_iter([DataElement::new(
        tags::REFERENCED_SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from("1.2.840.99.1.1"),
    )]);
    let mut item_two = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
    item_two.put(nested);

    obj.put(DataElement::new(
        tags::REFERENCED_PERFORMED_PROCEDURE_STEP_SEQUENCE,
        VR::SQ,
        DataSetSequence::from(vec![item_one, item_two]),
    ));

    write_file(path, obj, "1.2.840.99.1");
}

#[test]
fn header_tree_classifies_values_per_vr() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("fixture.dcm");
    write_header_fixture(&path);

    let nodes = headers::read_header_tree(&path, TagDictionary::shared()).expect("header tree");

    let modality = find(&nodes, "(0008,0060)");
    assert_eq!(modality.keyword, "Modality");
    assert_eq!(modality.vr.as_deref(), Some("CS"));
    assert_eq!(modality.vm, Some(1));
    assert_eq!(modality.dtype, Some(ValueKind::String));
    assert_eq!(modality.preview, "CT");

    let spacing = find(&nodes, "(0028,0030)");
    assert_eq!(spacing.vm, Some(2));
    assert_eq!(spacing.dtype, Some(ValueKind::Number));
    assert_eq!(spacing.preview, "0.5\\0.5");

    let matrix = find(&nodes, "(0018,1310)");
    assert_eq!(matrix.vr.as_deref(), Some("US"));
    assert_eq!(matrix.length, Some(8));
    assert_eq!(matrix.vm, Some(4));
    assert_eq!(matrix.preview, "0\\512\\512\\0");

    let private = find(&nodes, "(0009,0010)");
    assert_eq!(private.keyword, "Private Tag");
    assert_eq!(private.dtype, Some(ValueKind::String));

    let bulk = find(&nodes, "(0042,0011)");
    assert_eq!(bulk.dtype, Some(ValueKind::Binary));
    assert_eq!(bulk.preview, "");
    assert_eq!(bulk.length, Some(32));

    let uid = find(&nodes, "(0008,0018)");
    assert_eq!(uid.dtype, Some(ValueKind::Uid));
}

#[test]
fn sequences_recurse_into_item_rows() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("fixture.dcm");
    write_header_fixture(&path);

    let nodes = headers::read_header_tree(&path, TagDictionary::shared()).expect("header tree");

    let sequence = find(&nodes, "(0008,1111)");
    assert_eq!(sequence.vr.as_deref(), Some("SQ"));
    assert_eq!(sequence.dtype, Some(ValueKind::Sequence));
    assert_eq!(sequence.vm, Some(2));
    assert_eq!(sequence.preview, "Items: 2");

    let items = sequence.children.as_ref().expect("sequence children");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].keyword, "Item 1");
    assert_eq!(items[0].tag_hex, "(0008,1111)[0]");
    assert!(items[0].vr.is_none());
    assert!(items[0].preview.is_empty());

    let first_children = items[0].children.as_ref().expect("item children");
    assert_eq!(first_children[0].tag_hex, "(0008,1155)");
    assert_eq!(first_children[0].keyword, "ReferencedSOPInstanceUID");

    // Second item nests a whole further sequence level.
    let second_children = items[1].children.as_ref().expect("item children");
    let nested = find(second_children, "(0008,1140)");
    assert_eq!(nested.preview, "Items: 1");
    let nested_items = nested.children.as_ref().expect("nested children");
    let leaf = nested_items[0].children.as_ref().expect("leaf children");
    assert_eq!(leaf[0].tag_hex, "(0008,1155)");
}

#[test]
fn decoding_twice_yields_identical_trees() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("fixture.dcm");
    write_header_fixture(&path);

    let first = headers::read_header_tree(&path, TagDictionary::shared()).expect("first decode");
    let second = headers::read_header_tree(&path, TagDictionary::shared()).expect("second decode");
    assert_eq!(first, second);
}

#[tokio::test]
async fn get_headers_resolves_errors_as_payloads() {
    let reply = jobs::get_headers("/definitely/not/there.dcm".into()).await;
    match reply {
        HeadersReply::Error { error } => assert!(error.contains("not/there.dcm")),
        HeadersReply::Headers(_) => panic!("expected an error payload"),
    }

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("fixture.dcm");
    write_header_fixture(&path);
    match jobs::get_headers(path).await {
        HeadersReply::Headers(nodes) => assert!(!nodes.is_empty()),
        HeadersReply::Error { error } => panic!("unexpected error: {error}"),
    }
}
