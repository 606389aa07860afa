//
// models.rs
// dicom-headers
//
// Defines serializable data structures for minimal datasets, the aggregated index tree, and header nodes.
//

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Fixed set of identifying and geometry fields pulled from one file during a
/// directory scan. Every field is optional: absence never aborts extraction
/// of the remaining fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinimalDataset {
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub study_instance_uid: Option<String>,
    pub series_instance_uid: Option<String>,
    pub sop_instance_uid: Option<String>,
    pub study_description: Option<String>,
    pub series_description: Option<String>,
    pub modality: Option<String>,
    pub instance_number: Option<i64>,
    pub acquisition_number: Option<i64>,
    pub image_orientation_patient: Option<Vec<f64>>,
    pub image_position_patient: Option<Vec<f64>>,
    pub number_of_frames: Option<i64>,
    pub rows: Option<u16>,
    pub columns: Option<u16>,
    pub pixel_spacing: Option<Vec<f64>>,
    pub slice_thickness: Option<f64>,
    /// Best-effort date: acquisition, instance creation, content, series.
    pub date: Option<String>,
    /// Best-effort time, same fallback chain as `date`.
    pub time: Option<String>,
    pub acquisition_time: Option<String>,
    pub manufacturer: Option<String>,
    pub manufacturer_model_name: Option<String>,
}

/// Trimmed single-file probe used to title a view before a full decode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuickInstanceMeta {
    pub modality: Option<String>,
    pub series_description: Option<String>,
    pub sop_instance_uid: Option<String>,
    pub instance_number: Option<i64>,
    pub date: Option<String>,
    pub time: Option<String>,
}

/// One file's slot in a series, carrying only what the browsing UI needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRef {
    pub path: PathBuf,
    pub sop_instance_uid: Option<String>,
    pub instance_number: Option<i64>,
    pub acquisition_number: Option<i64>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub acquisition_time: Option<String>,
    pub frame_count: Option<i64>,
}

/// Series-level summary plus its ordered instances. Summary fields come from
/// the sample instance, not from every file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub series_uid: String,
    pub modality: String,
    pub series_description: Option<String>,
    pub study_description: Option<String>,
    pub instance_count: usize,
    pub rows: Option<u16>,
    pub columns: Option<u16>,
    pub pixel_spacing: Option<Vec<f64>>,
    pub slice_thickness: Option<f64>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub instances: Vec<InstanceRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    pub study_uid: String,
    pub study_description: Option<String>,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub studies: Vec<Study>,
}

/// Running counters accumulated over one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub files_total: usize,
    pub files_parsed: usize,
    pub patients: usize,
    pub studies: usize,
    pub series: usize,
    pub instances: usize,
    pub modality_by_series: BTreeMap<String, usize>,
}

/// Aggregated result of one directory scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DicomIndex {
    pub patients: Vec<Patient>,
    pub stats: IndexStats,
}

/// Closed classification of VR codes used for display dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    #[serde(rename = "UID")]
    Uid,
    Date,
    Time,
    DateTime,
    String,
    Number,
    Tag,
    Sequence,
    Binary,
    Other,
}

/// One decoded element in a header tree. Sequence nodes always carry
/// `children`, one per contained item; item rows have blank scalar fields
/// and their own nested `children`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderNode {
    pub tag_hex: String,
    pub keyword: String,
    pub vr: Option<String>,
    pub length: Option<u64>,
    pub vm: Option<u64>,
    pub dtype: Option<ValueKind>,
    pub preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<HeaderNode>>,
}
