//
// index.rs
// dicom-headers
//
// Walks a directory, reads per-file minimal datasets, and folds them into a Patient/Study/Series/Instance tree.
//

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::debug;
use walkdir::WalkDir;

use crate::metadata;
use crate::models::{DicomIndex, IndexStats, InstanceRef, MinimalDataset, Patient, Series, Study};

/// Patient key used when a file carries no PatientID; keeps the tree keyed.
pub const UNKNOWN_PATIENT_ID: &str = "UNKNOWN";

/// Modality bucket for a series whose sample instance has no Modality.
const UNKNOWN_MODALITY: &str = "UNK";

/// Files shorter than this cannot hold a DICOM preamble and are skipped.
const MIN_DICOM_FILE_LEN: u64 = 64;

/// Progress callback cadence, in files.
const PROGRESS_EVERY: usize = 50;

/// Snapshot handed to the progress callback while a scan runs. The final
/// report always carries `percent == 1.0` and no path.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub percent: f64,
    pub current_path: Option<PathBuf>,
}

/// List every regular file reachable under `root`. Directories that cannot
/// be listed are skipped rather than aborting the walk; traversal order is
/// not semantically significant downstream.
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Scan a directory into an aggregated index. Candidate files parse in
/// parallel; unreadable or unparsable files are excluded silently, which is
/// normal operation rather than an error.
pub fn scan_directory<F>(root: &Path, on_progress: F) -> DicomIndex
where
    F: Fn(ScanProgress) + Sync,
{
    let files = list_files(root);
    let total = files.len().max(1);
    let processed = AtomicUsize::new(0);

    // rayon preserves input order in collect, so the later fold stays
    // deterministic regardless of which worker finishes first.
    let records: Vec<Option<MinimalDataset>> = files
        .par_iter()
        .map(|path| {
            let record = parse_candidate(path);
            let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
            if done % PROGRESS_EVERY == 0 || done == files.len() {
                on_progress(ScanProgress {
                    percent: done as f64 / total as f64,
                    current_path: Some(path.clone()),
                });
            }
            record
        })
        .collect();

    // Always report completion, even when nothing matched.
    on_progress(ScanProgress {
        percent: 1.0,
        current_path: None,
    });

    build_index(&files, records)
}

fn parse_candidate(path: &Path) -> Option<MinimalDataset> {
    let len = fs::metadata(path).ok()?.len();
    if len < MIN_DICOM_FILE_LEN {
        debug!(path = %path.display(), len, "skipping file below minimum DICOM length");
        return None;
    }
    match metadata::read_minimal_dataset(path) {
        Ok(record) => Some(record),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "skipping unparsable file");
            None
        }
    }
}

/// Per-instance accumulator: the outgoing reference plus the series-level
/// fields that only the sample instance contributes.
struct InstanceSeed {
    instance: InstanceRef,
    rows: Option<u16>,
    columns: Option<u16>,
    pixel_spacing: Option<Vec<f64>>,
    slice_thickness: Option<f64>,
    modality: Option<String>,
    series_description: Option<String>,
    manufacturer: Option<String>,
    model: Option<String>,
}

struct StudyAcc {
    study_description: Option<String>,
    series: BTreeMap<String, Vec<InstanceSeed>>,
}

#[derive(Default)]
struct PatientAcc {
    name: Option<String>,
    studies: BTreeMap<String, StudyAcc>,
}

fn build_index(files: &[PathBuf], records: Vec<Option<MinimalDataset>>) -> DicomIndex {
    let mut patients: BTreeMap<String, PatientAcc> = BTreeMap::new();
    let mut files_parsed = 0usize;
    let mut instance_count = 0usize;

    for (path, record) in files.iter().zip(records) {
        let Some(record) = record else { continue };
        files_parsed += 1;

        // Without both UIDs the file cannot be placed in the hierarchy.
        let (Some(study_uid), Some(series_uid)) = (
            record.study_instance_uid.clone(),
            record.series_instance_uid.clone(),
        ) else {
            continue;
        };

        let patient_id = record
            .patient_id
            .clone()
            .unwrap_or_else(|| UNKNOWN_PATIENT_ID.to_string());

        let patient = patients.entry(patient_id).or_default();
        if patient.name.is_none() {
            patient.name = record.patient_name.clone();
        }

        let study = patient
            .studies
            .entry(study_uid)
            .or_insert_with(|| StudyAcc {
                study_description: record.study_description.clone(),
                series: BTreeMap::new(),
            });

        study
            .series
            .entry(series_uid)
            .or_default()
            .push(seed_from(path, record));
        instance_count += 1;
    }

    summarize(patients, files.len(), files_parsed, instance_count)
}

fn seed_from(path: &Path, record: MinimalDataset) -> InstanceSeed {
    InstanceSeed {
        instance: InstanceRef {
            path: path.to_path_buf(),
            sop_instance_uid: record.sop_instance_uid,
            instance_number: record.instance_number,
            acquisition_number: record.acquisition_number,
            date: record.date,
            time: record.time,
            acquisition_time: record.acquisition_time,
            frame_count: record.number_of_frames,
        },
        rows: record.rows,
        columns: record.columns,
        pixel_spacing: record.pixel_spacing,
        slice_thickness: record.slice_thickness,
        modality: record.modality,
        series_description: record.series_description,
        manufacturer: record.manufacturer,
        model: record.manufacturer_model_name,
    }
}

fn summarize(
    patients: BTreeMap<String, PatientAcc>,
    files_total: usize,
    files_parsed: usize,
    instance_count: usize,
) -> DicomIndex {
    let mut out_patients = Vec::with_capacity(patients.len());
    let mut studies_count = 0usize;
    let mut series_count = 0usize;
    let mut modality_by_series: BTreeMap<String, usize> = BTreeMap::new();

    for (patient_id, patient) in patients {
        let mut out_studies = Vec::with_capacity(patient.studies.len());
        for (study_uid, study) in patient.studies {
            studies_count += 1;
            let mut out_series = Vec::with_capacity(study.series.len());
            for (series_uid, mut seeds) in study.series {
                series_count += 1;

                // Deterministic order; missing numbers sort as zero.
                seeds.sort_by_key(|seed| {
                    (
                        seed.instance.acquisition_number.unwrap_or(0),
                        seed.instance.instance_number.unwrap_or(0),
                    )
                });

                // Sample: first ordered instance carrying image geometry,
                // else the first instance.
                let sample_idx = seeds
                    .iter()
                    .position(|seed| seed.rows.is_some() && seed.columns.is_some())
                    .unwrap_or(0);

                let modality = seeds[sample_idx]
                    .modality
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_MODALITY.to_string());
                *modality_by_series.entry(modality.clone()).or_insert(0) += 1;

                let sample = &seeds[sample_idx];
                let series = Series {
                    series_uid,
                    modality,
                    series_description: sample.series_description.clone(),
                    study_description: study.study_description.clone(),
                    instance_count: seeds.len(),
                    rows: sample.rows,
                    columns: sample.columns,
                    pixel_spacing: sample.pixel_spacing.clone(),
                    slice_thickness: sample.slice_thickness,
                    manufacturer: sample.manufacturer.clone(),
                    model: sample.model.clone(),
                    instances: seeds.into_iter().map(|seed| seed.instance).collect(),
                };
                out_series.push(series);
            }
            out_studies.push(Study {
                study_uid,
                study_description: study.study_description,
                series: out_series,
            });
        }
        out_patients.push(Patient {
            patient_id,
            patient_name: patient.name,
            studies: out_studies,
        });
    }

    let stats = IndexStats {
        files_total,
        files_parsed,
        patients: out_patients.len(),
        studies: studies_count,
        series: series_count,
        instances: instance_count,
        modality_by_series,
    };

    DicomIndex {
        patients: out_patients,
        stats,
    }
}
