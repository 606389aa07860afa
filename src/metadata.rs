use std::path::Path;

use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::{DefaultDicomObject, OpenFileOptions};

use crate::dicom_access::ElementAccess;
use crate::error::EngineError;
use crate::models::{MinimalDataset, QuickInstanceMeta};

/// Start of bulk pixel data; every parse in this crate stops before it.
pub const PIXEL_DATA: Tag = tags::PIXEL_DATA;

/// Open a file and decode its element stream up to, but not including,
/// PixelData. Keeps scans fast and tolerant of broken bulk data.
pub(crate) fn open_until_pixel_data(path: &Path) -> Result<DefaultDicomObject, EngineError> {
    OpenFileOptions::new()
        .read_until(PIXEL_DATA)
        .open_file(path)
        .map_err(|err| EngineError::Parse {
            message: err.to_string(),
        })
}

/// Read the fixed identifying/geometry tag set from one file. `Err` means
/// the stream itself would not parse; a missing or unreadable individual
/// tag only leaves its field as `None`.
pub fn read_minimal_dataset(path: &Path) -> Result<MinimalDataset, EngineError> {
    let obj = open_until_pixel_data(path)?;
    Ok(extract_minimal_dataset(&obj))
}

pub fn extract_minimal_dataset<T: ElementAccess>(obj: &T) -> MinimalDataset {
    MinimalDataset {
        patient_name: obj.element_str(tags::PATIENT_NAME),
        patient_id: obj.element_str(tags::PATIENT_ID),
        study_instance_uid: obj.element_str(tags::STUDY_INSTANCE_UID),
        series_instance_uid: obj.element_str(tags::SERIES_INSTANCE_UID),
        sop_instance_uid: obj.element_str(tags::SOP_INSTANCE_UID),
        study_description: obj.element_str(tags::STUDY_DESCRIPTION),
        series_description: obj.element_str(tags::SERIES_DESCRIPTION),
        modality: obj.element_str(tags::MODALITY),
        instance_number: obj.element_int(tags::INSTANCE_NUMBER),
        acquisition_number: obj.element_int(tags::ACQUISITION_NUMBER),
        image_orientation_patient: obj.element_f64s(tags::IMAGE_ORIENTATION_PATIENT, 6),
        image_position_patient: obj.element_f64s(tags::IMAGE_POSITION_PATIENT, 3),
        number_of_frames: obj.element_int(tags::NUMBER_OF_FRAMES),
        rows: obj.element_u16(tags::ROWS),
        columns: obj.element_u16(tags::COLUMNS),
        pixel_spacing: obj.element_f64s(tags::PIXEL_SPACING, 2),
        slice_thickness: obj.element_f64(tags::SLICE_THICKNESS),
        date: best_effort_date(obj),
        time: best_effort_time(obj),
        acquisition_time: obj.element_str(tags::ACQUISITION_TIME),
        manufacturer: obj.element_str(tags::MANUFACTURER),
        manufacturer_model_name: obj.element_str(tags::MANUFACTURER_MODEL_NAME),
    }
}

// Fallback chains below are ordered by clinical intent; do not reorder.

fn best_effort_date<T: ElementAccess>(obj: &T) -> Option<String> {
    first_present([
        obj.element_str(tags::ACQUISITION_DATE),
        obj.element_str(tags::INSTANCE_CREATION_DATE),
        obj.element_str(tags::CONTENT_DATE),
        obj.element_str(tags::SERIES_DATE),
    ])
}

fn best_effort_time<T: ElementAccess>(obj: &T) -> Option<String> {
    first_present([
        obj.element_str(tags::ACQUISITION_TIME),
        obj.element_str(tags::INSTANCE_CREATION_TIME),
        obj.element_str(tags::CONTENT_TIME),
        obj.element_str(tags::SERIES_TIME),
    ])
}

fn first_present(values: [Option<String>; 4]) -> Option<String> {
    values.into_iter().flatten().next()
}

/// Trimmed probe for titling a single-file view without a full decode.
/// Returns `None` for anything that is not parseable DICOM.
pub fn quick_instance_meta(path: &Path) -> Option<QuickInstanceMeta> {
    let obj = open_until_pixel_data(path).ok()?;
    Some(QuickInstanceMeta {
        modality: obj.element_str(tags::MODALITY),
        series_description: obj.element_str(tags::SERIES_DESCRIPTION),
        sop_instance_uid: obj.element_str(tags::SOP_INSTANCE_UID),
        instance_number: obj.element_int(tags::INSTANCE_NUMBER),
        date: best_effort_date(&obj),
        time: best_effort_time(&obj),
    })
}
