//
// headers.rs
// dicom-headers
//
// Decodes a file's full element set into a display-ready tree, resolving tags against the dictionary and formatting values per VR class.
//

use std::path::Path;

use dicom::core::value::{PrimitiveValue, Value};
use dicom::core::{Tag, VR};
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::InMemDicomObject;

use crate::dictionary::TagDictionary;
use crate::error::EngineError;
use crate::metadata::open_until_pixel_data;
use crate::models::{HeaderNode, ValueKind};

/// Hard ceiling on sequence nesting. Real datasets stay in single digits;
/// hitting this reports an error instead of overflowing the call stack.
pub const MAX_SEQUENCE_DEPTH: usize = 64;

const MAX_PREVIEW_LEN: usize = 120;

/// Decode one file's element stream (truncated before PixelData) into a
/// header tree. A pure function of the file bytes and dictionary state.
pub fn read_header_tree(
    path: &Path,
    dict: &TagDictionary,
) -> Result<Vec<HeaderNode>, EngineError> {
    let obj = open_until_pixel_data(path)?;
    build_nodes(&obj, dict, 0)
}

fn build_nodes(
    obj: &InMemDicomObject<StandardDataDictionary>,
    dict: &TagDictionary,
    depth: usize,
) -> Result<Vec<HeaderNode>, EngineError> {
    if depth > MAX_SEQUENCE_DEPTH {
        return Err(EngineError::SequenceTooDeep {
            max: MAX_SEQUENCE_DEPTH,
        });
    }

    let mut nodes = Vec::new();
    for elem in obj.iter() {
        let tag = elem.header().tag;
        let tag_hex = format_tag(tag);

        let looked_up = dict.lookup(tag);
        let vr = resolve_vr(elem.header().vr, looked_up.vr.as_deref());
        let keyword = resolve_keyword(looked_up.keyword, tag);
        let dtype = dtype_for(vr.as_deref());
        let class = VrClass::of(vr.as_deref());

        match elem.value() {
            Value::Sequence(seq) => {
                let items = seq.items();
                let mut children = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    children.push(HeaderNode {
                        tag_hex: format!("{}[{}]", tag_hex, idx),
                        keyword: format!("Item {}", idx + 1),
                        vr: None,
                        length: None,
                        vm: None,
                        dtype: None,
                        preview: String::new(),
                        children: Some(build_nodes(item, dict, depth + 1)?),
                    });
                }
                nodes.push(HeaderNode {
                    tag_hex,
                    keyword,
                    vr,
                    length: None,
                    vm: Some(items.len() as u64),
                    dtype,
                    preview: format!("Items: {}", items.len()),
                    children: Some(children),
                });
            }
            Value::PixelSequence(_) => {
                // Encapsulated fragments; normally removed by the stream
                // truncation, rendered as an opaque binary payload if not.
                nodes.push(HeaderNode {
                    tag_hex,
                    keyword,
                    vr,
                    length: None,
                    vm: None,
                    dtype: Some(ValueKind::Binary),
                    preview: String::new(),
                    children: None,
                });
            }
            Value::Primitive(value) => {
                let length = value.calculate_byte_len() as u64;
                nodes.push(HeaderNode {
                    tag_hex,
                    keyword,
                    vr,
                    length: Some(length),
                    vm: Some(multiplicity_for(class, length, value)),
                    dtype,
                    preview: preview_for(class, value, length),
                    children: None,
                });
            }
        }
    }
    Ok(nodes)
}

/// Render a tag in the conventional `(gggg,eeee)` lowercase-hex form.
pub fn format_tag(tag: Tag) -> String {
    format!("({:04x},{:04x})", tag.group(), tag.element())
}

fn is_private(tag: Tag) -> bool {
    tag.group() % 2 == 1
}

/// Element VR wins; for UN the dictionary may know the real representation
/// (implicit-VR private data arrives as UN from the parser).
fn resolve_vr(encoded: VR, dict_vr: Option<&str>) -> Option<String> {
    if encoded == VR::UN {
        if let Some(vr) = dict_vr {
            return Some(vr.to_string());
        }
    }
    Some(encoded.to_string().to_owned())
}

fn resolve_keyword(keyword: String, tag: Tag) -> String {
    if !keyword.is_empty() {
        return keyword;
    }
    if is_private(tag) {
        "Private Tag".to_string()
    } else {
        "Unknown Tag".to_string()
    }
}

/// Closed grouping of VR codes that drives multiplicity and preview
/// decoding; one dispatch point instead of per-call-site string checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VrClass {
    Sequence,
    Binary,
    FixedWidthNumeric { width: u64 },
    TextualNumeric,
    Textual,
    Other,
    Unknown,
}

impl VrClass {
    fn of(vr: Option<&str>) -> Self {
        match vr {
            None => VrClass::Unknown,
            Some("SQ") => VrClass::Sequence,
            Some("OB" | "OW" | "OF" | "OD" | "OL" | "OV" | "UN") => VrClass::Binary,
            Some("US" | "SS") => VrClass::FixedWidthNumeric { width: 2 },
            Some("UL" | "SL" | "FL" | "AT") => VrClass::FixedWidthNumeric { width: 4 },
            Some("FD") => VrClass::FixedWidthNumeric { width: 8 },
            Some("IS" | "DS") => VrClass::TextualNumeric,
            Some(
                "AE" | "AS" | "CS" | "DA" | "DT" | "LO" | "LT" | "PN" | "SH" | "ST" | "TM"
                | "UI" | "UC" | "UR" | "UT",
            ) => VrClass::Textual,
            Some(_) => VrClass::Other,
        }
    }
}

/// Closed display classification of a VR code.
fn dtype_for(vr: Option<&str>) -> Option<ValueKind> {
    let kind = match vr? {
        "UI" => ValueKind::Uid,
        "DA" => ValueKind::Date,
        "TM" => ValueKind::Time,
        "DT" => ValueKind::DateTime,
        "PN" | "LO" | "LT" | "SH" | "ST" | "UT" | "CS" => ValueKind::String,
        "IS" | "DS" | "US" | "SS" | "UL" | "SL" | "FL" | "FD" => ValueKind::Number,
        "AT" => ValueKind::Tag,
        "SQ" => ValueKind::Sequence,
        "OB" | "OW" | "OF" | "OD" | "OL" | "OV" | "UN" => ValueKind::Binary,
        _ => ValueKind::Other,
    };
    Some(kind)
}

/// Value multiplicity: fixed-width VRs derive it from the byte length when
/// it divides evenly, everything else from backslash-separated components.
fn multiplicity_for(class: VrClass, length: u64, value: &PrimitiveValue) -> u64 {
    match class {
        VrClass::FixedWidthNumeric { width } if length % width == 0 => (length / width).max(1),
        VrClass::Binary => 0,
        _ => component_count(value),
    }
}

fn component_count(value: &PrimitiveValue) -> u64 {
    let text = value.to_str();
    if text.is_empty() {
        0
    } else {
        text.split('\\').count() as u64
    }
}

fn preview_for(class: VrClass, value: &PrimitiveValue, length: u64) -> String {
    match class {
        // The caller renders a fixed "[binary]" marker from `dtype`.
        VrClass::Binary => String::new(),
        VrClass::FixedWidthNumeric { .. } => numeric_preview(value),
        VrClass::TextualNumeric | VrClass::Textual => truncate_preview(&value.to_str()),
        VrClass::Sequence | VrClass::Other | VrClass::Unknown => {
            let text = value.to_str();
            if !text.is_empty() {
                truncate_preview(&text)
            } else if length > 0 {
                format!("<{} bytes>", length)
            } else {
                String::new()
            }
        }
    }
}

/// Decoded numeric components joined by backslash, the DICOM multi-value
/// convention. AT values render as their `(gggg,eeee)` forms.
fn numeric_preview(value: &PrimitiveValue) -> String {
    match value {
        PrimitiveValue::U8(values) => join_numbers(values.iter()),
        PrimitiveValue::I16(values) => join_numbers(values.iter()),
        PrimitiveValue::U16(values) => join_numbers(values.iter()),
        PrimitiveValue::I32(values) => join_numbers(values.iter()),
        PrimitiveValue::U32(values) => join_numbers(values.iter()),
        PrimitiveValue::I64(values) => join_numbers(values.iter()),
        PrimitiveValue::U64(values) => join_numbers(values.iter()),
        PrimitiveValue::F32(values) => join_numbers(values.iter()),
        PrimitiveValue::F64(values) => join_numbers(values.iter()),
        PrimitiveValue::Tags(values) => values
            .iter()
            .map(|tag| format_tag(*tag))
            .collect::<Vec<_>>()
            .join("\\"),
        other => other.to_str().into_owned(),
    }
}

fn join_numbers<T: ToString>(values: impl Iterator<Item = T>) -> String {
    values
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join("\\")
}

fn truncate_preview(input: &str) -> String {
    if input.chars().count() <= MAX_PREVIEW_LEN {
        input.to_string()
    } else {
        let mut truncated: String = input.chars().take(MAX_PREVIEW_LEN).collect();
        truncated.push('…');
        truncated
    }
}
