//
// dictionary.rs
// dicom-headers
//
// Loads and normalizes an external tag dictionary and resolves tags to keywords and VR codes.
//

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use dicom::core::dictionary::{DataDictionary, VirtualVr};
use dicom::core::Tag;
use dicom::dictionary_std::StandardDataDictionary;
use serde_json::Value;
use tracing::{debug, warn};

/// Environment variable naming the external dictionary resource: either a
/// JSON file directly, or a directory searched for the candidate file names.
pub const DICTIONARY_PATH_VAR: &str = "DICOM_DICTIONARY_PATH";

/// File names probed, in order, when the resource location is a directory.
const CANDIDATE_FILES: &[&str] = &[
    "public.json",
    "full.json",
    "dist/public.json",
    "dist/full.json",
    "data/public.json",
    "data/full.json",
    "index.json",
];

/// One normalized dictionary entry, keyed by a lowercase 8-hex tag.
#[derive(Debug, Clone, PartialEq)]
pub struct DictEntry {
    pub keyword: String,
    pub vr: Option<String>,
}

/// Result of a tag lookup; `keyword` is empty when the tag is unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DictLookup {
    pub keyword: String,
    pub vr: Option<String>,
}

/// Tag resolver combining an optional external JSON table with the standard
/// data dictionary compiled into the crate. Built once, read-only after.
pub struct TagDictionary {
    entries: HashMap<String, DictEntry>,
    standard: StandardDataDictionary,
}

impl TagDictionary {
    /// Build the dictionary, loading the external table if one resolves.
    pub fn load() -> Self {
        let entries = match load_external_table() {
            Some(entries) => entries,
            None => HashMap::new(),
        };
        TagDictionary {
            entries,
            standard: StandardDataDictionary::default(),
        }
    }

    /// Process-wide cache: initialized lazily on first use, immutable after.
    pub fn shared() -> &'static TagDictionary {
        static SHARED: OnceLock<TagDictionary> = OnceLock::new();
        SHARED.get_or_init(TagDictionary::load)
    }

    /// Number of entries loaded from the external table.
    pub fn external_len(&self) -> usize {
        self.entries.len()
    }

    /// Resolve a tag to a keyword and VR code. Never fails: an unknown tag
    /// yields an empty keyword and no VR, and the caller decides how to
    /// label private/unknown tags.
    pub fn lookup(&self, tag: Tag) -> DictLookup {
        for key in key_variants(tag) {
            if let Some(entry) = self.entries.get(&key) {
                return DictLookup {
                    keyword: entry.keyword.clone(),
                    vr: entry.vr.clone(),
                };
            }
        }

        if let Some(entry) = self.standard.by_tag(tag) {
            return DictLookup {
                keyword: entry.alias.to_string(),
                vr: exact_vr(entry.vr),
            };
        }

        DictLookup::default()
    }
}

fn exact_vr(vr: VirtualVr) -> Option<String> {
    // Only concrete VRs are usable; value-dependent ones resolve per element.
    match vr {
        VirtualVr::Exact(vr) => Some(format!("{:?}", vr)),
        _ => None,
    }
}

/// Textual key shapes tried against the external table, most common first.
fn key_variants(tag: Tag) -> [String; 8] {
    let group = format!("{:04x}", tag.group());
    let element = format!("{:04x}", tag.element());
    let flat = format!("{group}{element}");
    let comma = format!("{group},{element}");
    [
        flat.clone(),
        flat.to_uppercase(),
        comma.clone(),
        comma.to_uppercase(),
        format!("x{flat}"),
        format!("x{}", flat.to_uppercase()),
        format!("{group}-{element}"),
        format!("{group}_{element}"),
    ]
}

fn load_external_table() -> Option<HashMap<String, DictEntry>> {
    let base = env::var_os(DICTIONARY_PATH_VAR).map(PathBuf::from)?;
    for path in candidate_paths(&base) {
        if !path.is_file() {
            continue;
        }
        match table_from_file(&path) {
            Some(table) if !table.is_empty() => {
                debug!(
                    path = %path.display(),
                    entries = table.len(),
                    "loaded external tag dictionary"
                );
                return Some(table);
            }
            _ => {
                warn!(path = %path.display(), "ignoring unusable dictionary file");
            }
        }
    }
    None
}

fn candidate_paths(base: &Path) -> Vec<PathBuf> {
    if base.is_file() {
        vec![base.to_path_buf()]
    } else {
        CANDIDATE_FILES.iter().map(|rel| base.join(rel)).collect()
    }
}

fn table_from_file(path: &Path) -> Option<HashMap<String, DictEntry>> {
    let text = fs::read_to_string(path).ok()?;
    let raw: Value = serde_json::from_str(&text).ok()?;
    Some(normalize_table(&raw))
}

/// Source shapes the loader understands, tried in this order. Each parser
/// returns a possibly-empty table; the first non-empty result wins.
#[derive(Debug, Clone, Copy)]
enum SourceShape {
    FlatHexMap,
    CommaMap,
    RecordArray,
    NestedSearch,
}

const SHAPES: [SourceShape; 4] = [
    SourceShape::FlatHexMap,
    SourceShape::CommaMap,
    SourceShape::RecordArray,
    SourceShape::NestedSearch,
];

fn normalize_table(raw: &Value) -> HashMap<String, DictEntry> {
    for shape in SHAPES {
        let table = match shape {
            SourceShape::FlatHexMap => parse_flat_hex_map(raw),
            SourceShape::CommaMap => parse_comma_map(raw),
            SourceShape::RecordArray => parse_record_array(raw),
            SourceShape::NestedSearch => parse_nested(raw),
        };
        if !table.is_empty() {
            return table;
        }
    }
    HashMap::new()
}

/// `{ "00080060": { "name"|"keyword": …, "vr": … }, … }`
fn parse_flat_hex_map(raw: &Value) -> HashMap<String, DictEntry> {
    let mut out = HashMap::new();
    let Some(map) = raw.as_object() else {
        return out;
    };
    for (key, value) in map {
        if is_hex_run(key, 8) {
            if let Some(entry) = entry_from_object(value) {
                out.insert(key.to_lowercase(), entry);
            }
        }
    }
    out
}

/// `{ "0008,0060": { … }, … }`
fn parse_comma_map(raw: &Value) -> HashMap<String, DictEntry> {
    let mut out = HashMap::new();
    let Some(map) = raw.as_object() else {
        return out;
    };
    for (key, value) in map {
        let Some((group, element)) = key.split_once(',') else {
            continue;
        };
        if is_hex_run(group, 4) && is_hex_run(element, 4) {
            if let Some(entry) = entry_from_object(value) {
                out.insert(format!("{}{}", group, element).to_lowercase(), entry);
            }
        }
    }
    out
}

/// `[ { "tag": "00080060", "name"|"keyword": …, "vr": … }, … ]`
fn parse_record_array(raw: &Value) -> HashMap<String, DictEntry> {
    let mut out = HashMap::new();
    let Some(records) = raw.as_array() else {
        return out;
    };
    for record in records {
        let tag = record
            .get("tag")
            .or_else(|| record.get("Tag"))
            .and_then(Value::as_str)
            .map(|raw_tag| {
                raw_tag
                    .chars()
                    .filter(char::is_ascii_hexdigit)
                    .collect::<String>()
            });
        let Some(tag) = tag.filter(|t| t.len() == 8) else {
            continue;
        };
        if let Some(entry) = entry_from_object(record) {
            out.insert(tag.to_lowercase(), entry);
        }
    }
    out
}

/// Last resort: search nested object properties for any recognizable shape.
fn parse_nested(raw: &Value) -> HashMap<String, DictEntry> {
    let Some(map) = raw.as_object() else {
        return HashMap::new();
    };
    for value in map.values() {
        if value.is_object() || value.is_array() {
            let nested = normalize_table(value);
            if !nested.is_empty() {
                return nested;
            }
        }
    }
    HashMap::new()
}

fn entry_from_object(value: &Value) -> Option<DictEntry> {
    let object = value.as_object()?;
    let keyword = object
        .get("keyword")
        .or_else(|| object.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let vr = object
        .get("vr")
        .and_then(Value::as_str)
        .filter(|vr| !vr.is_empty())
        .map(str::to_string);
    Some(DictEntry { keyword, vr })
}

fn is_hex_run(text: &str, len: usize) -> bool {
    text.len() == len && text.chars().all(|c| c.is_ascii_hexdigit())
}
