use dicom::core::Tag;
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::{DefaultDicomObject, InMemDicomObject};

/// Small helper trait to pull typed values from different DICOM object shapes.
///
/// Empty strings normalize to `None` so callers can treat "absent" and
/// "present but blank" the same way.
pub trait ElementAccess {
    fn element_str(&self, tag: Tag) -> Option<String>;
    fn element_int(&self, tag: Tag) -> Option<i64>;
    fn element_u16(&self, tag: Tag) -> Option<u16>;
    fn element_f64(&self, tag: Tag) -> Option<f64>;
    /// Multi-valued float read; requires at least `expect` components and
    /// returns exactly the first `expect`.
    fn element_f64s(&self, tag: Tag, expect: usize) -> Option<Vec<f64>>;
}

impl ElementAccess for InMemDicomObject<StandardDataDictionary> {
    fn element_str(&self, tag: Tag) -> Option<String> {
        self.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim_end_matches('\0').trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn element_int(&self, tag: Tag) -> Option<i64> {
        self.element(tag).ok().and_then(|e| e.to_int::<i64>().ok())
    }

    fn element_u16(&self, tag: Tag) -> Option<u16> {
        self.element(tag).ok().and_then(|e| e.to_int::<u16>().ok())
    }

    fn element_f64(&self, tag: Tag) -> Option<f64> {
        self.element(tag).ok().and_then(|e| e.to_float64().ok())
    }

    fn element_f64s(&self, tag: Tag, expect: usize) -> Option<Vec<f64>> {
        let values = self
            .element(tag)
            .ok()
            .and_then(|e| e.to_multi_float64().ok())?;
        if values.len() < expect {
            return None;
        }
        Some(values[..expect].to_vec())
    }
}

impl ElementAccess for DefaultDicomObject {
    fn element_str(&self, tag: Tag) -> Option<String> {
        (**self).element_str(tag)
    }

    fn element_int(&self, tag: Tag) -> Option<i64> {
        (**self).element_int(tag)
    }

    fn element_u16(&self, tag: Tag) -> Option<u16> {
        (**self).element_u16(tag)
    }

    fn element_f64(&self, tag: Tag) -> Option<f64> {
        (**self).element_f64(tag)
    }

    fn element_f64s(&self, tag: Tag, expect: usize) -> Option<Vec<f64>> {
        (**self).element_f64s(tag, expect)
    }
}
