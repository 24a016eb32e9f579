//! Stable integer codes for categorical attributes
//!
//! A field's mapping is fitted the first time it is encoded and reused
//! verbatim afterwards. Inference goes through [`EncoderRegistry::transform`],
//! which cannot mutate the registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Reserved class for missing and unseen values
pub const UNKNOWN: &str = "Unknown";

/// Categorical columns that feed the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoricalField {
    Brand,
    Platform,
}

impl CategoricalField {
    /// Every categorical field, in feature order
    pub const ALL: [CategoricalField; 2] = [CategoricalField::Brand, CategoricalField::Platform];

    /// Key under which the mapping is persisted
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoricalField::Brand => "brand",
            CategoricalField::Platform => "platform",
        }
    }
}

/// Sorted class list; a value's code is its index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    classes: Vec<String>,
}

impl CategoryEncoder {
    /// Fit on the observed values. Missing values count as [`UNKNOWN`], and the
    /// unknown class is always registered.
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut classes: Vec<String> = values
            .into_iter()
            .map(|v| v.unwrap_or(UNKNOWN).to_string())
            .collect();
        classes.push(UNKNOWN.to_string());
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// Code of a known class
    pub fn lookup(&self, value: &str) -> Option<u32> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
            .map(|i| i as u32)
    }

    /// Code for any value: unseen values fall back to [`UNKNOWN`], or to the
    /// first class when the unknown class is not registered.
    pub fn code(&self, value: Option<&str>) -> u32 {
        let value = value.unwrap_or(UNKNOWN);
        self.lookup(value)
            .or_else(|| self.lookup(UNKNOWN))
            .unwrap_or(0)
    }

    /// Registered classes in code order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Field name → frozen value mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderRegistry {
    fields: BTreeMap<String, CategoryEncoder>,
}

impl EncoderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode values of `field`, fitting the field's mapping on first use
    pub fn encode(&mut self, field: CategoricalField, values: &[Option<&str>]) -> Vec<u32> {
        let encoder = self
            .fields
            .entry(field.as_str().to_string())
            .or_insert_with(|| {
                let encoder = CategoryEncoder::fit(values.iter().copied());
                debug!(
                    field = field.as_str(),
                    classes = encoder.classes().len(),
                    "Fitted categorical encoder"
                );
                encoder
            });
        values.iter().map(|v| encoder.code(*v)).collect()
    }

    /// Encode one value against the frozen mapping. A field that was never
    /// fitted encodes everything as 0.
    pub fn transform(&self, field: CategoricalField, value: Option<&str>) -> u32 {
        self.fields
            .get(field.as_str())
            .map_or(0, |encoder| encoder.code(value))
    }

    /// Mapping of a field, if fitted
    pub fn encoder(&self, field: CategoricalField) -> Option<&CategoryEncoder> {
        self.fields.get(field.as_str())
    }

    /// Whether no field has been fitted yet
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fit_is_sorted_with_unknown() {
        let encoder = CategoryEncoder::fit([Some("HP"), Some("Dell"), None, Some("HP")]);
        assert_eq!(encoder.classes(), &["Dell", "HP", "Unknown"]);
        assert_eq!(encoder.code(Some("Dell")), 0);
        assert_eq!(encoder.code(None), 2);
    }

    #[test]
    fn test_unseen_maps_to_unknown() {
        let mut registry = EncoderRegistry::new();
        let codes = registry.encode(CategoricalField::Brand, &[Some("Dell"), Some("Lenovo")]);
        assert_eq!(codes, vec![0, 1]);

        assert_eq!(registry.transform(CategoricalField::Brand, Some("Acer")), 2);
        // second encode call reuses the frozen mapping
        let again = registry.encode(CategoricalField::Brand, &[Some("Acer"), Some("Lenovo")]);
        assert_eq!(again, vec![2, 1]);
        assert_eq!(registry.encoder(CategoricalField::Brand).unwrap().classes().len(), 3);
    }

    #[test]
    fn test_fallback_without_unknown_class() {
        // a persisted mapping written without the unknown class
        let encoder: CategoryEncoder =
            serde_json::from_str(r#"{"classes": ["alpha", "beta"]}"#).unwrap();
        assert_eq!(encoder.code(Some("gamma")), 0);
        assert_eq!(encoder.code(Some("beta")), 1);
    }

    #[test]
    fn test_unfitted_field_encodes_zero() {
        let registry = EncoderRegistry::new();
        assert_eq!(registry.transform(CategoricalField::Platform, Some("amazon")), 0);
    }
}
