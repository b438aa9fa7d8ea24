//! Weight profiles
//!
//! A weight profile pairs a reference device with per-field weights. Registry
//! profiles and ad-hoc custom profiles share this type; custom weight text is
//! parsed and validated here so the engine only ever sees well-formed profiles.

use crate::{DeviceCatalog, Error, Field, Result};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Key naming the reference device in a custom weights document
pub const REFERENCE_KEY: &str = "ref";

/// A reference device and an ordered set of field weights
#[derive(Debug, Clone, PartialEq)]
pub struct WeightProfile {
    reference: String,
    weights: Vec<(Field, f64)>,
}

impl WeightProfile {
    /// Create a profile, checking the weights themselves.
    ///
    /// Whether the reference exists is a property of a catalog, see
    /// [`WeightProfile::validate_against`].
    pub fn new<I>(reference: impl Into<String>, weights: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Field, f64)>,
    {
        let reference = reference.into();
        if reference.trim().is_empty() {
            return Err(Error::missing_reference("reference device name is empty"));
        }

        let mut checked: Vec<(Field, f64)> = Vec::new();
        for (field, weight) in weights {
            if !weight.is_finite() {
                return Err(Error::invalid_weights(format!(
                    "weight for {} must be a finite number",
                    field
                )));
            }
            if checked.iter().any(|(seen, _)| *seen == field) {
                return Err(Error::invalid_weights(format!("duplicate weight for {}", field)));
            }
            checked.push((field, weight));
        }

        Ok(Self {
            reference,
            weights: checked,
        })
    }

    /// Parse a custom weights document such as
    /// `{"ref": "A100-SXM4-80GB", "fp16": 0.5, "memgb": 0.5}`
    /// and validate it against the catalog.
    pub fn parse_custom(text: &str, catalog: &DeviceCatalog) -> Result<Self> {
        let object: serde_json::Map<String, Value> = serde_json::from_str(text)
            .map_err(|e| Error::invalid_weights(format!("malformed weights document: {}", e)))?;

        let mut reference = None;
        let mut weights = Vec::with_capacity(object.len());
        for (key, value) in object {
            if key == REFERENCE_KEY {
                match value {
                    Value::String(name) => reference = Some(name),
                    other => {
                        return Err(Error::missing_reference(format!(
                            "\"{}\" must be a device name, got {}",
                            REFERENCE_KEY, other
                        )))
                    }
                }
                continue;
            }

            let field: Field = key.parse()?;
            let weight = value.as_f64().ok_or_else(|| {
                Error::invalid_weights(format!("weight for {} must be a number, got {}", field, value))
            })?;
            weights.push((field, weight));
        }

        let reference = reference.ok_or_else(|| {
            Error::missing_reference(format!("no \"{}\" device in weights document", REFERENCE_KEY))
        })?;

        let profile = Self::new(reference, weights)?;
        profile.validate_against(catalog)?;
        Ok(profile)
    }

    /// Check that the reference device exists in the catalog
    pub fn validate_against(&self, catalog: &DeviceCatalog) -> Result<()> {
        if !catalog.contains(&self.reference) {
            return Err(Error::missing_reference(format!(
                "reference device {} is not in the catalog",
                self.reference
            )));
        }
        Ok(())
    }

    /// Name of the reference device
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Field weights in declaration order
    pub fn weights(&self) -> &[(Field, f64)] {
        &self.weights
    }

    /// Weight of a field, if the profile weights it
    pub fn weight(&self, field: Field) -> Option<f64> {
        self.weights
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, w)| *w)
    }

    /// Sum of all weights
    pub fn weight_sum(&self) -> f64 {
        self.weights.iter().map(|(_, w)| w).sum()
    }

    /// A copy of this profile whose weights sum to one
    pub fn normalized(&self) -> Result<Self> {
        let sum = self.weight_sum();
        if sum == 0.0 {
            return Err(Error::DegenerateWeights(format!(
                "profile referencing {}",
                self.reference
            )));
        }

        Ok(Self {
            reference: self.reference.clone(),
            weights: self.weights.iter().map(|&(f, w)| (f, w / sum)).collect(),
        })
    }
}

impl Serialize for WeightProfile {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.weights.len() + 1))?;
        map.serialize_entry(REFERENCE_KEY, &self.reference)?;
        for (field, weight) in &self.weights {
            map.serialize_entry(field.as_str(), weight)?;
        }
        map.end()
    }
}
