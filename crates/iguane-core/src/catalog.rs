//! Device catalog
//!
//! The catalog is an immutable, ordered table of per-device hardware metrics.
//! It is loaded once (from the embedded built-in YAML or from a file) and never
//! mutated afterwards.

use crate::error::ErrorContext;
use crate::{Error, Field, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.yaml");

/// Hardware metrics of a single device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Half-precision throughput in TFLOPS, absent without a dedicated path
    pub fp16: Option<f64>,

    /// Single-precision throughput in TFLOPS
    pub fp32: f64,

    /// Double-precision throughput in TFLOPS
    pub fp64: f64,

    /// TensorFloat-32 throughput in TFLOPS, absent without a dedicated path
    pub tf32: Option<f64>,

    /// Memory capacity in GB
    pub memgb: f64,

    /// Memory bandwidth in GB/s
    pub membw: f64,

    /// Thermal design power in W
    pub tdp: f64,

    /// Release date, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
}

/// Device metrics with the precision fallbacks applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedMetrics {
    pub fp16: f64,
    pub fp32: f64,
    pub fp64: f64,
    pub tf32: f64,
    pub memgb: f64,
    pub membw: f64,
    pub tdp: f64,
}

impl ResolvedMetrics {
    /// Get the value of a field
    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::Fp16 => self.fp16,
            Field::Fp32 => self.fp32,
            Field::Fp64 => self.fp64,
            Field::Tf32 => self.tf32,
            Field::Memgb => self.memgb,
            Field::Membw => self.membw,
            Field::Tdp => self.tdp,
        }
    }
}

impl DeviceRecord {
    /// Resolve the optional precisions on a copy of the record: a missing fp16
    /// or tf32 rate is taken to be the fp32 rate.
    pub fn resolved(&self) -> ResolvedMetrics {
        ResolvedMetrics {
            fp16: self.fp16.unwrap_or(self.fp32),
            fp32: self.fp32,
            fp64: self.fp64,
            tf32: self.tf32.unwrap_or(self.fp32),
            memgb: self.memgb,
            membw: self.membw,
            tdp: self.tdp,
        }
    }

    /// Get the raw value of a field, `None` for an absent optional precision
    pub fn raw(&self, field: Field) -> Option<f64> {
        match field {
            Field::Fp16 => self.fp16,
            Field::Fp32 => Some(self.fp32),
            Field::Fp64 => Some(self.fp64),
            Field::Tf32 => self.tf32,
            Field::Memgb => Some(self.memgb),
            Field::Membw => Some(self.membw),
            Field::Tdp => Some(self.tdp),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        for field in Field::ALL {
            if let Some(value) = self.raw(field) {
                if !value.is_finite() || value < 0.0 {
                    return Err(Error::invalid_catalog(format!(
                        "{}: {} must be a non-negative number, got {}",
                        name, field, value
                    )));
                }
            }
        }

        if self.fp32 <= 0.0 {
            return Err(Error::invalid_catalog(format!(
                "{}: fp32 must be greater than zero",
                name
            )));
        }

        Ok(())
    }
}

/// One record of the on-disk catalog format
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogEntry {
    name: String,
    #[serde(default)]
    fp16: Option<f64>,
    fp32: f64,
    fp64: f64,
    #[serde(default)]
    tf32: Option<f64>,
    memgb: f64,
    membw: f64,
    tdp: f64,
    #[serde(default)]
    release: Option<String>,
}

impl CatalogEntry {
    fn into_parts(self) -> (String, DeviceRecord) {
        let record = DeviceRecord {
            fp16: self.fp16,
            fp32: self.fp32,
            fp64: self.fp64,
            tf32: self.tf32,
            memgb: self.memgb,
            membw: self.membw,
            tdp: self.tdp,
            release: self.release,
        };
        (self.name, record)
    }
}

/// Immutable mapping from device name to hardware metrics, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCatalog {
    names: Vec<String>,
    records: Vec<DeviceRecord>,
    index: HashMap<String, usize>,
}

impl DeviceCatalog {
    /// Build a catalog from (name, record) pairs, validating every record
    pub fn from_records<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, DeviceRecord)>,
    {
        let mut names = Vec::new();
        let mut records = Vec::new();
        let mut index = HashMap::new();

        for (name, record) in entries {
            if name.trim().is_empty() {
                return Err(Error::invalid_catalog("device name cannot be empty"));
            }
            record.validate(&name)?;
            if index.insert(name.clone(), names.len()).is_some() {
                return Err(Error::invalid_catalog(format!("duplicate device: {}", name)));
            }
            names.push(name);
            records.push(record);
        }

        if names.is_empty() {
            return Err(Error::invalid_catalog("catalog contains no devices"));
        }

        Ok(Self { names, records, index })
    }

    /// Parse a catalog from its YAML representation
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let entries: Vec<CatalogEntry> = serde_yaml::from_str(content)?;
        Self::from_records(entries.into_iter().map(CatalogEntry::into_parts))
    }

    /// Load a catalog from a YAML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context_fn(|| format!("Failed to read catalog file {}", path.display()))?;
        let catalog = Self::from_yaml_str(&content).map_err(|e| e.in_file(path))?;
        debug!("Loaded {} devices from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// The catalog embedded in the library, parsed on first use
    pub fn builtin() -> Result<&'static DeviceCatalog> {
        static BUILTIN: OnceLock<std::result::Result<DeviceCatalog, String>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| Self::from_yaml_str(BUILTIN_CATALOG).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|msg| Error::invalid_catalog(format!("built-in catalog: {}", msg)))
    }

    /// Look up a device by name
    pub fn lookup(&self, name: &str) -> Result<&DeviceRecord> {
        self.index
            .get(name)
            .map(|&i| &self.records[i])
            .ok_or_else(|| Error::unknown_device(name))
    }

    /// Check whether a device is in the catalog
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Device names in declaration order
    pub fn names(&self) -> impl DoubleEndedIterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }

    /// (name, record) pairs in declaration order
    pub fn records(&self) -> impl DoubleEndedIterator<Item = (&str, &DeviceRecord)> + '_ {
        self.names.iter().map(String::as_str).zip(self.records.iter())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Serialize for DeviceCatalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, record) in self.records() {
            map.serialize_entry(name, record)?;
        }
        map.end()
    }
}
