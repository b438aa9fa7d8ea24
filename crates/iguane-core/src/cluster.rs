//! Cluster aggregation
//!
//! Converts a device inventory into a per-device equivalence breakdown and a
//! grand total. Inventory entries that the catalog does not know are dropped
//! without error so historical inventories may keep decommissioned devices.

use crate::error::ErrorContext;
use crate::{Error, FomEngine, Result, Unit, WeightProfile};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Device counts by name, in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterInventory {
    entries: Vec<(String, f64)>,
}

impl ClusterInventory {
    /// Build an inventory from (name, count) pairs
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut inventory = Self::default();
        let mut seen = HashSet::new();
        for (name, count) in entries {
            let name = name.into();
            if !count.is_finite() || count < 0.0 {
                return Err(Error::invalid_inventory(format!(
                    "count for {} must be a non-negative number, got {}",
                    name, count
                )));
            }
            if !seen.insert(name.clone()) {
                return Err(Error::invalid_inventory(format!("{} is listed more than once", name)));
            }
            inventory.entries.push((name, count));
        }
        Ok(inventory)
    }

    /// Parse an inventory from a JSON object such as `{"T4": 8, "L40S": 2.5}`
    pub fn from_json_str(content: &str) -> Result<Self> {
        let RawEntries(raw) = serde_json::from_str(content).map_err(|e| {
            if e.is_data() {
                Error::invalid_inventory(e.to_string())
            } else {
                Error::Json(e)
            }
        })?;

        let mut entries = Vec::with_capacity(raw.len());
        for (name, count) in raw {
            let count = count.as_f64().ok_or_else(|| {
                Error::invalid_inventory(format!("count for {} must be a number, got {}", name, count))
            })?;
            entries.push((name, count));
        }
        Self::from_entries(entries)
    }

    /// Load an inventory from a JSON file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context_fn(|| format!("Failed to read inventory file {}", path.display()))?;
        let inventory = Self::from_json_str(&content).map_err(|e| e.in_file(path))?;
        debug!("Loaded {} inventory entries from {}", inventory.len(), path.display());
        Ok(inventory)
    }

    /// (name, count) pairs in input order
    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Object members in document order, repeated keys included
struct RawEntries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for RawEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping device names to counts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<RawEntries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, Value>()? {
                    entries.push(entry);
                }
                Ok(RawEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Result of an aggregation: per-device equivalences and their total
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedResult {
    breakdown: Vec<(String, f64)>,
    total: f64,
}

impl ComputedResult {
    /// Build a result from a breakdown, deriving the total
    pub fn from_breakdown(breakdown: Vec<(String, f64)>) -> Self {
        let total = sum(&breakdown);
        Self { breakdown, total }
    }

    /// Per-device equivalences in inventory order
    pub fn breakdown(&self) -> &[(String, f64)] {
        &self.breakdown
    }

    /// Equivalence of one device, if it contributed
    pub fn get(&self, name: &str) -> Option<f64> {
        self.breakdown
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Sum of the breakdown
    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.breakdown.is_empty()
    }

    /// Keep only the devices matching `keep`; the total follows the breakdown
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.breakdown.retain(|(name, _)| keep(name.as_str()));
        self.total = sum(&self.breakdown);
    }

    /// Reverse the breakdown order
    pub fn reverse(&mut self) {
        self.breakdown.reverse();
    }

    /// Sort the breakdown by value
    pub fn sort_by_value(&mut self, descending: bool) {
        self.breakdown.sort_by(|a, b| {
            let ordering = a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
}

impl Serialize for ComputedResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        struct Breakdown<'a>(&'a [(String, f64)]);

        impl Serialize for Breakdown<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (name, value) in self.0 {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }

        let len = if self.breakdown.is_empty() { 1 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        if !self.breakdown.is_empty() {
            map.serialize_entry("breakdown", &Breakdown(&self.breakdown))?;
        }
        map.serialize_entry("total", &self.total)?;
        map.end()
    }
}

fn sum(breakdown: &[(String, f64)]) -> f64 {
    breakdown.iter().fold(0.0, |acc, (_, value)| acc + value)
}

/// Aggregates inventories through a [`FomEngine`]
#[derive(Debug, Clone, Copy)]
pub struct ClusterAggregator<'a> {
    engine: FomEngine<'a>,
}

impl<'a> ClusterAggregator<'a> {
    pub fn new(engine: FomEngine<'a>) -> Self {
        Self { engine }
    }

    /// Figure-of-merit equivalence of every known device in the inventory
    pub fn aggregate(
        &self,
        inventory: &ClusterInventory,
        profile: &WeightProfile,
        normalize: bool,
    ) -> Result<ComputedResult> {
        self.aggregate_unit(inventory, Unit::Fom, Some(profile), normalize)
    }

    /// Equivalence of every known device in the inventory in `unit`
    pub fn aggregate_unit(
        &self,
        inventory: &ClusterInventory,
        unit: Unit,
        profile: Option<&WeightProfile>,
        normalize: bool,
    ) -> Result<ComputedResult> {
        let catalog = self.engine.catalog();
        let mut breakdown = Vec::with_capacity(inventory.len());

        for (name, count) in inventory.entries() {
            if !catalog.contains(name) {
                debug!("Skipping unknown device {} in inventory", name);
                continue;
            }
            let value = self.engine.evaluate(unit, name, profile, normalize)?;
            breakdown.push((name.clone(), count * value));
        }

        Ok(ComputedResult::from_breakdown(breakdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceCatalog, ProfileRegistry};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn aggregator() -> ClusterAggregator<'static> {
        ClusterAggregator::new(FomEngine::new(DeviceCatalog::builtin().unwrap()))
    }

    fn registry() -> ProfileRegistry {
        ProfileRegistry::builtin(DeviceCatalog::builtin().unwrap()).unwrap()
    }

    #[test]
    fn test_unknown_entries_are_dropped() {
        let registry = registry();
        let inventory =
            ClusterInventory::from_json_str(r#"{"A100-SXM4-40GB": 10, "UnknownGPU-X": 5}"#).unwrap();

        let result = aggregator()
            .aggregate(&inventory, registry.resolve("1.0").unwrap(), false)
            .unwrap();

        assert_eq!(result.breakdown(), &[("A100-SXM4-40GB".to_string(), 40.0)]);
        assert_eq!(result.total(), 40.0);
        assert_eq!(result.get("UnknownGPU-X"), None);
    }

    #[test]
    fn test_aggregation_law() {
        let registry = registry();
        let profile = registry.resolve("iguane").unwrap();
        let engine = FomEngine::new(DeviceCatalog::builtin().unwrap());
        let inventory = ClusterInventory::from_entries([
            ("T4", 12.0),
            ("H100-SXM5-80GB", 4.0),
            ("Decommissioned-K80", 30.0),
            ("V100-PCIe-32GB", 2.5),
        ])
        .unwrap();

        let result = aggregator().aggregate(&inventory, profile, false).unwrap();

        let mut expected = 0.0;
        for (name, count) in inventory.entries() {
            if let Ok(value) = engine.compute(name, profile, false) {
                expected += count * value;
            }
        }
        assert!((result.total() - expected).abs() < 1e-9);

        let names: Vec<_> = result.breakdown().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["T4", "H100-SXM5-80GB", "V100-PCIe-32GB"]);
    }

    #[test]
    fn test_only_unknown_devices() {
        let registry = registry();
        let inventory = ClusterInventory::from_json_str(r#"{"UnknownGPU-X": 5}"#).unwrap();
        let result = aggregator()
            .aggregate(&inventory, registry.resolve("1.0").unwrap(), false)
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(result.total(), 0.0);
        assert_eq!(serde_json::to_string(&result).unwrap(), r#"{"total":0.0}"#);
    }

    #[test]
    fn test_empty_inventory() {
        let registry = registry();
        let inventory = ClusterInventory::from_json_str("{}").unwrap();
        let result = aggregator()
            .aggregate(&inventory, registry.resolve("1.0").unwrap(), true)
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.total(), 0.0);
        assert!(result.total().is_sign_positive());
    }

    #[test]
    fn test_serialize_with_breakdown() {
        let result = ComputedResult::from_breakdown(vec![
            ("T4".to_string(), 2.0),
            ("A6000".to_string(), 1.5),
        ]);
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"breakdown":{"T4":2.0,"A6000":1.5},"total":3.5}"#
        );
    }

    #[test]
    fn test_unit_aggregation() {
        let inventory = ClusterInventory::from_entries([("T4", 8.0), ("L40S", 2.0), ("Nope", 1.0)]).unwrap();
        let result = aggregator()
            .aggregate_unit(&inventory, Unit::Count, None, false)
            .unwrap();
        assert_eq!(result.total(), 10.0);

        let result = aggregator()
            .aggregate_unit(&inventory, Unit::Tf32, None, false)
            .unwrap();
        assert_eq!(result.get("T4"), Some(8.0 * 8.1408));
    }

    #[test]
    fn test_fractional_counts() {
        let registry = registry();
        let inventory = ClusterInventory::from_json_str(r#"{"A100-SXM4-40GB": 0.5}"#).unwrap();
        let result = aggregator()
            .aggregate(&inventory, registry.resolve("ugr").unwrap(), false)
            .unwrap();
        assert_eq!(result.total(), 2.0);
    }

    #[test]
    fn test_retain_and_sort_keep_total_consistent() {
        let mut result = ComputedResult::from_breakdown(vec![
            ("T4".to_string(), 2.0),
            ("A6000".to_string(), 5.0),
            ("A100-SXM4-40GB".to_string(), 40.0),
        ]);

        result.sort_by_value(true);
        let names: Vec<_> = result.breakdown().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["A100-SXM4-40GB", "A6000", "T4"]);

        result.retain(|name| name.starts_with('A'));
        assert_eq!(result.total(), 45.0);

        result.retain(|_| false);
        assert!(result.is_empty());
        assert_eq!(result.total(), 0.0);
    }

    #[test]
    fn test_invalid_inventories() {
        assert!(matches!(
            ClusterInventory::from_json_str("[1, 2]"),
            Err(Error::InvalidInventory(_))
        ));
        assert!(matches!(
            ClusterInventory::from_json_str(r#"{"T4": "eight"}"#),
            Err(Error::InvalidInventory(_))
        ));
        assert!(matches!(
            ClusterInventory::from_json_str(r#"{"T4": -1}"#),
            Err(Error::InvalidInventory(_))
        ));
        assert!(matches!(
            ClusterInventory::from_json_str("{"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        assert!(matches!(
            ClusterInventory::from_entries([("T4", 1.0), ("T4", 2.0)]),
            Err(Error::InvalidInventory(msg)) if msg.contains("T4")
        ));
        assert!(matches!(
            ClusterInventory::from_json_str(r#"{"T4": 1, "L40S": 2, "T4": 3}"#),
            Err(Error::InvalidInventory(_))
        ));
    }

    #[test]
    fn test_load_from_file_keeps_inventory_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"T4": "eight"}}"#).unwrap();

        let err = ClusterInventory::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidInventory(_)));
        assert_eq!(err.category(), "inventory");
        assert!(err.is_input_error());
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_load_from_file_keeps_order() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"V100-SXM2-32GB": 4, "A100-PCIe-40GB": 2, "P100-PCIe-12GB": 1}}"#).unwrap();

        let inventory = ClusterInventory::load_from_file(file.path()).unwrap();
        let names: Vec<_> = inventory.entries().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["V100-SXM2-32GB", "A100-PCIe-40GB", "P100-PCIe-12GB"]);
    }
}
