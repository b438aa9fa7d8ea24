//! # iguane-core
//!
//! Figure-of-merit engine for compute accelerators.
//!
//! A figure of merit (FoM) expresses a device's capability relative to a
//! reference device as a weighted sum of metric ratios. It is used to convert
//! heterogeneous accelerator fleets into a common accounting unit.
//!
//! This crate provides:
//!
//! - The device catalog (hardware metrics per device name)
//! - The versioned weight profile registry
//! - The FoM engine with precision fallback and weight normalization
//! - Cluster aggregation of device inventories
//! - Layered configuration and the unified error type

pub mod catalog;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod profile;
pub mod registry;
pub mod types;

// Re-export commonly used types at the crate root
pub use catalog::{DeviceCatalog, DeviceRecord, ResolvedMetrics};
pub use cluster::{ClusterAggregator, ClusterInventory, ComputedResult};
pub use config::{OutputSettings, Settings};
pub use engine::FomEngine;
pub use error::{Error, Result};
pub use profile::WeightProfile;
pub use registry::ProfileRegistry;
pub use types::{Field, Unit};

use std::borrow::Cow;
use std::sync::OnceLock;

/// How a caller picks the weight profile of a computation
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileSelector {
    /// The greatest numeric version in the registry
    Latest,
    /// A registered version or alias
    Named(String),
    /// An ad-hoc, already validated profile
    Custom(WeightProfile),
}

impl ProfileSelector {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Parse and validate a custom weights document
    pub fn parse_custom(text: &str, catalog: &DeviceCatalog) -> Result<Self> {
        WeightProfile::parse_custom(text, catalog).map(Self::Custom)
    }
}

impl Default for ProfileSelector {
    fn default() -> Self {
        Self::Latest
    }
}

/// A device catalog and a profile registry, with the computation entrypoints
#[derive(Debug, Clone)]
pub struct Iguane {
    catalog: DeviceCatalog,
    registry: ProfileRegistry,
}

impl Iguane {
    /// Wrap a catalog and a registry; every registered profile must reference
    /// a device of the catalog
    pub fn new(catalog: DeviceCatalog, registry: ProfileRegistry) -> Result<Self> {
        for (version, profile) in registry.profiles() {
            profile
                .validate_against(&catalog)
                .map_err(|e| Error::config(format!("profile {}: {}", version, e)))?;
        }
        Ok(Self { catalog, registry })
    }

    /// Use `catalog` with the built-in profiles
    pub fn with_catalog(catalog: DeviceCatalog) -> Result<Self> {
        let registry = ProfileRegistry::builtin(&catalog)?;
        Ok(Self { catalog, registry })
    }

    /// The built-in catalog and profiles, initialized once per process
    pub fn builtin() -> Result<&'static Iguane> {
        static BUILTIN: OnceLock<std::result::Result<Iguane, String>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| {
                DeviceCatalog::builtin()
                    .and_then(|catalog| Self::with_catalog(catalog.clone()))
                    .map_err(|e| e.to_string())
            })
            .as_ref()
            .map_err(|msg| Error::config(msg.clone()))
    }

    pub fn catalog(&self) -> &DeviceCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn engine(&self) -> FomEngine<'_> {
        FomEngine::new(&self.catalog)
    }

    pub fn aggregator(&self) -> ClusterAggregator<'_> {
        ClusterAggregator::new(self.engine())
    }

    /// Device names in catalog order
    pub fn list_devices(&self) -> Vec<&str> {
        self.catalog.names().collect()
    }

    /// Profile versions in registration order
    pub fn list_profile_versions(&self) -> Vec<&str> {
        self.registry.versions().collect()
    }

    /// (alias, version) pairs in registration order
    pub fn list_profile_aliases(&self) -> Vec<(&str, &str)> {
        self.registry.aliases().collect()
    }

    /// Units that can be computed
    pub fn list_units(&self) -> &'static [Unit] {
        &Unit::ALL
    }

    /// The full device table
    pub fn dump_catalog(&self) -> &DeviceCatalog {
        &self.catalog
    }

    /// Parse a custom weights document against this catalog
    pub fn custom_profile(&self, text: &str) -> Result<ProfileSelector> {
        ProfileSelector::parse_custom(text, &self.catalog)
    }

    /// Resolve a selector to a weight profile
    pub fn resolve_profile<'a>(&'a self, selector: &'a ProfileSelector) -> Result<Cow<'a, WeightProfile>> {
        match selector {
            ProfileSelector::Latest => Ok(Cow::Borrowed(self.registry.latest()?.1)),
            ProfileSelector::Named(name) => Ok(Cow::Borrowed(self.registry.resolve(name)?)),
            ProfileSelector::Custom(profile) => {
                profile.validate_against(&self.catalog)?;
                Ok(Cow::Borrowed(profile))
            }
        }
    }

    /// Figure of merit of one device
    pub fn compute_one(&self, device: &str, selector: &ProfileSelector, normalize: bool) -> Result<f64> {
        let profile = self.resolve_profile(selector)?;
        self.engine().compute(device, &profile, normalize)
    }

    /// Figure of merit of every catalog device, in catalog order
    pub fn compute_all(&self, selector: &ProfileSelector, normalize: bool) -> Result<Vec<(String, f64)>> {
        self.evaluate_all(Unit::Fom, selector, normalize)
    }

    /// Figure-of-merit equivalence of an inventory
    pub fn aggregate(
        &self,
        inventory: &ClusterInventory,
        selector: &ProfileSelector,
        normalize: bool,
    ) -> Result<ComputedResult> {
        self.aggregate_unit(inventory, Unit::Fom, selector, normalize)
    }

    /// Value of `unit` for one device
    pub fn evaluate_one(
        &self,
        unit: Unit,
        device: &str,
        selector: &ProfileSelector,
        normalize: bool,
    ) -> Result<f64> {
        let profile = self.profile_for(unit, selector)?;
        self.engine().evaluate(unit, device, profile.as_deref(), normalize)
    }

    /// Value of `unit` for every catalog device, in catalog order
    pub fn evaluate_all(
        &self,
        unit: Unit,
        selector: &ProfileSelector,
        normalize: bool,
    ) -> Result<Vec<(String, f64)>> {
        let profile = self.profile_for(unit, selector)?;
        let engine = self.engine();
        self.catalog
            .names()
            .map(|name| {
                engine
                    .evaluate(unit, name, profile.as_deref(), normalize)
                    .map(|value| (name.to_string(), value))
            })
            .collect()
    }

    /// Equivalence of an inventory in `unit`
    pub fn aggregate_unit(
        &self,
        inventory: &ClusterInventory,
        unit: Unit,
        selector: &ProfileSelector,
        normalize: bool,
    ) -> Result<ComputedResult> {
        let profile = self.profile_for(unit, selector)?;
        self.aggregator()
            .aggregate_unit(inventory, unit, profile.as_deref(), normalize)
    }

    /// Profiles are only resolved for units that use them, so raw metric
    /// units never fail on a bad selector
    fn profile_for<'a>(
        &'a self,
        unit: Unit,
        selector: &'a ProfileSelector,
    ) -> Result<Option<Cow<'a, WeightProfile>>> {
        if unit.uses_profile() {
            self.resolve_profile(selector).map(Some)
        } else {
            Ok(None)
        }
    }
}
