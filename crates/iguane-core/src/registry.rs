//! Versioned weight profile registry
//!
//! Profiles are registered under a version identifier at startup. Friendly
//! names (such as the legacy unit names) are aliases onto those versions. The
//! default profile is the greatest purely numeric version.

use crate::{DeviceCatalog, Error, Field, Result, WeightProfile};
use std::cmp::Ordering;
use tracing::debug;

/// Registry of named, versioned weight profiles
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    versions: Vec<(String, WeightProfile)>,
    aliases: Vec<(String, String)>,
}

impl ProfileRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in profiles, validated against `catalog`.
    ///
    /// `1.0` is the RGU/UGR allocation unit. `2.0-0` and `iguane` weight
    /// memory bandwidth and TF32 against an 80GB A100.
    pub fn builtin(catalog: &DeviceCatalog) -> Result<Self> {
        let mut registry = Self::new();

        registry.register(
            "1.0",
            WeightProfile::new(
                "A100-SXM4-40GB",
                [(Field::Fp16, 1.6), (Field::Fp32, 1.6), (Field::Memgb, 0.8)],
            )?,
        );
        registry.register(
            "2.0-0",
            WeightProfile::new(
                "A100-SXM4-80GB",
                [
                    (Field::Fp16, 0.2),
                    (Field::Fp32, 0.1),
                    (Field::Tf32, 0.2),
                    (Field::Memgb, 0.25),
                    (Field::Membw, 0.25),
                ],
            )?,
        );
        registry.register(
            "iguane",
            WeightProfile::new(
                "A100-SXM4-80GB",
                [
                    (Field::Fp16, 0.2),
                    (Field::Fp32, 0.2),
                    (Field::Tf32, 0.2),
                    (Field::Memgb, 0.2),
                    (Field::Membw, 0.2),
                ],
            )?,
        );

        registry.alias("ugr", "1.0")?;
        registry.alias("rgu", "1.0")?;
        registry.alias("iguana", "iguane")?;

        for (version, profile) in &registry.versions {
            profile.validate_against(catalog).map_err(|e| {
                Error::config(format!("built-in profile {}: {}", version, e))
            })?;
        }

        Ok(registry)
    }

    /// Register a profile under a version, replacing any previous one
    pub fn register(&mut self, version: impl Into<String>, profile: WeightProfile) {
        let version = version.into();
        debug!("Registering weight profile {}", version);
        match self.versions.iter_mut().find(|(v, _)| *v == version) {
            Some(slot) => slot.1 = profile,
            None => self.versions.push((version, profile)),
        }
    }

    /// Make `alias` resolve to an already registered `version`
    pub fn alias(&mut self, alias: impl Into<String>, version: &str) -> Result<()> {
        if !self.versions.iter().any(|(v, _)| v == version) {
            return Err(Error::unknown_profile(version));
        }
        let alias = alias.into();
        match self.aliases.iter_mut().find(|(a, _)| *a == alias) {
            Some(slot) => slot.1 = version.to_string(),
            None => self.aliases.push((alias, version.to_string())),
        }
        Ok(())
    }

    /// The version identifier a version or alias resolves to.
    ///
    /// Aliases take precedence over versions of the same name.
    pub fn canonical_version<'a>(&'a self, name: &str) -> Result<&'a str> {
        if let Some((_, version)) = self.aliases.iter().find(|(a, _)| a == name) {
            return Ok(version.as_str());
        }
        self.versions
            .iter()
            .find(|(v, _)| v == name)
            .map(|(v, _)| v.as_str())
            .ok_or_else(|| Error::unknown_profile(name))
    }

    /// Resolve a version or alias to its profile
    pub fn resolve(&self, name: &str) -> Result<&WeightProfile> {
        let version = self.canonical_version(name)?;
        self.versions
            .iter()
            .find(|(v, _)| v == version)
            .map(|(_, p)| p)
            .ok_or_else(|| Error::unknown_profile(name))
    }

    /// The greatest purely numeric version and its profile
    pub fn latest(&self) -> Result<(&str, &WeightProfile)> {
        let mut best: Option<(Vec<u64>, &str, &WeightProfile)> = None;
        for (version, profile) in &self.versions {
            let Some(parts) = numeric_version(version) else {
                continue;
            };
            let newer = match &best {
                Some((current, _, _)) => compare_versions(&parts, current) != Ordering::Less,
                None => true,
            };
            if newer {
                best = Some((parts, version.as_str(), profile));
            }
        }

        best.map(|(_, version, profile)| (version, profile))
            .ok_or_else(|| Error::unknown_profile("no numeric profile version registered"))
    }

    /// Registered version identifiers in registration order
    pub fn versions(&self) -> impl Iterator<Item = &str> + '_ {
        self.versions.iter().map(|(v, _)| v.as_str())
    }

    /// (version, profile) pairs in registration order
    pub fn profiles(&self) -> impl Iterator<Item = (&str, &WeightProfile)> + '_ {
        self.versions.iter().map(|(v, p)| (v.as_str(), p))
    }

    /// (alias, version) pairs in registration order
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.aliases.iter().map(|(a, v)| (a.as_str(), v.as_str()))
    }
}

/// Split a purely numeric dotted version into its components
fn numeric_version(version: &str) -> Option<Vec<u64>> {
    version
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                part.parse().ok()
            }
        })
        .collect()
}

/// Component-wise comparison, missing components count as zero
fn compare_versions(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
