//! Figure-of-merit engine
//!
//! Scores a device against a weight profile: every weighted field is taken as
//! a ratio to the reference device and the weighted ratios are summed.

use crate::{DeviceCatalog, Error, Result, Unit, WeightProfile};
use std::borrow::Cow;
use tracing::debug;

/// Computes unit equivalences over a device catalog
#[derive(Debug, Clone, Copy)]
pub struct FomEngine<'a> {
    catalog: &'a DeviceCatalog,
}

impl<'a> FomEngine<'a> {
    /// Create an engine reading from `catalog`
    pub fn new(catalog: &'a DeviceCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a DeviceCatalog {
        self.catalog
    }

    /// Weighted figure of merit of `device` relative to the profile's
    /// reference device
    pub fn compute(&self, device: &str, profile: &WeightProfile, normalize: bool) -> Result<f64> {
        let data = self.catalog.lookup(device)?.resolved();
        let reference = self.catalog.lookup(profile.reference())?.resolved();

        let profile = if normalize {
            Cow::Owned(profile.normalized()?)
        } else {
            Cow::Borrowed(profile)
        };

        let mut sum = 0.0;
        for &(field, weight) in profile.weights() {
            let denominator = reference.get(field);
            if denominator == 0.0 {
                return Err(Error::DegenerateReference {
                    reference: profile.reference().to_string(),
                    field,
                });
            }

            let contribution = weight * (data.get(field) / denominator);
            debug!("{}\t{:.4}\t{}", field, contribution, device);
            sum += contribution;
        }

        Ok(sum)
    }

    /// Evaluate a unit for `device`.
    ///
    /// Raw metric units read the fallback-resolved field and ignore `profile`
    /// and `normalize`. `Unit::Fom` requires a profile.
    pub fn evaluate(
        &self,
        unit: Unit,
        device: &str,
        profile: Option<&WeightProfile>,
        normalize: bool,
    ) -> Result<f64> {
        match unit {
            Unit::Count => {
                self.catalog.lookup(device)?;
                Ok(1.0)
            }
            Unit::Fp16 | Unit::Fp32 | Unit::Fp64 | Unit::Tf32 => {
                let metrics = self.catalog.lookup(device)?.resolved();
                let field = unit
                    .field()
                    .ok_or_else(|| Error::config(format!("unit {} has no field", unit)))?;
                Ok(metrics.get(field))
            }
            Unit::Fom => {
                let profile = profile.ok_or_else(|| {
                    Error::config("the fom unit requires a weight profile")
                })?;
                self.compute(device, profile, normalize)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Field, ProfileRegistry};

    const EPSILON: f64 = 1e-12;

    fn catalog() -> &'static DeviceCatalog {
        DeviceCatalog::builtin().unwrap()
    }

    fn registry() -> ProfileRegistry {
        ProfileRegistry::builtin(catalog()).unwrap()
    }

    #[test]
    fn test_reference_device_scores_exactly() {
        let registry = registry();
        let engine = FomEngine::new(catalog());
        let profile = registry.resolve("1.0").unwrap();

        assert_eq!(engine.compute("A100-SXM4-40GB", profile, false).unwrap(), 4.0);
        assert_eq!(engine.compute("A100-SXM4-40GB", profile, true).unwrap(), 1.0);
    }

    #[test]
    fn test_self_ratio_law() {
        let engine = FomEngine::new(catalog());
        for name in catalog().names() {
            let profile = WeightProfile::new(
                name,
                Field::ALL.iter().enumerate().map(|(i, &f)| (f, 0.1 * (i + 1) as f64)),
            )
            .unwrap();
            let score = engine.compute(name, &profile, false).unwrap();
            assert!((score - profile.weight_sum()).abs() < EPSILON, "{}", name);
        }
    }

    #[test]
    fn test_normalization_law() {
        let registry = registry();
        let engine = FomEngine::new(catalog());
        for (_, profile) in registry.profiles() {
            let sum = profile.weight_sum();
            for name in catalog().names() {
                let raw = engine.compute(name, profile, false).unwrap();
                let normalized = engine.compute(name, profile, true).unwrap();
                assert!((normalized - raw / sum).abs() < EPSILON, "{}", name);
            }
        }
    }

    #[test]
    fn test_fallback_law() {
        let engine = FomEngine::new(catalog());
        let reference = "A100-SXM4-80GB";
        let fp32 = WeightProfile::new(reference, [(Field::Fp32, 1.0)]).unwrap();
        let tf32 = WeightProfile::new(reference, [(Field::Tf32, 1.0)]).unwrap();
        let fp16 = WeightProfile::new(reference, [(Field::Fp16, 1.0)]).unwrap();

        let a100 = catalog().lookup(reference).unwrap();
        let tf32_scale = a100.fp32 / a100.tf32.unwrap();
        let fp16_scale = a100.fp32 / a100.fp16.unwrap();

        for (name, record) in catalog().records() {
            let by_fp32 = engine.compute(name, &fp32, false).unwrap();
            if record.tf32.is_none() {
                let by_tf32 = engine.compute(name, &tf32, false).unwrap();
                assert!((by_tf32 - by_fp32 * tf32_scale).abs() < EPSILON, "{}", name);
                assert_eq!(
                    engine.evaluate(Unit::Tf32, name, None, false).unwrap(),
                    engine.evaluate(Unit::Fp32, name, None, false).unwrap()
                );
            }
            if record.fp16.is_none() {
                let by_fp16 = engine.compute(name, &fp16, false).unwrap();
                assert!((by_fp16 - by_fp32 * fp16_scale).abs() < EPSILON, "{}", name);
            }
        }
    }

    #[test]
    fn test_fallback_applies_to_reference() {
        // V100 has no tf32 path, so as a reference its tf32 is its fp32
        let engine = FomEngine::new(catalog());
        let profile = WeightProfile::new("V100-SXM2-16GB", [(Field::Tf32, 1.0)]).unwrap();
        let score = engine.compute("V100-SXM2-16GB", &profile, false).unwrap();
        assert_eq!(score, 1.0);

        let a100 = engine.compute("A100-SXM4-40GB", &profile, false).unwrap();
        assert!((a100 - 155.93472 / 15.6672).abs() < EPSILON);

        let fp32 = WeightProfile::new("V100-SXM2-16GB", [(Field::Fp32, 1.0)]).unwrap();
        for (name, record) in catalog().records() {
            if record.tf32.is_none() {
                assert_eq!(
                    engine.compute(name, &profile, false).unwrap(),
                    engine.compute(name, &fp32, false).unwrap(),
                    "{}",
                    name
                );
            }
        }
    }

    /// Profile 1.0 scores of every built-in device
    const UGR_1_0: [(&str, f64); 19] = [
        ("P100-PCIe-12GB", 1.1025059101654848),
        ("P100-PCIe-16GB", 1.182505910165485),
        ("P100-SXM2-16GB", 1.2996690307328604),
        ("V100-PCIe-16GB", 2.047344365642238),
        ("V100-PCIe-32GB", 2.367344365642238),
        ("V100-SXM2-16GB", 2.2490780141843976),
        ("V100-SXM2-32GB", 2.5690780141843974),
        ("V100S-PCIe-32GB", 2.6535539795114267),
        ("T4", 1.3223640661938536),
        ("RTX8000", 2.9685106382978725),
        ("A100-PCIe-40GB", 4.0),
        ("A100-PCIe-80GB", 4.800000000000001),
        ("A100-SXM4-40GB", 4.0),
        ("A100-SXM4-80GB", 4.800000000000001),
        ("A6000", 4.931631205673759),
        ("L40S", 10.35952718676123),
        ("H100-PCIe-80GB", 9.685106382978724),
        ("H100-SXM5-80GB", 12.168321513002363),
        ("H100-NVL-94GB", 11.091546985815604),
    ];

    #[test]
    fn test_ugr_table() {
        let registry = registry();
        let engine = FomEngine::new(catalog());
        let profile = registry.resolve("1.0").unwrap();

        let names: Vec<_> = UGR_1_0.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, catalog().names().collect::<Vec<_>>());

        for (name, expected) in UGR_1_0 {
            let raw = engine.compute(name, profile, false).unwrap();
            assert!((raw - expected).abs() < EPSILON, "{}: {} != {}", name, raw, expected);

            let normalized = engine.compute(name, profile, true).unwrap();
            assert!((normalized - expected / 4.0).abs() < EPSILON, "{}", name);
        }
    }

    #[test]
    fn test_ugr_values() {
        let registry = registry();
        let engine = FomEngine::new(catalog());
        let profile = registry.resolve("ugr").unwrap();

        let v100 = engine.compute("V100-SXM2-16GB", profile, false).unwrap();
        let expected = 1.6 * (125.3376 / 311.86944) + 1.6 * (15.6672 / 19.49184) + 0.8 * (16.0 / 40.0);
        assert!((v100 - expected).abs() < EPSILON);

        let a100_80 = engine.compute("A100-SXM4-80GB", profile, false).unwrap();
        assert!((a100_80 - 4.8).abs() < EPSILON);
    }

    #[test]
    fn test_unknown_devices() {
        let registry = registry();
        let engine = FomEngine::new(catalog());
        let profile = registry.resolve("1.0").unwrap();

        let err = engine.compute("UnknownGPU-X", profile, false).unwrap_err();
        assert!(matches!(err, Error::UnknownDevice(name) if name == "UnknownGPU-X"));

        let orphan = WeightProfile::new("Ghost-1", [(Field::Fp32, 1.0)]).unwrap();
        let err = engine.compute("T4", &orphan, false).unwrap_err();
        assert!(matches!(err, Error::UnknownDevice(name) if name == "Ghost-1"));
    }

    #[test]
    fn test_degenerate_weights() {
        let engine = FomEngine::new(catalog());
        let profile = WeightProfile::new("T4", [(Field::Fp32, 1.0), (Field::Fp64, -1.0)]).unwrap();
        assert!(engine.compute("T4", &profile, false).is_ok());
        assert!(matches!(
            engine.compute("T4", &profile, true),
            Err(Error::DegenerateWeights(_))
        ));
    }

    #[test]
    fn test_degenerate_reference() {
        let catalog = DeviceCatalog::from_yaml_str(
            "- name: Z\n  fp32: 1.0\n  fp64: 0\n  memgb: 1\n  membw: 1\n  tdp: 1\n\
             - name: Y\n  fp32: 2.0\n  fp64: 1.0\n  memgb: 1\n  membw: 1\n  tdp: 1\n",
        )
        .unwrap();
        let engine = FomEngine::new(&catalog);
        let profile = WeightProfile::new("Z", [(Field::Fp32, 1.0), (Field::Fp64, 1.0)]).unwrap();

        let err = engine.compute("Y", &profile, false).unwrap_err();
        assert!(matches!(
            err,
            Error::DegenerateReference { ref reference, field: Field::Fp64 } if reference == "Z"
        ));
    }

    #[test]
    fn test_raw_units() {
        let engine = FomEngine::new(catalog());
        assert_eq!(engine.evaluate(Unit::Count, "T4", None, false).unwrap(), 1.0);
        assert_eq!(engine.evaluate(Unit::Fp64, "T4", None, true).unwrap(), 0.2544);
        assert_eq!(engine.evaluate(Unit::Fp16, "T4", None, false).unwrap(), 65.1264);
        assert_eq!(engine.evaluate(Unit::Tf32, "T4", None, false).unwrap(), 8.1408);
        assert_eq!(engine.evaluate(Unit::Tf32, "L40S", None, false).unwrap(), 183.21408);
        assert!(matches!(
            engine.evaluate(Unit::Count, "UnknownGPU-X", None, false),
            Err(Error::UnknownDevice(_))
        ));
    }

    #[test]
    fn test_fom_unit_requires_profile() {
        let engine = FomEngine::new(catalog());
        assert!(matches!(
            engine.evaluate(Unit::Fom, "T4", None, false),
            Err(Error::InvalidConfiguration(_))
        ));

        let registry = registry();
        let profile = registry.resolve("1.0").unwrap();
        assert_eq!(
            engine.evaluate(Unit::Fom, "A100-SXM4-40GB", Some(profile), false).unwrap(),
            4.0
        );
    }
}
