//! Core type definitions for iguane

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric hardware metric of a device record that a weight may refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    /// Half-precision throughput (falls back to fp32)
    Fp16,
    /// Single-precision throughput
    Fp32,
    /// Double-precision throughput
    Fp64,
    /// TensorFloat-32 throughput (falls back to fp32)
    Tf32,
    /// Memory capacity in GB
    Memgb,
    /// Memory bandwidth in GB/s
    Membw,
    /// Thermal design power in W
    Tdp,
}

impl Field {
    /// All fields, in catalog column order
    pub const ALL: [Field; 7] = [
        Field::Fp16,
        Field::Fp32,
        Field::Fp64,
        Field::Tf32,
        Field::Memgb,
        Field::Membw,
        Field::Tdp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Fp16 => "fp16",
            Field::Fp32 => "fp32",
            Field::Fp64 => "fp64",
            Field::Tf32 => "tf32",
            Field::Memgb => "memgb",
            Field::Membw => "membw",
            Field::Tdp => "tdp",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Field {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| crate::Error::invalid_weights(format!("unknown field \"{}\"", s)))
    }
}

/// A unit of equivalence that can be computed for every device.
///
/// This is the dispatch table of the engine: the raw metric units read a
/// single (fallback-resolved) field, `Fom` evaluates a weight profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// One per device
    Count,
    Fp16,
    Fp32,
    Fp64,
    Tf32,
    /// Weighted figure of merit relative to a reference device
    Fom,
}

impl Unit {
    /// All units, in listing order
    pub const ALL: [Unit; 6] = [
        Unit::Count,
        Unit::Fp16,
        Unit::Fp32,
        Unit::Fp64,
        Unit::Tf32,
        Unit::Fom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Count => "count",
            Unit::Fp16 => "fp16",
            Unit::Fp32 => "fp32",
            Unit::Fp64 => "fp64",
            Unit::Tf32 => "tf32",
            Unit::Fom => "fom",
        }
    }

    /// The single field a raw metric unit reads, if any
    pub fn field(&self) -> Option<Field> {
        match self {
            Unit::Fp16 => Some(Field::Fp16),
            Unit::Fp32 => Some(Field::Fp32),
            Unit::Fp64 => Some(Field::Fp64),
            Unit::Tf32 => Some(Field::Tf32),
            Unit::Count | Unit::Fom => None,
        }
    }

    /// Whether this unit depends on a weight profile
    pub fn uses_profile(&self) -> bool {
        matches!(self, Unit::Fom)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "count" => Ok(Unit::Count),
            "fp16" => Ok(Unit::Fp16),
            "fp32" => Ok(Unit::Fp32),
            "fp64" => Ok(Unit::Fp64),
            "tf32" => Ok(Unit::Tf32),
            "fom" => Ok(Unit::Fom),
            _ => Err(format!("Unknown unit: {}", s)),
        }
    }
}
