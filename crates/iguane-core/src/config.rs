//! Configuration management for iguane
//!
//! Settings are layered with the following precedence:
//! 1. Environment variables (`IGUANE_*`, nested keys separated by `__`,
//!    e.g. `IGUANE_OUTPUT__DELIMITER`)
//! 2. Configuration file
//! 3. Defaults
//!
//! Profile versions look like numbers; quote them in files
//! (`default_profile: "1.0"`) or YAML reads them as floats.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output formats understood by the command-line front end
pub const OUTPUT_FORMATS: &[&str] = &["table", "json", "yaml", "text", "parsable"];

/// Main settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Device catalog file replacing the built-in catalog
    pub catalog: Option<PathBuf>,

    /// Weight profile version or alias used when none is requested
    pub default_profile: Option<String>,

    /// Normalize profile weights to sum to one by default
    pub normalize: bool,

    /// Output configuration
    pub output: OutputSettings,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Default output format
    pub format: String,

    /// Field separator for parsable output
    pub delimiter: String,

    /// Decimal places shown in human-readable output
    pub precision: usize,
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment.
    ///
    /// Without an explicit path, `./iguane.{yaml,json}` is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path.to_path_buf())),
            None => builder.add_source(config::File::with_name("iguane").required(false)),
        };

        builder = builder.add_source(
            config::Environment::with_prefix("IGUANE")
                .prefix_separator("_")
                .separator("__"),
        );

        let parsed: Self = builder.build()?.try_deserialize()?;
        parsed.validate()?;

        Ok(parsed)
    }

    /// Load settings from a specific file, ignoring the environment
    pub fn load_from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::from(path.into()));

        let parsed: Self = builder.build()?.try_deserialize()?;
        parsed.validate()?;

        Ok(parsed)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if let Some(profile) = &self.default_profile {
            if profile.trim().is_empty() {
                return Err(Error::config("Default profile cannot be empty"));
            }
        }

        self.output.validate()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog: None,
            default_profile: None,
            normalize: false,
            output: OutputSettings::default(),
        }
    }
}

impl OutputSettings {
    pub fn validate(&self) -> Result<()> {
        if self.delimiter.is_empty() {
            return Err(Error::config("Delimiter cannot be empty"));
        }

        if !OUTPUT_FORMATS.contains(&self.format.as_str()) {
            return Err(Error::config(format!(
                "Unknown output format \"{}\", expected one of {}",
                self.format,
                OUTPUT_FORMATS.join(", ")
            )));
        }

        if self.precision > 17 {
            return Err(Error::config("Precision must be at most 17 decimal places"));
        }

        Ok(())
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            delimiter: ",".to_string(),
            precision: 2,
        }
    }
}
