//! Error handling for iguane
//!
//! Provides a unified error type and result type for the catalog, the profile
//! registry and the figure-of-merit engine.

use crate::types::Field;
use std::path::Path;

/// Result type alias for iguane operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for iguane
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A requested or referenced device is absent from the catalog
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    /// A requested weight profile version or alias does not exist
    #[error("Unknown weight profile: {0}")]
    UnknownProfile(String),

    /// A weights document names an unknown field or cannot be parsed
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    /// A weights document omits or misreferences its reference device
    #[error("Missing reference device: {0}")]
    MissingReference(String),

    /// Normalization was requested but the weights sum to zero
    #[error("Weights of {0} sum to zero and cannot be normalized")]
    DegenerateWeights(String),

    /// The reference device has a zero value for a weighted field
    #[error("Reference device {reference} has a zero {field} value")]
    DegenerateReference { reference: String, field: Field },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    /// The device catalog source is malformed
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// The cluster inventory source is malformed
    #[error("Invalid inventory: {0}")]
    InvalidInventory(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration parsing errors
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create an unknown device error
    pub fn unknown_device(name: impl Into<String>) -> Self {
        Self::UnknownDevice(name.into())
    }

    /// Create an unknown profile error
    pub fn unknown_profile(name: impl Into<String>) -> Self {
        Self::UnknownProfile(name.into())
    }

    /// Create an invalid weights error
    pub fn invalid_weights(msg: impl Into<String>) -> Self {
        Self::InvalidWeights(msg.into())
    }

    /// Create a missing reference error
    pub fn missing_reference(msg: impl Into<String>) -> Self {
        Self::MissingReference(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create an invalid catalog error
    pub fn invalid_catalog(msg: impl Into<String>) -> Self {
        Self::InvalidCatalog(msg.into())
    }

    /// Create an invalid inventory error
    pub fn invalid_inventory(msg: impl Into<String>) -> Self {
        Self::InvalidInventory(msg.into())
    }

    /// Name the file a loader error came from, keeping the variant
    pub fn in_file(self, path: &Path) -> Self {
        match self {
            Error::InvalidCatalog(msg) => {
                Error::InvalidCatalog(format!("{}: {}", path.display(), msg))
            }
            Error::InvalidInventory(msg) => {
                Error::InvalidInventory(format!("{}: {}", path.display(), msg))
            }
            other => other,
        }
    }

    /// Check if this error was caused by caller-supplied input rather than
    /// by the reference data itself
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownDevice(_)
                | Error::UnknownProfile(_)
                | Error::InvalidWeights(_)
                | Error::MissingReference(_)
                | Error::DegenerateWeights(_)
                | Error::InvalidConfiguration(_)
                | Error::InvalidInventory(_)
        )
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::UnknownDevice(_) => "unknown_device",
            Error::UnknownProfile(_) => "unknown_profile",
            Error::InvalidWeights(_) => "invalid_weights",
            Error::MissingReference(_) => "missing_reference",
            Error::DegenerateWeights(_) => "degenerate_weights",
            Error::DegenerateReference { .. } => "degenerate_reference",
            Error::InvalidConfiguration(_) => "configuration",
            Error::InvalidCatalog(_) => "catalog",
            Error::InvalidInventory(_) => "inventory",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Config(_) => "config",
            Error::Other(_) => "other",
        }
    }
}

/// Extension trait for adding context to Results
pub trait ErrorContext<T> {
    /// Add context to an error
    fn with_context(self, context: impl Into<String>) -> Result<T>;

    /// Add context to an error using a closure
    fn with_context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn with_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let original_error = e.into();
            Error::Other(anyhow::anyhow!("{}: {}", context.into(), original_error))
        })
    }

    fn with_context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let original_error = e.into();
            Error::Other(anyhow::anyhow!("{}: {}", f(), original_error))
        })
    }
}
