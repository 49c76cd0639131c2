#![forbid(unsafe_code)]

//! Session configuration.
//!
//! Groups the tunables of an [`EditorSession`](crate::EditorSession) into a
//! single [`SessionConfig`] that can be loaded from TOML or JSON when the
//! `config-files` feature is enabled.
//!
//! # Loading
//!
//! ```toml
//! # stackset.toml
//! [history]
//! max_depth = 50
//! max_bytes = 1048576
//!
//! [deferred]
//! max_tasks_per_cycle = 64
//! ```
//!
//! ```rust,ignore
//! let config = SessionConfig::from_toml_file("stackset.toml")?;
//! let config = SessionConfig::from_json_str(json)?;
//! ```
//!
//! # Defaults
//!
//! Missing tables and keys fall back to [`SessionConfig::default()`]: 100
//! undo groups, a 10 MiB history budget and 256 deferred tasks per cycle.

#[cfg(feature = "config-files")]
use std::path::Path;

use thiserror::Error;

use crate::deferred::DeferredConfig;
use crate::undo::HistoryConfig;

/// Top-level configuration for an editor session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config-files", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config-files", serde(default))]
pub struct SessionConfig {
    /// Undo history limits.
    pub history: HistoryConfig,
    /// Deferred queue limits.
    pub deferred: DeferredConfig,
}

impl SessionConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config-files")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config-files")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config-files")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config-files")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.history.max_depth == 0 {
            errors.push("history.max_depth must be > 0".into());
        }
        if self.deferred.max_tasks_per_cycle == 0 {
            errors.push("deferred.max_tasks_per_cycle must be > 0".into());
        }
        errors
    }

    /// Return `self` if [`validate`](Self::validate) finds nothing.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Errors from loading a [`SessionConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    #[cfg(feature = "config-files")]
    #[error("TOML parse error: {0}")]
    Toml(#[source] toml::de::Error),

    #[cfg(feature = "config-files")]
    #[error("JSON parse error: {0}")]
    Json(#[source] serde_json::Error),

    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}
