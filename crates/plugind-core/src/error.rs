// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by every plugind crate.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use strum::{Display, EnumString};
use thiserror::Error;

/// Machine-readable identifier of a violated field constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConstraintId {
    Required,
    Range,
    Regex,
    Length,
    Type,
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub constraint_id: ConstraintId,
    /// The constraint that was violated (a pattern, a bound object, ...).
    pub constraint: serde_json::Value,
    pub message: String,
}

impl FieldError {
    pub fn required() -> Self {
        Self {
            constraint_id: ConstraintId::Required,
            constraint: serde_json::Value::Bool(true),
            message: "Missing data for required field.".to_string(),
        }
    }

    pub fn regex(pattern: &str) -> Self {
        Self {
            constraint_id: ConstraintId::Regex,
            constraint: serde_json::Value::String(pattern.to_string()),
            message: "String does not match expected pattern.".to_string(),
        }
    }

    pub fn length_min(min: usize) -> Self {
        Self {
            constraint_id: ConstraintId::Length,
            constraint: serde_json::json!({ "min": min }),
            message: format!("Shorter than minimum length {min}."),
        }
    }

    pub fn range(min: Option<serde_json::Value>, max: Option<serde_json::Value>, message: String) -> Self {
        let mut constraint = serde_json::Map::new();
        if let Some(min) = min {
            constraint.insert("min".to_string(), min);
        }
        if let Some(max) = max {
            constraint.insert("max".to_string(), max);
        }
        Self {
            constraint_id: ConstraintId::Range,
            constraint: serde_json::Value::Object(constraint),
            message,
        }
    }

    pub fn invalid_type(expected: &str) -> Self {
        Self {
            constraint_id: ConstraintId::Type,
            constraint: serde_json::Value::String(expected.to_string()),
            message: format!("Not a valid {expected}."),
        }
    }
}

/// Field-level validation failures keyed by field name.
///
/// Nested fields use dotted paths (`depends.0.name`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error for `field`. The first error recorded for a field wins.
    pub fn add(&mut self, field: impl Into<String>, error: FieldError) {
        self.0.entry(field.into()).or_insert(error);
    }

    pub fn get(&self, field: &str) -> Option<&FieldError> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldError)> {
        self.0.iter()
    }

    /// Converts into `Ok(())` when empty, otherwise into the given error.
    pub fn into_result(self, wrap: impl FnOnce(FieldErrors) -> PlugindError) -> Result<(), PlugindError> {
        if self.is_empty() { Ok(()) } else { Err(wrap(self)) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, error) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{field}: {} ({})", error.message, error.constraint_id)?;
        }
        Ok(())
    }
}

/// The primary error type used across the plugind workspace.
#[derive(Debug, Error)]
pub enum PlugindError {
    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem failure inside a scratch directory.
    #[error("i/o error: {message}")]
    Io {
        message: String,
        source: std::io::Error,
    },

    /// An external command could not be spawned or exited non-zero.
    #[error("command `{program}` failed (exit code {code:?}): {stderr}")]
    Command {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The plugin source could not be obtained.
    #[error("fetch error: {message}")]
    Fetch {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The plugin metadata file is missing or unparsable.
    #[error("failed to read plugin metadata {}: {message}", path.display())]
    MetadataRead { path: PathBuf, message: String },

    /// Plugin metadata violates the metadata schema or platform bounds.
    #[error("validation error: {errors}")]
    Validation { errors: FieldErrors },

    /// An install request is malformed.
    #[error("invalid data: {errors}")]
    InvalidRequest { errors: FieldErrors },

    /// The requested version is already satisfied by the installed plugin.
    #[error("plugin {namespace}/{name} is already installed")]
    AlreadyInstalled { namespace: String, name: String },

    /// The plugin is not installed.
    #[error("plugin not found {namespace}/{name}")]
    PluginNotFound { namespace: String, name: String },

    /// A dependency could not be installed.
    #[error("dependency error: {message}")]
    Dependency {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The privileged worker reported failure for an operation.
    #[error("privileged operation `{operation}` failed")]
    Privileged { operation: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The market catalog could not be queried.
    #[error("catalog error: {message}")]
    Catalog {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The platform version could not be determined.
    #[error("platform info error: {message}")]
    Platform {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The progress bus rejected an event.
    #[error("bus error: {0}")]
    Bus(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PlugindError {
    /// Wraps an I/O error with a description of what was being attempted.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Public error identifier for the synchronous (request-time) failures.
    pub fn error_id(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Io { .. } => "io_error",
            Self::Command { .. } => "command_error",
            Self::Fetch { .. } => "fetch_error",
            Self::MetadataRead { .. } => "metadata_error",
            Self::Validation { .. } => "validation_error",
            Self::InvalidRequest { .. } => "invalid_data",
            Self::AlreadyInstalled { .. } => "plugin_already_installed",
            Self::PluginNotFound { .. } => "plugin_not_found",
            Self::Dependency { .. } => "dependency_error",
            Self::Privileged { .. } => "privileged_error",
            Self::Timeout { .. } => "timeout",
            Self::Catalog { .. } => "catalog_error",
            Self::Platform { .. } => "platform_error",
            Self::Bus(_) => "bus_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_keep_first_error_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("name", FieldError::required());
        errors.add("name", FieldError::regex("^[a-z]+$"));

        assert_eq!(errors.iter().count(), 1);
        assert_eq!(errors.get("name").unwrap().constraint_id, ConstraintId::Required);
    }

    #[test]
    fn field_errors_serialize_as_flat_map() {
        let mut errors = FieldErrors::new();
        errors.add("name", FieldError::regex("^[a-z0-9-]+$"));

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["name"]["constraint_id"], "regex");
        assert_eq!(json["name"]["constraint"], "^[a-z0-9-]+$");
    }

    #[test]
    fn range_constraint_only_lists_given_bounds() {
        let err = FieldError::range(None, Some(serde_json::json!(2)), "too big".into());
        assert_eq!(err.constraint, serde_json::json!({ "max": 2 }));
    }

    #[test]
    fn into_result_wraps_non_empty_errors() {
        assert!(FieldErrors::new().into_result(|errors| PlugindError::Validation { errors }).is_ok());

        let mut errors = FieldErrors::new();
        errors.add("version", FieldError::required());
        let err = errors
            .into_result(|errors| PlugindError::Validation { errors })
            .unwrap_err();
        assert_eq!(err.error_id(), "validation_error");
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn constraint_id_display_is_lowercase() {
        assert_eq!(ConstraintId::Regex.to_string(), "regex");
        assert_eq!(ConstraintId::Length.to_string(), "length");
    }
}
