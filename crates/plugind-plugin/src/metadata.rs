// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin metadata: reading `plugin.toml` and validating it field by field.
//!
//! Reading only checks that the file is a TOML table ([`RawMetadata`]).
//! Validation against the running platform version produces a typed
//! [`PluginMetadata`] or a [`FieldErrors`] map with one entry per offending
//! field.

use std::path::Path;
use std::sync::LazyLock;

use plugind_core::{FieldError, FieldErrors, MarketOptions, PluginKey, PlugindError};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::version::less_than;

/// Highest `plugin_format_version` this daemon understands.
pub const MAX_PLUGIN_FORMAT_VERSION: i64 = 2;

pub const NAMESPACE_PATTERN: &str = "^[a-z0-9]+$";
pub const NAME_PATTERN: &str = "^[a-z0-9-]+$";

static NAMESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NAMESPACE_PATTERN).expect("namespace pattern is valid"));

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NAME_PATTERN).expect("name pattern is valid"));

pub fn is_valid_namespace(namespace: &str) -> bool {
    NAMESPACE_RE.is_match(namespace)
}

pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// Checks both identifier patterns, reporting under `namespace` and `name`.
pub fn check_key(namespace: &str, name: &str) -> Result<(), PlugindError> {
    let mut errors = FieldErrors::new();
    if !is_valid_namespace(namespace) {
        errors.add("namespace", FieldError::regex(NAMESPACE_PATTERN));
    }
    if !is_valid_name(name) {
        errors.add("name", FieldError::regex(NAME_PATTERN));
    }
    errors.into_result(|errors| PlugindError::Validation { errors })
}

/// A parsed but not yet validated metadata document.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMetadata(toml::Table);

impl RawMetadata {
    /// Reads and parses the metadata file at `path`.
    pub fn read(path: &Path) -> Result<Self, PlugindError> {
        let content = std::fs::read_to_string(path).map_err(|e| PlugindError::MetadataRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&content).map_err(|message| PlugindError::MetadataRead {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        content
            .parse::<toml::Table>()
            .map(Self)
            .map_err(|e| e.message().to_string())
    }

    /// The plugin key, when both identifiers are present as strings.
    pub fn key(&self) -> Option<PluginKey> {
        let namespace = self.0.get("namespace")?.as_str()?;
        let name = self.0.get("name")?.as_str()?;
        Some(PluginKey::new(namespace, name))
    }

    /// Validates the document against the current platform version.
    pub fn validate(&self, current_version: &str) -> Result<PluginMetadata, PlugindError> {
        let mut errors = FieldErrors::new();
        let table = &self.0;

        let namespace = required_string(table, "namespace", &mut errors);
        if let Some(ns) = &namespace
            && !is_valid_namespace(ns)
        {
            errors.add("namespace", FieldError::regex(NAMESPACE_PATTERN));
        }

        let name = required_string(table, "name", &mut errors);
        if let Some(n) = &name
            && !is_valid_name(n)
        {
            errors.add("name", FieldError::regex(NAME_PATTERN));
        }

        let version = match table.get("version") {
            None => {
                errors.add("version", FieldError::required());
                None
            }
            Some(value) => version_string(value, "version", &mut errors),
        };

        let plugin_format_version = match table.get("plugin_format_version") {
            None => 0,
            Some(toml::Value::Integer(n)) => {
                if !(0..=MAX_PLUGIN_FORMAT_VERSION).contains(n) {
                    errors.add(
                        "plugin_format_version",
                        FieldError::range(
                            Some(0.into()),
                            Some(MAX_PLUGIN_FORMAT_VERSION.into()),
                            format!(
                                "Must be greater than or equal to 0 and less than or equal to {MAX_PLUGIN_FORMAT_VERSION}."
                            ),
                        ),
                    );
                }
                *n
            }
            Some(_) => {
                errors.add("plugin_format_version", FieldError::invalid_type("integer"));
                0
            }
        };

        let min_wazo_version = table
            .get("min_wazo_version")
            .and_then(|v| version_string(v, "min_wazo_version", &mut errors));
        if let Some(min) = &min_wazo_version
            && less_than(Some(current_version), Some(min))
        {
            errors.add(
                "min_wazo_version",
                FieldError::range(
                    None,
                    Some(current_version.into()),
                    format!("Must be less than or equal to {current_version}."),
                ),
            );
        }

        let max_wazo_version = table
            .get("max_wazo_version")
            .and_then(|v| version_string(v, "max_wazo_version", &mut errors));
        if let Some(max) = &max_wazo_version
            && less_than(Some(max), Some(current_version))
        {
            errors.add(
                "max_wazo_version",
                FieldError::range(
                    Some(current_version.into()),
                    None,
                    format!("Must be greater than or equal to {current_version}."),
                ),
            );
        }

        let depends = parse_depends(table.get("depends"), &mut errors);
        let debian_depends = string_list(table, "debian_depends", &mut errors);
        let tags = string_list(table, "tags", &mut errors);
        let display_name = optional_string(table, "display_name", &mut errors);
        let author = optional_string(table, "author", &mut errors);
        let description = optional_string(table, "description", &mut errors);
        let homepage = optional_string(table, "homepage", &mut errors);

        match (namespace, name, version) {
            (Some(namespace), Some(name), Some(version)) if errors.is_empty() => Ok(PluginMetadata {
                namespace,
                name,
                version,
                plugin_format_version,
                min_wazo_version,
                max_wazo_version,
                depends,
                debian_depends,
                display_name,
                author,
                description,
                homepage,
                tags,
            }),
            _ => Err(PlugindError::Validation { errors }),
        }
    }
}

fn required_string(table: &toml::Table, field: &str, errors: &mut FieldErrors) -> Option<String> {
    match table.get(field) {
        None => {
            errors.add(field, FieldError::required());
            None
        }
        Some(toml::Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.add(field, FieldError::invalid_type("string"));
            None
        }
    }
}

fn optional_string(table: &toml::Table, field: &str, errors: &mut FieldErrors) -> Option<String> {
    match table.get(field)? {
        toml::Value::String(s) => Some(s.clone()),
        _ => {
            errors.add(field, FieldError::invalid_type("string"));
            None
        }
    }
}

/// Integer versions (`version = 2`) are accepted as strings. Floats are not:
/// TOML keeps no source text for them, so `17.10` would read back as `17.1`.
fn version_string(value: &toml::Value, field: &str, errors: &mut FieldErrors) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(n) => Some(n.to_string()),
        _ => {
            errors.add(field, FieldError::invalid_type("string"));
            None
        }
    }
}

fn string_list(table: &toml::Table, field: &str, errors: &mut FieldErrors) -> Vec<String> {
    let Some(value) = table.get(field) else {
        return Vec::new();
    };
    let Some(items) = value.as_array() else {
        errors.add(field, FieldError::invalid_type("list"));
        return Vec::new();
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(s) => out.push(s.to_string()),
            None => errors.add(format!("{field}.{i}"), FieldError::invalid_type("string")),
        }
    }
    out
}

fn parse_depends(value: Option<&toml::Value>, errors: &mut FieldErrors) -> Vec<MarketOptions> {
    let Some(value) = value else {
        return Vec::new();
    };
    let Some(items) = value.as_array() else {
        errors.add("depends", FieldError::invalid_type("list"));
        return Vec::new();
    };

    let mut depends = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let prefix = format!("depends.{i}.");
        let Some(entry) = item.as_table() else {
            errors.add(format!("depends.{i}"), FieldError::invalid_type("table"));
            continue;
        };
        let mut local = FieldErrors::new();
        let namespace = required_string(entry, "namespace", &mut local);
        let name = required_string(entry, "name", &mut local);
        let version = entry
            .get("version")
            .and_then(|v| version_string(v, "version", &mut local));
        let url = optional_string(entry, "url", &mut local);
        for (field, error) in local.iter() {
            errors.add(format!("{prefix}{field}"), error.clone());
        }

        if let (Some(namespace), Some(name)) = (namespace, name) {
            let options = MarketOptions {
                namespace,
                name,
                version,
                url,
            };
            options.check(&prefix, errors);
            depends.push(options);
        }
    }
    depends
}

/// Validated plugin metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub namespace: String,
    pub name: String,
    #[serde(deserialize_with = "string_or_integer")]
    pub version: String,
    #[serde(default)]
    pub plugin_format_version: i64,
    #[serde(default, deserialize_with = "opt_string_or_integer", skip_serializing_if = "Option::is_none")]
    pub min_wazo_version: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_integer", skip_serializing_if = "Option::is_none")]
    pub max_wazo_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<MarketOptions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub debian_depends: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl PluginMetadata {
    pub fn key(&self) -> PluginKey {
        PluginKey::new(&self.namespace, &self.name)
    }

    /// Parses installed metadata without re-running the platform checks.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrInteger {
    String(String),
    Integer(i64),
}

impl From<StringOrInteger> for String {
    fn from(value: StringOrInteger) -> Self {
        match value {
            StringOrInteger::String(s) => s,
            StringOrInteger::Integer(n) => n.to_string(),
        }
    }
}

fn string_or_integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    StringOrInteger::deserialize(deserializer).map(String::from)
}

fn opt_string_or_integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Option::<StringOrInteger>::deserialize(deserializer).map(|v| v.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugind_core::ConstraintId;

    fn validate(doc: &str, current: &str) -> Result<PluginMetadata, PlugindError> {
        RawMetadata::parse(doc).unwrap().validate(current)
    }

    fn field_errors(result: Result<PluginMetadata, PlugindError>) -> FieldErrors {
        match result {
            Err(PlugindError::Validation { errors }) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn minimal_document_is_valid() {
        let metadata = validate(
            "namespace = \"official\"\nname = \"admin-ui\"\nversion = \"0.1.0\"\n",
            "17.10",
        )
        .unwrap();
        assert_eq!(metadata.key(), PluginKey::new("official", "admin-ui"));
        assert_eq!(metadata.plugin_format_version, 0);
        assert!(metadata.depends.is_empty());
    }

    #[test]
    fn numeric_versions_become_strings() {
        let metadata = validate(
            "namespace = \"a\"\nname = \"b\"\nversion = 2\nmax_wazo_version = 18\n",
            "17.10",
        )
        .unwrap();
        assert_eq!(metadata.version, "2");
        assert_eq!(metadata.max_wazo_version.as_deref(), Some("18"));
    }

    #[test]
    fn float_versions_are_type_errors() {
        let errors = field_errors(validate(
            "namespace = \"a\"\nname = \"b\"\nversion = 1.0\nmax_wazo_version = 17.10\n",
            "17.09",
        ));
        assert_eq!(errors.get("version").unwrap().constraint_id, ConstraintId::Type);
        assert_eq!(errors.get("max_wazo_version").unwrap().constraint_id, ConstraintId::Type);
    }

    #[test]
    fn installed_metadata_with_float_version_does_not_parse() {
        assert!(PluginMetadata::from_toml("namespace = \"a\"\nname = \"b\"\nversion = 17.10\n").is_err());
    }

    #[test]
    fn invalid_name_reports_regex_constraint() {
        let errors = field_errors(validate(
            "namespace = \"official\"\nname = \"Invalid_Name\"\nversion = \"1\"\n",
            "17.10",
        ));
        let error = errors.get("name").unwrap();
        assert_eq!(error.constraint_id, ConstraintId::Regex);
        assert_eq!(error.constraint, serde_json::json!(NAME_PATTERN));
    }

    #[test]
    fn missing_fields_are_required() {
        let errors = field_errors(validate("name = \"x\"\n", "17.10"));
        assert_eq!(errors.get("namespace").unwrap().constraint_id, ConstraintId::Required);
        assert_eq!(errors.get("version").unwrap().constraint_id, ConstraintId::Required);
    }

    #[test]
    fn platform_bounds_are_range_errors() {
        let errors = field_errors(validate(
            "namespace = \"a\"\nname = \"b\"\nversion = \"1\"\nmin_wazo_version = \"18.01\"\nmax_wazo_version = \"17.09\"\n",
            "17.10",
        ));
        let min = errors.get("min_wazo_version").unwrap();
        assert_eq!(min.constraint_id, ConstraintId::Range);
        assert_eq!(min.constraint, serde_json::json!({"max": "17.10"}));
        let max = errors.get("max_wazo_version").unwrap();
        assert_eq!(max.constraint, serde_json::json!({"min": "17.10"}));
    }

    #[test]
    fn bounds_equal_to_current_version_pass() {
        validate(
            "namespace = \"a\"\nname = \"b\"\nversion = \"1\"\nmin_wazo_version = \"17.10\"\nmax_wazo_version = \"17.10\"\n",
            "17.10",
        )
        .unwrap();
    }

    #[test]
    fn future_format_version_is_rejected() {
        let errors = field_errors(validate(
            "namespace = \"a\"\nname = \"b\"\nversion = \"1\"\nplugin_format_version = 3\n",
            "17.10",
        ));
        assert_eq!(
            errors.get("plugin_format_version").unwrap().constraint_id,
            ConstraintId::Range
        );
    }

    #[test]
    fn dependencies_are_parsed_and_checked() {
        let doc = r#"
namespace = "a"
name = "b"
version = "1"
debian_depends = ["curl"]

[[depends]]
namespace = "official"
name = "base"
version = ">=1.0"

[[depends]]
namespace = ""
name = "other"
"#;
        let errors = field_errors(validate(doc, "17.10"));
        assert_eq!(errors.get("depends.1.namespace").unwrap().constraint_id, ConstraintId::Length);

        let ok = validate(&doc.replace("namespace = \"\"", "namespace = \"x\""), "17.10").unwrap();
        assert_eq!(ok.depends.len(), 2);
        assert_eq!(ok.depends[0].version.as_deref(), Some(">=1.0"));
        assert_eq!(ok.debian_depends, vec!["curl"]);
    }

    #[test]
    fn raw_key_needs_both_identifiers() {
        assert_eq!(
            RawMetadata::parse("namespace = \"a\"\nname = \"b\"").unwrap().key(),
            Some(PluginKey::new("a", "b"))
        );
        assert_eq!(RawMetadata::parse("name = \"b\"").unwrap().key(), None);
    }

    #[test]
    fn unreadable_file_is_a_metadata_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("plugin.toml");
        assert!(matches!(RawMetadata::read(&missing), Err(PlugindError::MetadataRead { .. })));

        std::fs::write(&missing, "namespace = ").unwrap();
        assert!(matches!(RawMetadata::read(&missing), Err(PlugindError::MetadataRead { .. })));
    }

    #[test]
    fn installed_metadata_round_trips_through_toml() {
        let metadata = validate(
            "namespace = \"a\"\nname = \"b\"\nversion = \"1.2\"\ntags = [\"ui\"]\n",
            "17.10",
        )
        .unwrap();
        let written = toml::to_string(&metadata).unwrap();
        assert_eq!(PluginMetadata::from_toml(&written).unwrap(), metadata);
    }
}
