// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the plugind crates.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{FieldError, FieldErrors, PlugindError};

/// The unique installed-plugin key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluginKey {
    pub namespace: String,
    pub name: String,
}

impl PluginKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Kind of pipeline operation a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Install,
    Uninstall,
}

/// A pipeline state, published as the `status` of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Starting,
    Downloading,
    Extracting,
    Validating,
    InstallingDependencies,
    Building,
    Packaging,
    Updating,
    Installing,
    Cleaning,
    Removing,
    Completed,
    Error,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Public error id of a failure in this state: `installing_dependencies_error`.
    pub fn error_id(self) -> String {
        format!("{}_error", self.to_string().replace('-', "_"))
    }

    /// Public error message of a failure in this state: `Installing Dependencies Error`.
    pub fn error_message(self) -> String {
        let mut words: Vec<String> = self
            .to_string()
            .split('-')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect();
        words.push("Error".to_string());
        words.join(" ")
    }
}

fn default_ref() -> String {
    "master".to_string()
}

/// Options for the `git` install method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitOptions {
    #[serde(default)]
    pub url: String,
    #[serde(rename = "ref", default = "default_ref")]
    pub git_ref: String,
}

impl GitOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            git_ref: default_ref(),
        }
    }
}

/// Options for the `market` install method; also the shape of a plugin
/// dependency descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOptions {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    /// Exact version or constraint expression (`>=1.0,<2`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Direct source URL, bypassing the catalog lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl MarketOptions {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version: None,
            url: None,
        }
    }

    pub fn key(&self) -> PluginKey {
        PluginKey::new(&self.namespace, &self.name)
    }

    /// Checks the `length >= 1` constraints, reporting under `prefix`.
    pub fn check(&self, prefix: &str, errors: &mut FieldErrors) {
        for (field, value) in [("namespace", &self.namespace), ("name", &self.name)] {
            if value.is_empty() {
                errors.add(format!("{prefix}{field}"), FieldError::length_min(1));
            }
        }
        if let Some(url) = &self.url
            && url.is_empty()
        {
            errors.add(format!("{prefix}url"), FieldError::length_min(1));
        }
    }
}

/// A request to install a plugin, tagged by download method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "options", rename_all = "lowercase")]
pub enum InstallRequest {
    Git(GitOptions),
    Market(MarketOptions),
}

impl InstallRequest {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Git(_) => "git",
            Self::Market(_) => "market",
        }
    }

    /// Validates the request shape before it is accepted.
    pub fn validate(&self) -> Result<(), PlugindError> {
        let mut errors = FieldErrors::new();
        match self {
            Self::Git(options) => {
                if options.url.is_empty() {
                    errors.add("options.url", FieldError::length_min(1));
                }
                if options.git_ref.is_empty() {
                    errors.add("options.ref", FieldError::length_min(1));
                }
            }
            Self::Market(options) => options.check("options.", &mut errors),
        }
        errors.into_result(|errors| PlugindError::InvalidRequest { errors })
    }

    /// The request arguments as a JSON object, used as error-event details.
    pub fn to_details(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

/// A plugin as listed by the market catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPlugin {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub versions: Vec<MarketVersion>,
    /// Installed version, filled in locally.
    #[serde(default)]
    pub installed_version: Option<String>,
    /// Remaining catalog fields (display name, tags, ...), passed through.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_method() -> String {
    "git".to_string()
}

/// One installable version of a market plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketVersion {
    pub version: String,
    #[serde(default)]
    pub min_wazo_version: Option<String>,
    #[serde(default)]
    pub max_wazo_version: Option<String>,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub options: Option<GitOptions>,
    /// Whether this version may be installed over the local state, filled in locally.
    #[serde(default)]
    pub upgradable: bool,
}
