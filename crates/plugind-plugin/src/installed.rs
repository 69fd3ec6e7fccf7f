// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Installed-plugin database.
//!
//! The host package manager owns the records. A plugin counts as installed
//! when its metadata file exists under the metadata directory and parses;
//! listing asks `dpkg-query` for the packages of the plugin section.

use std::path::PathBuf;

use plugind_config::PlugindConfig;
use plugind_config::model::BuildConfig;
use plugind_core::{PluginKey, PlugindError};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::metadata::PluginMetadata;
use crate::version::VersionConstraint;

/// One plugin slot in the installed database, installed or not.
#[derive(Debug, Clone)]
pub struct InstalledPlugin {
    key: PluginKey,
    package_name: String,
    metadata_path: PathBuf,
}

impl InstalledPlugin {
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn metadata(&self) -> Result<PluginMetadata, PlugindError> {
        let content = std::fs::read_to_string(&self.metadata_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PlugindError::PluginNotFound {
                    namespace: self.key.namespace.clone(),
                    name: self.key.name.clone(),
                }
            } else {
                PlugindError::MetadataRead {
                    path: self.metadata_path.clone(),
                    message: e.to_string(),
                }
            }
        })?;
        PluginMetadata::from_toml(&content).map_err(|e| PlugindError::MetadataRead {
            path: self.metadata_path.clone(),
            message: e.message().to_string(),
        })
    }

    /// Whether the plugin is installed, and when `constraint` is given,
    /// whether the installed version satisfies it.
    pub fn is_installed(&self, constraint: Option<&str>) -> bool {
        let Ok(metadata) = self.metadata() else {
            return false;
        };
        let Some(expression) = constraint.filter(|c| !c.trim().is_empty()) else {
            return true;
        };
        match expression.parse::<VersionConstraint>() {
            Ok(constraint) => constraint.matches_str(&metadata.version),
            Err(e) => {
                warn!(key = %self.key, expression, error = %e, "ignoring unparsable version constraint");
                false
            }
        }
    }
}

/// Lookup of installed plugins and their package names.
#[derive(Debug, Clone)]
pub struct PluginDb {
    metadata_dir: PathBuf,
    build: BuildConfig,
    package_re: Regex,
}

impl PluginDb {
    pub fn new(config: &PlugindConfig) -> Result<Self, PlugindError> {
        let pattern = format!(
            "^{}-([a-z0-9-]+)-([a-z0-9]+)$",
            regex::escape(&config.build.package_prefix)
        );
        let package_re = Regex::new(&pattern)
            .map_err(|e| PlugindError::Config(format!("invalid package prefix: {e}")))?;
        Ok(Self {
            metadata_dir: config.paths.metadata_dir.clone(),
            build: config.build.clone(),
            package_re,
        })
    }

    pub fn get_plugin(&self, namespace: &str, name: &str) -> InstalledPlugin {
        InstalledPlugin {
            key: PluginKey::new(namespace, name),
            package_name: self.build.package_name(namespace, name),
            metadata_path: self
                .metadata_dir
                .join(namespace)
                .join(name)
                .join(&self.build.metadata_filename),
        }
    }

    pub fn is_installed(&self, namespace: &str, name: &str, constraint: Option<&str>) -> bool {
        self.get_plugin(namespace, name).is_installed(constraint)
    }

    /// Metadata of an installed plugin, or `PluginNotFound`.
    pub fn get_metadata(&self, namespace: &str, name: &str) -> Result<PluginMetadata, PlugindError> {
        self.get_plugin(namespace, name).metadata()
    }

    /// Reverse of the package naming scheme.
    pub fn parse_package_name(&self, package: &str) -> Option<PluginKey> {
        let captures = self.package_re.captures(package)?;
        Some(PluginKey::new(&captures[2], &captures[1]))
    }

    /// Metadata of every listed package that belongs to a plugin.
    ///
    /// Packages whose metadata cannot be read are skipped.
    pub fn metadata_of_packages<I, S>(&self, packages: I) -> Vec<PluginMetadata>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut result = Vec::new();
        for package in packages {
            let package = package.as_ref();
            let Some(key) = self.parse_package_name(package) else {
                info!(package, "not a plugin package name, skipping");
                continue;
            };
            match self.get_metadata(&key.namespace, &key.name) {
                Ok(metadata) => result.push(metadata),
                Err(e) => info!(package, error = %e, "skipping plugin with unreadable metadata"),
            }
        }
        result
    }

    /// Lists installed plugins through the host package database.
    pub async fn list(&self) -> Result<Vec<PluginMetadata>, PlugindError> {
        let output = tokio::process::Command::new("dpkg-query")
            .arg("-W")
            .arg("-f=${binary:Package} ${Section}\\n")
            .output()
            .await
            .map_err(|e| PlugindError::io("failed to run dpkg-query", e))?;
        if !output.status.success() {
            return Err(PlugindError::Command {
                program: "dpkg-query".to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let packages = packages_in_section(&stdout, &self.build.package_section);
        debug!(count = packages.len(), section = %self.build.package_section, "plugin packages found");
        Ok(self.metadata_of_packages(packages))
    }
}

/// Package names from `<package> <section>` lines whose section matches.
pub fn packages_in_section(listing: &str, section: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| {
            let (package, pkg_section) = line.trim().split_once(' ')?;
            (pkg_section.trim() == section).then(|| package.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn install(config: &PlugindConfig, namespace: &str, name: &str, version: &str) {
        let path = config
            .paths
            .metadata_dir
            .join(namespace)
            .join(name)
            .join(&config.build.metadata_filename);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            path,
            format!("namespace = \"{namespace}\"\nname = \"{name}\"\nversion = \"{version}\"\n"),
        )
        .unwrap();
    }

    #[test]
    fn package_name_round_trips() {
        let db = PluginDb::new(&PlugindConfig::default()).unwrap();
        let plugin = db.get_plugin("official", "admin-ui");
        assert_eq!(plugin.package_name(), "wazo-plugind-admin-ui-official");
        assert_eq!(
            db.parse_package_name(plugin.package_name()),
            Some(PluginKey::new("official", "admin-ui"))
        );
        assert_eq!(db.parse_package_name("curl"), None);
    }

    #[test]
    fn installed_version_is_matched_against_constraint() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlugindConfig::rooted_at(dir.path());
        install(&config, "official", "admin-ui", "1.2.0");
        let db = PluginDb::new(&config).unwrap();

        assert!(db.is_installed("official", "admin-ui", None));
        assert!(db.is_installed("official", "admin-ui", Some("1.2.0")));
        assert!(db.is_installed("official", "admin-ui", Some(">=1.0,<2")));
        assert!(!db.is_installed("official", "admin-ui", Some("1.3.0")));
        assert!(!db.is_installed("official", "other", None));
    }

    #[test]
    fn missing_plugin_metadata_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let db = PluginDb::new(&PlugindConfig::rooted_at(dir.path())).unwrap();
        assert!(matches!(
            db.get_metadata("official", "nope"),
            Err(PlugindError::PluginNotFound { .. })
        ));
    }

    #[test]
    fn section_filter_keeps_plugin_packages() {
        let listing = "curl net\nwazo-plugind-admin-ui-official wazo-plugind-plugin\nbroken\n";
        assert_eq!(
            packages_in_section(listing, "wazo-plugind-plugin"),
            vec!["wazo-plugind-admin-ui-official"]
        );
    }

    #[test]
    fn unreadable_packages_are_skipped_when_listing() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlugindConfig::rooted_at(dir.path());
        install(&config, "official", "admin-ui", "1.0");
        let db = PluginDb::new(&config).unwrap();

        let listed = db.metadata_of_packages([
            "wazo-plugind-admin-ui-official",
            "wazo-plugind-ghost-official",
            "unrelated",
        ]);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "admin-ui");
    }
}
