// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixture plugin source trees and a fetcher that copies them.
//!
//! A fixture is a directory holding `wazo/plugin.toml` and an executable
//! `wazo/rules` shell script, i.e. what a git checkout of a real plugin
//! contains. Git requests use the fixture path as their url; market entries
//! point their version urls at fixture paths.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use plugind_config::PlugindConfig;
use plugind_core::{Catalog, GitOptions, InstallRequest, MarketPlugin, PlatformInfo, PlugindError};
use plugind_pipeline::{Fetcher, GitFetcher, InstallContext, MarketFetcher};
use plugind_plugin::{PluginDb, WazoVersionFinder};

use crate::mock_catalog::MockCatalog;

/// Builder for a fixture plugin tree.
#[derive(Debug, Clone)]
pub struct FixturePlugin {
    namespace: String,
    name: String,
    version: String,
    extra: String,
    depends: Vec<(String, String)>,
    debian_depends: Vec<String>,
    build_fails: bool,
}

impl FixturePlugin {
    pub fn new(namespace: &str, name: &str, version: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            extra: String::new(),
            depends: Vec::new(),
            debian_depends: Vec::new(),
            build_fails: false,
        }
    }

    /// Declares a market dependency.
    pub fn depends_on(mut self, namespace: &str, name: &str) -> Self {
        self.depends.push((namespace.to_string(), name.to_string()));
        self
    }

    pub fn with_debian_depends(mut self, packages: &[&str]) -> Self {
        self.debian_depends = packages.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Extra top-level TOML lines for the metadata file.
    pub fn with_extra(mut self, toml: &str) -> Self {
        self.extra.push_str(toml);
        self.extra.push('\n');
        self
    }

    /// Makes the plugin's `rules build` exit non-zero.
    pub fn failing_build(mut self) -> Self {
        self.build_fails = true;
        self
    }

    pub fn metadata(&self) -> String {
        let debian_depends: Vec<String> = self.debian_depends.iter().map(|p| format!("\"{p}\"")).collect();
        let mut doc = format!(
            "namespace = \"{}\"\nname = \"{}\"\nversion = \"{}\"\ndebian_depends = [{}]\n{}",
            self.namespace,
            self.name,
            self.version,
            debian_depends.join(", "),
            self.extra
        );
        for (namespace, name) in &self.depends {
            doc.push_str(&format!("\n[[depends]]\nnamespace = \"{namespace}\"\nname = \"{name}\"\n"));
        }
        doc
    }

    fn rules(&self) -> String {
        let build = if self.build_fails {
            "echo \"build failed\" >&2\n        exit 3"
        } else {
            "echo \"building\""
        };
        format!(
            "#!/bin/sh\nset -e\ncase \"$1\" in\n    build)\n        {build}\n        ;;\n    package)\n        mkdir -p \"$pkgdir\"\n        ;;\nesac\n"
        )
    }

    /// A catalog entry offering this plugin's version from `path`.
    pub fn market_entry(&self, path: &Path) -> MarketPlugin {
        MockCatalog::plugin(
            &self.namespace,
            &self.name,
            &[(self.version.as_str(), path.display().to_string().as_str())],
        )
    }

    /// Writes the tree under `root` and returns its path.
    pub fn write(&self, root: &Path) -> std::io::Result<PathBuf> {
        let dir = root.join(format!("{}-{}-{}", self.namespace, self.name, self.version));
        let wazo = dir.join("wazo");
        std::fs::create_dir_all(&wazo)?;
        std::fs::write(wazo.join("plugin.toml"), self.metadata())?;
        let rules = wazo.join("rules");
        std::fs::write(&rules, self.rules())?;
        std::fs::set_permissions(&rules, std::fs::Permissions::from_mode(0o755))?;
        Ok(dir)
    }
}

/// Fetches by copying a local fixture tree instead of cloning.
///
/// Market requests are resolved through the real [`MarketFetcher`]; the
/// selected version's url is the fixture path.
pub struct FixtureFetcher {
    download_dir: PathBuf,
    market: MarketFetcher,
}

impl FixtureFetcher {
    pub fn new(
        config: &PlugindConfig,
        catalog: Arc<dyn Catalog>,
        platform: Arc<dyn PlatformInfo>,
    ) -> Result<Self, PlugindError> {
        let market = MarketFetcher::new(
            catalog,
            PluginDb::new(config)?,
            WazoVersionFinder::new(&config.confd.version_env_var, platform),
            GitFetcher::new(config),
        );
        Ok(Self {
            download_dir: config.paths.download_dir.clone(),
            market,
        })
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, ctx: &InstallContext) -> Result<PathBuf, PlugindError> {
        let source: GitOptions = match &ctx.request {
            InstallRequest::Git(options) => options.clone(),
            InstallRequest::Market(options) => self.market.resolve(ctx.uuid, options).await?,
        };
        let from = PathBuf::from(&source.url);
        let target = self.download_dir.join(ctx.uuid.to_string());
        copy_tree(&from, &target).map_err(|e| PlugindError::Fetch {
            message: format!("failed to copy fixture {}", from.display()),
            source: Some(Box::new(e)),
        })?;
        Ok(target)
    }
}

/// Recursive copy keeping file modes.
pub(crate) fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_is_valid_plugin_metadata() {
        let doc = FixturePlugin::new("official", "parent", "1.0")
            .depends_on("official", "child")
            .with_debian_depends(&["curl"])
            .metadata();
        let metadata = plugind_plugin::RawMetadata::parse(&doc)
            .unwrap()
            .validate("17.10")
            .unwrap();
        assert_eq!(metadata.depends[0].name, "child");
        assert_eq!(metadata.debian_depends, vec!["curl".to_string()]);
    }

    #[test]
    fn written_rules_are_executable() {
        let dir = tempfile::tempdir().unwrap();
        let path = FixturePlugin::new("official", "admin-ui", "1.0").write(dir.path()).unwrap();
        let mode = std::fs::metadata(path.join("wazo/rules")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
