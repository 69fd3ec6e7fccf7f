// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source fetching.
//!
//! A fetcher turns an install request into a local directory holding the
//! plugin source, placed at `<download_dir>/<uuid>`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use plugind_config::PlugindConfig;
use plugind_core::{Catalog, GitOptions, InstallRequest, MarketOptions, PlugindError};
use plugind_plugin::{MarketDb, PluginDb, WazoVersionFinder, select_version};
use tracing::Level;
use uuid::Uuid;

use crate::context::{InstallContext, log_with_id};
use crate::shell::ShellCommand;

/// Produces the unpacked plugin source for a request.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Returns the download path.
    async fn fetch(&self, ctx: &InstallContext) -> Result<PathBuf, PlugindError>;
}

fn fetch_error(message: impl Into<String>, source: Option<PlugindError>) -> PlugindError {
    PlugindError::Fetch {
        message: message.into(),
        source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
    }
}

/// Shallow `git clone` of a repository at a ref.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    download_dir: PathBuf,
}

impl GitFetcher {
    pub fn new(config: &PlugindConfig) -> Self {
        Self {
            download_dir: config.paths.download_dir.clone(),
        }
    }

    pub async fn clone_repo(&self, uuid: Uuid, options: &GitOptions) -> Result<PathBuf, PlugindError> {
        let target = self.download_dir.join(uuid.to_string());
        remove_dir_if_exists(&target).await?;
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| PlugindError::io(format!("failed to create {}", self.download_dir.display()), e))?;

        log_with_id(
            uuid,
            Level::DEBUG,
            format_args!("cloning {} ({}) into {}", options.url, options.git_ref, target.display()),
        );
        clone_command(options, &target)
            .run(uuid)
            .await
            .map_err(|e| fetch_error(format!("failed to clone {}", options.url), Some(e)))?;

        Ok(target)
    }
}

/// The url goes after `--` so that a url starting with `-` is never read as
/// an option.
fn clone_command(options: &GitOptions, target: &Path) -> ShellCommand {
    ShellCommand::new("git")
        .arg("clone")
        .arg("--depth")
        .arg("1")
        .arg("--branch")
        .arg(&options.git_ref)
        .arg("--")
        .arg(&options.url)
        .arg(target)
}

#[async_trait]
impl Fetcher for GitFetcher {
    async fn fetch(&self, ctx: &InstallContext) -> Result<PathBuf, PlugindError> {
        match &ctx.request {
            InstallRequest::Git(options) => self.clone_repo(ctx.uuid, options).await,
            InstallRequest::Market(_) => Err(fetch_error("git fetcher cannot serve market requests", None)),
        }
    }
}

/// Resolves a catalog entry, then fetches the selected version with git.
pub struct MarketFetcher {
    catalog: Arc<dyn Catalog>,
    plugin_db: PluginDb,
    version_finder: WazoVersionFinder,
    git: GitFetcher,
}

impl MarketFetcher {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        plugin_db: PluginDb,
        version_finder: WazoVersionFinder,
        git: GitFetcher,
    ) -> Self {
        Self {
            catalog,
            plugin_db,
            version_finder,
            git,
        }
    }

    /// Git options of the version an install of `options` should use.
    pub async fn resolve(&self, uuid: Uuid, options: &MarketOptions) -> Result<GitOptions, PlugindError> {
        if let Some(url) = options.url.as_deref().filter(|u| !u.is_empty()) {
            return Ok(GitOptions::new(url));
        }

        let current_version = self.version_finder.get_version().await?;
        // A fresh catalog snapshot per request.
        let market = MarketDb::new(Arc::clone(&self.catalog), self.plugin_db.clone(), current_version);
        let plugin = market.get(&options.namespace, &options.name).await?;
        let selected = select_version(&plugin, options.version.as_deref(), market.current_version())?
            .ok_or_else(|| {
                fetch_error(
                    format!(
                        "no installable version of {}/{} matches `{}`",
                        options.namespace,
                        options.name,
                        options.version.as_deref().unwrap_or("*")
                    ),
                    None,
                )
            })?;

        if selected.method != "git" {
            return Err(fetch_error(
                format!("unsupported download method `{}`", selected.method),
                None,
            ));
        }
        let git_options = selected.options.clone().ok_or_else(|| {
            fetch_error(
                format!("version {} of {}/{} has no source", selected.version, options.namespace, options.name),
                None,
            )
        })?;
        log_with_id(
            uuid,
            Level::INFO,
            format_args!("selected {}/{} version {}", options.namespace, options.name, selected.version),
        );
        Ok(git_options)
    }
}

#[async_trait]
impl Fetcher for MarketFetcher {
    async fn fetch(&self, ctx: &InstallContext) -> Result<PathBuf, PlugindError> {
        match &ctx.request {
            InstallRequest::Market(options) => {
                let git_options = self.resolve(ctx.uuid, options).await?;
                self.git.clone_repo(ctx.uuid, &git_options).await
            }
            InstallRequest::Git(_) => Err(fetch_error("market fetcher cannot serve git requests", None)),
        }
    }
}

/// Dispatches on the request's download method.
pub struct SourceFetcher {
    git: GitFetcher,
    market: MarketFetcher,
}

impl SourceFetcher {
    pub fn new(git: GitFetcher, market: MarketFetcher) -> Self {
        Self { git, market }
    }
}

#[async_trait]
impl Fetcher for SourceFetcher {
    async fn fetch(&self, ctx: &InstallContext) -> Result<PathBuf, PlugindError> {
        match &ctx.request {
            InstallRequest::Git(_) => self.git.fetch(ctx).await,
            InstallRequest::Market(_) => self.market.fetch(ctx).await,
        }
    }
}

pub(crate) async fn remove_dir_if_exists(path: &std::path::Path) -> Result<(), PlugindError> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PlugindError::io(format!("failed to remove {}", path.display()), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugind_core::{MarketPlugin, PlatformInfo};

    struct FixedCatalog(Vec<MarketPlugin>);

    #[async_trait]
    impl Catalog for FixedCatalog {
        async fn plugins(&self) -> Result<Vec<MarketPlugin>, PlugindError> {
            Ok(self.0.clone())
        }
    }

    struct FixedPlatform;

    #[async_trait]
    impl PlatformInfo for FixedPlatform {
        async fn wazo_version(&self) -> Result<String, PlugindError> {
            Ok("17.10".to_string())
        }
    }

    fn market_fetcher(dir: &std::path::Path) -> MarketFetcher {
        let config = PlugindConfig::rooted_at(dir);
        let plugin: MarketPlugin = serde_json::from_value(serde_json::json!({
            "namespace": "official",
            "name": "admin-ui",
            "versions": [
                {"version": "1.0", "options": {"url": "https://git.example.com/admin-ui", "ref": "v1.0"}},
                {"version": "2.0", "options": {"url": "https://git.example.com/admin-ui", "ref": "v2.0"}},
                {"version": "3.0", "method": "archive"}
            ]
        }))
        .unwrap();
        MarketFetcher::new(
            Arc::new(FixedCatalog(vec![plugin])),
            PluginDb::new(&config).unwrap(),
            WazoVersionFinder::new("PLUGIND_TEST_UNSET_VERSION", Arc::new(FixedPlatform)),
            GitFetcher::new(&config),
        )
    }

    #[tokio::test]
    async fn market_resolution_follows_constraint() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = market_fetcher(dir.path());

        let mut options = MarketOptions::new("official", "admin-ui");
        options.version = Some("<3".to_string());
        let git = fetcher.resolve(Uuid::nil(), &options).await.unwrap();
        assert_eq!(git.git_ref, "v2.0");

        options.version = Some("1.0".to_string());
        assert_eq!(fetcher.resolve(Uuid::nil(), &options).await.unwrap().git_ref, "v1.0");
    }

    #[tokio::test]
    async fn unsupported_method_and_unknown_plugin_are_fetch_errors() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = market_fetcher(dir.path());

        let latest = MarketOptions::new("official", "admin-ui");
        assert!(matches!(
            fetcher.resolve(Uuid::nil(), &latest).await,
            Err(PlugindError::Fetch { .. })
        ));

        let unknown = MarketOptions::new("official", "nope");
        assert!(matches!(
            fetcher.resolve(Uuid::nil(), &unknown).await,
            Err(PlugindError::Fetch { .. })
        ));
    }

    #[tokio::test]
    async fn explicit_url_bypasses_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = market_fetcher(dir.path());
        let mut options = MarketOptions::new("other", "thing");
        options.url = Some("https://git.example.com/thing".to_string());
        let git = fetcher.resolve(Uuid::nil(), &options).await.unwrap();
        assert_eq!(git.url, "https://git.example.com/thing");
        assert_eq!(git.git_ref, "master");
    }

    #[test]
    fn clone_url_cannot_be_read_as_an_option() {
        let options = GitOptions::new("--upload-pack=touch /tmp/owned");
        let command = clone_command(&options, Path::new("/dl/x"));
        assert_eq!(
            command.command_line(),
            "git clone --depth 1 --branch master -- --upload-pack=touch /tmp/owned /dl/x"
        );
    }

    #[tokio::test]
    async fn failed_clone_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = GitFetcher::new(&PlugindConfig::rooted_at(dir.path()));
        let err = fetcher
            .clone_repo(Uuid::nil(), &GitOptions::new(dir.path().join("no-such-repo").display().to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, PlugindError::Fetch { .. }));
    }
}
