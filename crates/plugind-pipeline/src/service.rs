// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The plugin service: accepts requests and schedules pipeline runs.
//!
//! `install` and `uninstall` check what can be checked synchronously, return
//! the run's correlation id and leave the rest to a background task. The
//! outcome is only reported through progress events.

use std::sync::Arc;

use plugind_config::PlugindConfig;
use plugind_core::{Catalog, InstallRequest, MarketPlugin, PluginKey, PlugindError};
use plugind_plugin::{MarketPluginUpdater, MarketProxy, PluginDb, PluginMetadata, WazoVersionFinder};
use tokio_util::task::TaskTracker;
use tracing::{Level, info};
use uuid::Uuid;

use crate::context::{InstallContext, UninstallContext};
use crate::engine::{Collaborators, PipelineEngine};

pub struct PluginService {
    config: Arc<PlugindConfig>,
    engine: Arc<PipelineEngine>,
    plugin_db: PluginDb,
    catalog: Arc<dyn Catalog>,
    version_finder: WazoVersionFinder,
    tracker: TaskTracker,
}

impl PluginService {
    pub fn new(config: Arc<PlugindConfig>, collaborators: Collaborators) -> Result<Self, PlugindError> {
        let engine = PipelineEngine::new(Arc::clone(&config), &collaborators)?;
        Ok(Self {
            plugin_db: PluginDb::new(&config)?,
            version_finder: collaborators.version_finder(&config),
            catalog: collaborators.catalog,
            engine: Arc::new(engine),
            config,
            tracker: TaskTracker::new(),
        })
    }

    /// Accepts an install request and returns its correlation id.
    ///
    /// A malformed request fails with `InvalidRequest` before any event is
    /// published.
    pub fn install(&self, request: InstallRequest) -> Result<Uuid, PlugindError> {
        request.validate()?;
        let ctx = InstallContext::new(Arc::clone(&self.config), request);
        let uuid = ctx.uuid;
        ctx.log(Level::INFO, format_args!("installing {:?}", ctx.request));

        let engine = Arc::clone(&self.engine);
        self.tracker.spawn(async move {
            engine.run_install(ctx).await;
        });
        Ok(uuid)
    }

    /// Accepts an uninstall request and returns its correlation id.
    ///
    /// Fails with `PluginNotFound` before any event is published when the
    /// plugin is not installed.
    pub fn uninstall(&self, namespace: &str, name: &str) -> Result<Uuid, PlugindError> {
        let plugin = self.plugin_db.get_plugin(namespace, name);
        if !plugin.is_installed(None) {
            return Err(PlugindError::PluginNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }

        let ctx = UninstallContext::new(
            Arc::clone(&self.config),
            PluginKey::new(namespace, name),
            plugin.package_name().to_string(),
        );
        let uuid = ctx.uuid;
        ctx.log(Level::INFO, format_args!("uninstalling {namespace}/{name}"));

        let engine = Arc::clone(&self.engine);
        self.tracker.spawn(async move {
            engine.run_uninstall(ctx).await;
        });
        Ok(uuid)
    }

    /// Metadata of every installed plugin.
    pub async fn list(&self) -> Result<Vec<PluginMetadata>, PlugindError> {
        self.plugin_db.list().await
    }

    pub fn get_metadata(&self, namespace: &str, name: &str) -> Result<PluginMetadata, PlugindError> {
        self.plugin_db.get_metadata(namespace, name)
    }

    /// The market catalog annotated with installed versions and upgradability.
    pub async fn market(&self) -> Result<Vec<MarketPlugin>, PlugindError> {
        let proxy = MarketProxy::new(Arc::clone(&self.catalog));
        let current_version = self.version_finder.get_version().await?;
        let updater = MarketPluginUpdater::new(&self.plugin_db, &current_version);

        let mut plugins = proxy.content().await?.to_vec();
        for plugin in &mut plugins {
            updater.update(plugin);
        }
        Ok(plugins)
    }

    /// Number of accepted runs that have not reached a terminal state.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Stops accepting new background work and waits for every run.
    pub async fn shutdown(&self) {
        self.tracker.close();
        info!(pending = self.tracker.len(), "waiting for pipeline runs");
        self.tracker.wait().await;
    }
}
