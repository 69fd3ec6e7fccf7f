// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Market catalog access.
//!
//! [`MarketClient`] talks to the market HTTP API. [`MarketProxy`] fetches the
//! catalog once and serves every later lookup from memory. [`MarketDb`]
//! annotates entries with the local install state and picks the version an
//! install should use.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use plugind_config::model::MarketConfig;
use plugind_core::{Catalog, MarketPlugin, MarketVersion, PlugindError};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::installed::PluginDb;
use crate::version::{LooseVersion, VersionConstraint, less_than};

#[derive(Debug, Deserialize)]
struct PluginList {
    #[serde(default)]
    items: Vec<MarketPlugin>,
}

/// HTTP client for the market API.
#[derive(Debug, Clone)]
pub struct MarketClient {
    client: reqwest::Client,
    base_url: String,
}

impl MarketClient {
    pub fn new(config: &MarketConfig) -> Result<Self, PlugindError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PlugindError::Catalog {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Catalog for MarketClient {
    async fn plugins(&self) -> Result<Vec<MarketPlugin>, PlugindError> {
        let url = format!("{}/plugins", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| PlugindError::Catalog {
            message: format!("market request failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlugindError::Catalog {
                message: format!("market returned {status}: {body}"),
                source: None,
            });
        }

        let list: PluginList = response.json().await.map_err(|e| PlugindError::Catalog {
            message: format!("invalid market response: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(count = list.items.len(), "market catalog fetched");
        Ok(list.items)
    }
}

/// Fetches the catalog at most once per instance.
pub struct MarketProxy {
    catalog: Arc<dyn Catalog>,
    content: OnceCell<Vec<MarketPlugin>>,
}

impl MarketProxy {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            content: OnceCell::new(),
        }
    }

    pub async fn content(&self) -> Result<&[MarketPlugin], PlugindError> {
        self.content
            .get_or_try_init(|| self.catalog.plugins())
            .await
            .map(Vec::as_slice)
    }
}

/// Fills in `installed_version` and the per-version `upgradable` flags.
pub struct MarketPluginUpdater<'a> {
    plugin_db: &'a PluginDb,
    current_version: &'a str,
}

impl<'a> MarketPluginUpdater<'a> {
    pub fn new(plugin_db: &'a PluginDb, current_version: &'a str) -> Self {
        Self {
            plugin_db,
            current_version,
        }
    }

    pub fn update(&self, plugin: &mut MarketPlugin) {
        plugin.installed_version = self
            .plugin_db
            .get_metadata(&plugin.namespace, &plugin.name)
            .ok()
            .map(|m| m.version);

        for version in &mut plugin.versions {
            version.upgradable = is_compatible(version, self.current_version)
                && less_than(plugin.installed_version.as_deref(), Some(&version.version));
        }
    }
}

/// Whether the platform version lies within the version's declared bounds.
pub fn is_compatible(version: &MarketVersion, current_version: &str) -> bool {
    let min_ok = match version.min_wazo_version.as_deref() {
        Some(min) => !less_than(Some(current_version), Some(min)),
        None => true,
    };
    let max_ok = match version.max_wazo_version.as_deref() {
        Some(max) => !less_than(Some(max), Some(current_version)),
        None => true,
    };
    min_ok && max_ok
}

/// The version an install should use.
///
/// With a constraint: the highest compatible version satisfying it.
/// Without: the highest compatible version.
pub fn select_version<'p>(
    plugin: &'p MarketPlugin,
    constraint: Option<&str>,
    current_version: &str,
) -> Result<Option<&'p MarketVersion>, PlugindError> {
    let constraint = match constraint.filter(|c| !c.trim().is_empty()) {
        Some(expression) => expression.parse::<VersionConstraint>().map_err(|e| PlugindError::Fetch {
            message: format!("invalid version constraint `{expression}`: {e}"),
            source: Some(Box::new(e)),
        })?,
        None => VersionConstraint::any(),
    };

    Ok(plugin
        .versions
        .iter()
        .filter(|v| is_compatible(v, current_version))
        .filter(|v| constraint.matches_str(&v.version))
        .max_by_key(|v| LooseVersion::parse(&v.version)))
}

/// Catalog lookups annotated with the local install state.
pub struct MarketDb {
    proxy: MarketProxy,
    plugin_db: PluginDb,
    current_version: String,
}

impl MarketDb {
    pub fn new(catalog: Arc<dyn Catalog>, plugin_db: PluginDb, current_version: impl Into<String>) -> Self {
        Self {
            proxy: MarketProxy::new(catalog),
            plugin_db,
            current_version: current_version.into(),
        }
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// The catalog entry for `namespace/name`, or a fetch error.
    pub async fn get(&self, namespace: &str, name: &str) -> Result<MarketPlugin, PlugindError> {
        let content = self.proxy.content().await?;
        let mut plugin = content
            .iter()
            .find(|p| p.namespace == namespace && p.name == name)
            .cloned()
            .ok_or_else(|| PlugindError::Fetch {
                message: format!("No such plugin {namespace}/{name}"),
                source: None,
            })?;
        MarketPluginUpdater::new(&self.plugin_db, &self.current_version).update(&mut plugin);
        Ok(plugin)
    }
}
