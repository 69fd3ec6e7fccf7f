// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed market catalog and platform version.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use plugind_core::{Catalog, MarketPlugin, PlatformInfo, PlugindError};

/// A catalog serving a fixed plugin list and counting queries.
#[derive(Debug, Default)]
pub struct MockCatalog {
    plugins: Vec<MarketPlugin>,
    calls: AtomicUsize,
}

impl MockCatalog {
    pub fn new(plugins: Vec<MarketPlugin>) -> Self {
        Self {
            plugins,
            calls: AtomicUsize::new(0),
        }
    }

    /// A catalog entry with one git version per `(version, url)`.
    pub fn plugin(namespace: &str, name: &str, versions: &[(&str, &str)]) -> MarketPlugin {
        let versions: Vec<serde_json::Value> = versions
            .iter()
            .map(|(version, url)| {
                serde_json::json!({
                    "version": version,
                    "method": "git",
                    "options": {"url": url, "ref": format!("v{version}")},
                })
            })
            .collect();
        MarketPlugin {
            namespace: namespace.to_string(),
            name: name.to_string(),
            versions: versions
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
            installed_version: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Number of times the catalog was queried.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn plugins(&self) -> Result<Vec<MarketPlugin>, PlugindError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.plugins.clone())
    }
}

/// A platform reporting a fixed version.
#[derive(Debug, Clone)]
pub struct StaticPlatform(pub String);

impl StaticPlatform {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }
}

#[async_trait]
impl PlatformInfo for StaticPlatform {
    async fn wazo_version(&self) -> Result<String, PlugindError> {
        Ok(self.0.clone())
    }
}
