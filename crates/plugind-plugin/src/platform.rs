// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform version discovery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use plugind_config::model::ConfdConfig;
use plugind_core::{PlatformInfo, PlugindError};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Infos {
    wazo_version: String,
}

/// Client for the configuration service's `/infos` endpoint.
#[derive(Debug, Clone)]
pub struct ConfdClient {
    client: reqwest::Client,
    base_url: String,
}

impl ConfdClient {
    pub fn new(config: &ConfdConfig) -> Result<Self, PlugindError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            headers.insert(
                "X-Auth-Token",
                HeaderValue::from_str(token)
                    .map_err(|e| PlugindError::Config(format!("invalid confd token header value: {e}")))?,
            );
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PlugindError::Platform {
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
impl PlatformInfo for ConfdClient {
    async fn wazo_version(&self) -> Result<String, PlugindError> {
        let url = format!("{}/infos", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| PlugindError::Platform {
            message: format!("confd request failed: {e}"),
            source: Some(Box::new(e)),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(PlugindError::Platform {
                message: format!("confd returned {status}"),
                source: None,
            });
        }
        let infos: Infos = response.json().await.map_err(|e| PlugindError::Platform {
            message: format!("invalid confd response: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(infos.wazo_version)
    }
}

/// Resolves the running platform version: environment override first, then
/// the platform-info collaborator.
#[derive(Clone)]
pub struct WazoVersionFinder {
    env_var: String,
    platform: Arc<dyn PlatformInfo>,
}

impl WazoVersionFinder {
    pub fn new(env_var: impl Into<String>, platform: Arc<dyn PlatformInfo>) -> Self {
        Self {
            env_var: env_var.into(),
            platform,
        }
    }

    pub async fn get_version(&self) -> Result<String, PlugindError> {
        if let Ok(version) = std::env::var(&self.env_var)
            && !version.is_empty()
        {
            debug!(env_var = %self.env_var, %version, "platform version from environment");
            return Ok(version);
        }
        self.platform.wazo_version().await
    }
}
