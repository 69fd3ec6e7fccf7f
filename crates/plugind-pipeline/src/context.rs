// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Correlation contexts.
//!
//! A context is created when a request is accepted and owned by the pipeline
//! run that serves it. Install steps record what they produce on the context;
//! a recorded field is never cleared.

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;

use plugind_config::PlugindConfig;
use plugind_core::{InstallRequest, PluginKey, PlugindError};
use plugind_plugin::{PluginMetadata, RawMetadata};
use tracing::Level;
use uuid::Uuid;

/// Emits `[<uuid>] <message>` at `level`.
pub fn log_with_id(uuid: Uuid, level: Level, message: impl Display) {
    match level {
        Level::TRACE => tracing::trace!(%uuid, "[{uuid}] {message}"),
        Level::DEBUG => tracing::debug!(%uuid, "[{uuid}] {message}"),
        Level::INFO => tracing::info!(%uuid, "[{uuid}] {message}"),
        Level::WARN => tracing::warn!(%uuid, "[{uuid}] {message}"),
        Level::ERROR => tracing::error!(%uuid, "[{uuid}] {message}"),
    }
}

fn missing(field: &str) -> PlugindError {
    PlugindError::Internal(format!("context field `{field}` is not set yet"))
}

/// Context of one install run.
#[derive(Debug, Clone)]
pub struct InstallContext {
    pub uuid: Uuid,
    pub config: Arc<PlugindConfig>,
    pub request: InstallRequest,
    /// Keys of the runs that pulled this one in as a dependency, outermost first.
    pub ancestors: Vec<PluginKey>,
    download_path: Option<PathBuf>,
    extract_path: Option<PathBuf>,
    raw_metadata: Option<RawMetadata>,
    metadata: Option<PluginMetadata>,
    installer_path: Option<PathBuf>,
    package_path: Option<PathBuf>,
}

impl InstallContext {
    pub fn new(config: Arc<PlugindConfig>, request: InstallRequest) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            config,
            request,
            ancestors: Vec::new(),
            download_path: None,
            extract_path: None,
            raw_metadata: None,
            metadata: None,
            installer_path: None,
            package_path: None,
        }
    }

    pub fn with_ancestors(mut self, ancestors: Vec<PluginKey>) -> Self {
        self.ancestors = ancestors;
        self
    }

    pub fn log(&self, level: Level, message: impl Display) {
        log_with_id(self.uuid, level, message);
    }

    /// Nesting level: 0 for a requested install, 1 for its dependencies, ...
    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    pub fn set_download_path(&mut self, path: PathBuf) {
        self.download_path = Some(path);
    }

    pub fn set_extracted(&mut self, path: PathBuf, raw: RawMetadata) {
        self.extract_path = Some(path);
        self.raw_metadata = Some(raw);
    }

    pub fn set_metadata(&mut self, metadata: PluginMetadata) {
        self.metadata = Some(metadata);
    }

    pub fn set_installer_path(&mut self, path: PathBuf) {
        self.installer_path = Some(path);
    }

    pub fn set_package_path(&mut self, package_path: PathBuf) {
        self.package_path = Some(package_path);
    }

    pub fn download_path(&self) -> Result<&PathBuf, PlugindError> {
        self.download_path.as_ref().ok_or_else(|| missing("download_path"))
    }

    pub fn extract_path(&self) -> Result<&PathBuf, PlugindError> {
        self.extract_path.as_ref().ok_or_else(|| missing("extract_path"))
    }

    pub fn raw_metadata(&self) -> Result<&RawMetadata, PlugindError> {
        self.raw_metadata.as_ref().ok_or_else(|| missing("raw_metadata"))
    }

    pub fn metadata(&self) -> Result<&PluginMetadata, PlugindError> {
        self.metadata.as_ref().ok_or_else(|| missing("metadata"))
    }

    pub fn installer_path(&self) -> Result<&PathBuf, PlugindError> {
        self.installer_path.as_ref().ok_or_else(|| missing("installer_path"))
    }

    pub fn package_path(&self) -> Result<&PathBuf, PlugindError> {
        self.package_path.as_ref().ok_or_else(|| missing("package_path"))
    }

    /// Per-request scratch directories that cleanup removes.
    pub fn scratch_paths(&self) -> [PathBuf; 2] {
        let id = self.uuid.to_string();
        [
            self.config.paths.extract_dir.join(&id),
            self.config.paths.download_dir.join(&id),
        ]
    }

    /// Request arguments reported with error events.
    pub fn details(&self) -> serde_json::Map<String, serde_json::Value> {
        self.request.to_details()
    }
}

/// Context of one uninstall run.
#[derive(Debug, Clone)]
pub struct UninstallContext {
    pub uuid: Uuid,
    pub config: Arc<PlugindConfig>,
    pub key: PluginKey,
    pub package_name: String,
}

impl UninstallContext {
    pub fn new(config: Arc<PlugindConfig>, key: PluginKey, package_name: String) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            config,
            key,
            package_name,
        }
    }

    pub fn log(&self, level: Level, message: impl Display) {
        log_with_id(self.uuid, level, message);
    }

    pub fn details(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut details = serde_json::Map::new();
        details.insert("namespace".to_string(), self.key.namespace.clone().into());
        details.insert("name".to_string(), self.key.name.clone().into());
        details
    }
}
