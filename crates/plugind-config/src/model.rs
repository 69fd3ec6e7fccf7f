// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so that a typo in the
//! configuration file is reported at startup instead of silently ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlugindConfig {
    /// Process-level settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Scratch and installation directories.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Build and packaging settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Privileged worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Plugin market settings.
    #[serde(default)]
    pub market: MarketConfig,

    /// Platform configuration service settings.
    #[serde(default)]
    pub confd: ConfdConfig,

    /// Progress bus settings.
    #[serde(default)]
    pub bus: BusConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Forces debug logging, overriding `log_level`.
    #[serde(default)]
    pub debug: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            debug: false,
        }
    }
}

impl DaemonConfig {
    /// The level actually used by the log subscriber.
    pub fn effective_log_level(&self) -> &str {
        if self.debug { "debug" } else { &self.log_level }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Scratch and installation directories.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Where fetched sources land before extraction.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Parent of the per-request build directories.
    #[serde(default = "default_extract_dir")]
    pub extract_dir: PathBuf,

    /// Where installed plugins keep their metadata.
    #[serde(default = "default_metadata_dir")]
    pub metadata_dir: PathBuf,

    /// Package descriptor templates.
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            extract_dir: default_extract_dir(),
            metadata_dir: default_metadata_dir(),
            template_dir: default_template_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("/var/lib/wazo-plugind/downloads")
}

fn default_extract_dir() -> PathBuf {
    PathBuf::from("/var/lib/wazo-plugind/tmp")
}

fn default_metadata_dir() -> PathBuf {
    PathBuf::from("/usr/lib/wazo-plugind/plugins")
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("/usr/lib/wazo-plugind/templates")
}

/// Build and packaging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Staging directory name inside the extracted tree.
    #[serde(default = "default_build_dir")]
    pub build_dir: String,

    /// Directory of the plugin tree copied into the installed package.
    #[serde(default = "default_plugin_data_dir")]
    pub plugin_data_dir: String,

    /// Metadata file, relative to the plugin tree root.
    #[serde(default = "default_metadata_filename")]
    pub metadata_filename: String,

    /// Build/package entry point, relative to the plugin tree root.
    #[serde(default = "default_install_filename")]
    pub install_filename: String,

    /// Prefix of the native package names.
    #[serde(default = "default_package_prefix")]
    pub package_prefix: String,

    /// Native package section used to recognise plugin packages.
    #[serde(default = "default_package_section")]
    pub package_section: String,

    /// Ownership-emulation wrapper for packaging commands. Empty disables it.
    #[serde(default = "default_fakeroot")]
    pub fakeroot: String,

    /// Native archive builder.
    #[serde(default = "default_deb_builder")]
    pub deb_builder: String,

    /// Maximum nesting of dependency installs.
    #[serde(default = "default_max_dependency_depth")]
    pub max_dependency_depth: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build_dir: default_build_dir(),
            plugin_data_dir: default_plugin_data_dir(),
            metadata_filename: default_metadata_filename(),
            install_filename: default_install_filename(),
            package_prefix: default_package_prefix(),
            package_section: default_package_section(),
            fakeroot: default_fakeroot(),
            deb_builder: default_deb_builder(),
            max_dependency_depth: default_max_dependency_depth(),
        }
    }
}

impl BuildConfig {
    /// Native package name of the plugin `namespace/name`.
    pub fn package_name(&self, namespace: &str, name: &str) -> String {
        format!("{}-{}-{}", self.package_prefix, name, namespace)
    }
}

fn default_build_dir() -> String {
    "_pkg".to_string()
}

fn default_plugin_data_dir() -> String {
    "wazo".to_string()
}

fn default_metadata_filename() -> String {
    "wazo/plugin.toml".to_string()
}

fn default_install_filename() -> String {
    "wazo/rules".to_string()
}

fn default_package_prefix() -> String {
    "wazo-plugind".to_string()
}

fn default_package_section() -> String {
    "wazo-plugind-plugin".to_string()
}

fn default_fakeroot() -> String {
    "fakeroot".to_string()
}

fn default_deb_builder() -> String {
    "dpkg-deb".to_string()
}

fn default_max_dependency_depth() -> usize {
    8
}

/// Privileged worker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Command prefix used to gain privilege (empty when already root).
    #[serde(default = "default_privilege_command")]
    pub privilege_command: Vec<String>,

    /// Native package manager front-end.
    #[serde(default = "default_apt_get")]
    pub apt_get: String,

    /// Upper bound on a single privileged job, in seconds.
    #[serde(default = "default_worker_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            privilege_command: default_privilege_command(),
            apt_get: default_apt_get(),
            timeout_secs: default_worker_timeout_secs(),
        }
    }
}

impl WorkerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_privilege_command() -> Vec<String> {
    vec!["sudo".to_string(), "-n".to_string()]
}

fn default_apt_get() -> String {
    "apt-get".to_string()
}

fn default_worker_timeout_secs() -> u64 {
    600
}

/// Plugin market settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MarketConfig {
    /// Base URL of the market API.
    #[serde(default = "default_market_url")]
    pub url: String,

    /// HTTP timeout, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            url: default_market_url(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_market_url() -> String {
    "https://apps.wazo.community/0.0".to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

/// Platform configuration service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfdConfig {
    /// Base URL of the configuration service API.
    #[serde(default = "default_confd_url")]
    pub url: String,

    /// Authentication token sent as `X-Auth-Token`.
    #[serde(default)]
    pub token: Option<String>,

    /// Environment variable that overrides the queried platform version.
    #[serde(default = "default_version_env_var")]
    pub version_env_var: String,

    /// HTTP timeout, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ConfdConfig {
    fn default() -> Self {
        Self {
            url: default_confd_url(),
            token: None,
            version_env_var: default_version_env_var(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_confd_url() -> String {
    "https://localhost:9486/1.1".to_string()
}

fn default_version_env_var() -> String {
    "WAZO_VERSION".to_string()
}

/// Progress bus settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Exchange the progress events are published to.
    #[serde(default = "default_exchange_name")]
    pub exchange_name: String,

    /// Buffer of the in-process subscriber channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            exchange_name: default_exchange_name(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_exchange_name() -> String {
    "xivo".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

impl PlugindConfig {
    /// A configuration whose every directory lives under `root`.
    ///
    /// Used by tests and by `--root` style sandboxed runs.
    pub fn rooted_at(root: &Path) -> Self {
        let mut config = Self::default();
        config.paths.download_dir = root.join("downloads");
        config.paths.extract_dir = root.join("tmp");
        config.paths.metadata_dir = root.join("plugins");
        config.paths.template_dir = root.join("templates");
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_name_puts_name_before_namespace() {
        let build = BuildConfig::default();
        assert_eq!(build.package_name("official", "admin-ui"), "wazo-plugind-admin-ui-official");
    }

    #[test]
    fn debug_overrides_log_level() {
        let mut daemon = DaemonConfig::default();
        assert_eq!(daemon.effective_log_level(), "info");
        daemon.debug = true;
        assert_eq!(daemon.effective_log_level(), "debug");
    }

    #[test]
    fn rooted_config_keeps_directories_under_root() {
        let config = PlugindConfig::rooted_at(Path::new("/srv/test"));
        assert_eq!(config.paths.extract_dir, PathBuf::from("/srv/test/tmp"));
        assert_eq!(config.paths.metadata_dir, PathBuf::from("/srv/test/plugins"));
    }
}
