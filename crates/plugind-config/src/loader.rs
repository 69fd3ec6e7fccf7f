// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `/etc/plugind/plugind.toml`
//! 3. `~/.config/plugind/plugind.toml`
//! 4. `./plugind.toml`
//! 5. `PLUGIND_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PlugindConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/plugind/plugind.toml";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "plugind.toml";

/// Sections recognised in `PLUGIND_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &["daemon", "paths", "build", "worker", "market", "confd", "bus"];

/// User configuration file under the XDG config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("plugind/plugind.toml"))
}

/// Builds the full figment: defaults, file hierarchy, environment.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PlugindConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Loads configuration from the file hierarchy with environment overrides.
pub fn load_config() -> Result<PlugindConfig, figment::Error> {
    build_figment().extract()
}

/// Loads configuration from defaults plus an inline TOML document.
pub fn load_config_from_str(toml_content: &str) -> Result<PlugindConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PlugindConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Loads configuration from one explicit file, with environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<PlugindConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PlugindConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment provider mapping `PLUGIND_BUILD_FAKEROOT` to `build.fakeroot`.
///
/// Only the first underscore after a known section name becomes a dot, so keys
/// that themselves contain underscores (`build.max_dependency_depth`) survive.
fn env_provider() -> Env {
    Env::prefixed("PLUGIND_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        ENV_SECTIONS
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or(key_str)
            .into()
    })
}
