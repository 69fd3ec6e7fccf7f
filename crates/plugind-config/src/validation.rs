// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express: non-empty directories,
//! single-component directory names, usable URLs and non-zero limits.

use std::path::{Component, Path};

use crate::diagnostic::ConfigError;
use crate::model::PlugindConfig;

/// Validates a deserialized configuration.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &PlugindConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let directories = [
        ("paths.download_dir", &config.paths.download_dir),
        ("paths.extract_dir", &config.paths.extract_dir),
        ("paths.metadata_dir", &config.paths.metadata_dir),
        ("paths.template_dir", &config.paths.template_dir),
    ];
    for (key, dir) in directories {
        if dir.as_os_str().is_empty() {
            errors.push(validation(format!("{key} must not be empty")));
        }
    }

    if !is_single_component(&config.build.build_dir) {
        errors.push(validation(format!(
            "build.build_dir `{}` must be a single directory name",
            config.build.build_dir
        )));
    }

    let relative_paths = [
        ("build.plugin_data_dir", &config.build.plugin_data_dir),
        ("build.metadata_filename", &config.build.metadata_filename),
        ("build.install_filename", &config.build.install_filename),
    ];
    for (key, value) in relative_paths {
        let path = Path::new(value);
        if value.is_empty() || path.is_absolute() {
            errors.push(validation(format!("{key} must be a non-empty relative path, got `{value}`")));
        }
    }

    if config.build.package_prefix.trim().is_empty() {
        errors.push(validation("build.package_prefix must not be empty".to_string()));
    }

    if config.build.deb_builder.trim().is_empty() {
        errors.push(validation("build.deb_builder must not be empty".to_string()));
    }

    if config.build.max_dependency_depth == 0 {
        errors.push(validation("build.max_dependency_depth must be at least 1".to_string()));
    }

    if config.worker.timeout_secs == 0 {
        errors.push(validation("worker.timeout_secs must be at least 1".to_string()));
    }

    if config.worker.apt_get.trim().is_empty() {
        errors.push(validation("worker.apt_get must not be empty".to_string()));
    }

    for (key, value) in [("market.url", &config.market.url), ("confd.url", &config.confd.url)] {
        if let Err(e) = url::Url::parse(value) {
            errors.push(validation(format!("{key} `{value}` is not a valid URL: {e}")));
        }
    }

    if config.confd.version_env_var.trim().is_empty() {
        errors.push(validation("confd.version_env_var must not be empty".to_string()));
    }

    if config.bus.channel_capacity == 0 {
        errors.push(validation("bus.channel_capacity must be at least 1".to_string()));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn validation(message: String) -> ConfigError {
    ConfigError::Validation { message }
}

fn is_single_component(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
