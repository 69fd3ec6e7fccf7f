// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Version and compatibility validation of extracted plugins.

use plugind_core::PlugindError;
use plugind_plugin::{PluginDb, PluginMetadata, RawMetadata, WazoVersionFinder};
use tracing::debug;

pub struct Validator {
    plugin_db: PluginDb,
    version_finder: WazoVersionFinder,
}

impl Validator {
    pub fn new(plugin_db: PluginDb, version_finder: WazoVersionFinder) -> Self {
        Self {
            plugin_db,
            version_finder,
        }
    }

    /// Validates metadata against the running platform.
    ///
    /// Fails with `Validation` on schema or bound violations and with
    /// `AlreadyInstalled` when this exact version is already installed.
    pub async fn validate(&self, raw: &RawMetadata) -> Result<PluginMetadata, PlugindError> {
        let current_version = self.version_finder.get_version().await?;
        debug!(%current_version, "validating plugin metadata");

        let metadata = raw.validate(&current_version)?;
        if self
            .plugin_db
            .is_installed(&metadata.namespace, &metadata.name, Some(&metadata.version))
        {
            return Err(PlugindError::AlreadyInstalled {
                namespace: metadata.namespace,
                name: metadata.name,
            });
        }
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use plugind_config::PlugindConfig;
    use plugind_core::PlatformInfo;

    use super::*;

    struct FixedPlatform;

    #[async_trait]
    impl PlatformInfo for FixedPlatform {
        async fn wazo_version(&self) -> Result<String, PlugindError> {
            Ok("17.10".to_string())
        }
    }

    fn validator(config: &PlugindConfig) -> Validator {
        Validator::new(
            PluginDb::new(config).unwrap(),
            WazoVersionFinder::new("PLUGIND_TEST_UNSET_VERSION", Arc::new(FixedPlatform)),
        )
    }

    const DOC: &str = "namespace = \"official\"\nname = \"admin-ui\"\nversion = \"1.0\"\n";

    #[tokio::test]
    async fn same_version_installed_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlugindConfig::rooted_at(dir.path());
        let raw = RawMetadata::parse(DOC).unwrap();
        assert!(validator(&config).validate(&raw).await.is_ok());

        let installed = config
            .paths
            .metadata_dir
            .join("official/admin-ui")
            .join(&config.build.metadata_filename);
        std::fs::create_dir_all(installed.parent().unwrap()).unwrap();
        std::fs::write(&installed, DOC).unwrap();

        assert!(matches!(
            validator(&config).validate(&raw).await,
            Err(PlugindError::AlreadyInstalled { .. })
        ));

        let upgrade = RawMetadata::parse(&DOC.replace("1.0", "1.1")).unwrap();
        assert!(validator(&config).validate(&upgrade).await.is_ok());
    }

    #[tokio::test]
    async fn bound_violation_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlugindConfig::rooted_at(dir.path());
        let raw = RawMetadata::parse(&format!("{DOC}max_wazo_version = \"17.01\"\n")).unwrap();
        assert!(matches!(
            validator(&config).validate(&raw).await,
            Err(PlugindError::Validation { .. })
        ));
    }
}
