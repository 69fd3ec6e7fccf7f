// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock privileged job executor.
//!
//! `MockExecutor` plugs into the real `RootWorker` queue. It records every
//! job, fails the operations it is told to fail, and simulates the native
//! package manager by copying a staged package's plugin data into the
//! metadata directory on install and removing it on uninstall.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use plugind_config::PlugindConfig;
use plugind_core::{WorkerJob, WorkerRequest};
use plugind_plugin::PluginDb;
use plugind_worker::JobExecutor;

use crate::fixture::copy_tree;

pub struct MockExecutor {
    jobs: Mutex<Vec<WorkerRequest>>,
    failing: Mutex<HashSet<&'static str>>,
    hanging: Mutex<HashSet<&'static str>>,
    metadata_dir: PathBuf,
    build_dir: String,
    plugin_db: Option<PluginDb>,
}

impl MockExecutor {
    /// An executor simulating installs into `config.paths.metadata_dir`.
    pub fn new(config: &PlugindConfig) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            hanging: Mutex::new(HashSet::new()),
            metadata_dir: config.paths.metadata_dir.clone(),
            build_dir: config.build.build_dir.clone(),
            plugin_db: PluginDb::new(config).ok(),
        }
    }

    /// Makes every later job of `operation` (`install`, `uninstall`,
    /// `refresh_index`) report failure.
    pub fn fail(&self, operation: &'static str) {
        self.lock_failing().insert(operation);
    }

    /// Makes every later job of `operation` never answer.
    pub fn hang(&self, operation: &'static str) {
        self.hanging.lock().unwrap_or_else(|e| e.into_inner()).insert(operation);
    }

    /// Every job received so far, in order.
    pub fn jobs(&self) -> Vec<WorkerRequest> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Operations received so far, in order.
    pub fn operations(&self) -> Vec<&'static str> {
        self.jobs().iter().map(|r| r.job.operation()).collect()
    }

    fn lock_failing(&self) -> std::sync::MutexGuard<'_, HashSet<&'static str>> {
        self.failing.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copies `<pkgdir>/<metadata_dir>` over `metadata_dir`, where pkgdir is
    /// the archive path without its extension.
    fn simulate_install(&self, package_path: &Path) -> bool {
        let pkgdir = package_path.with_extension("");
        if pkgdir.file_name().and_then(|n| n.to_str()) != Some(self.build_dir.as_str()) {
            return false;
        }
        let staged = pkgdir.join(self.metadata_dir.strip_prefix("/").unwrap_or(&self.metadata_dir));
        copy_tree(&staged, &self.metadata_dir).is_ok()
    }

    fn simulate_uninstall(&self, package_name: &str) -> bool {
        let Some(key) = self.plugin_db.as_ref().and_then(|db| db.parse_package_name(package_name)) else {
            return false;
        };
        std::fs::remove_dir_all(self.metadata_dir.join(&key.namespace).join(&key.name)).is_ok()
    }
}

#[async_trait]
impl JobExecutor for MockExecutor {
    async fn execute(&self, request: &WorkerRequest) -> bool {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        if self.lock_failing().contains(request.job.operation()) {
            return false;
        }
        let hangs = self
            .hanging
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(request.job.operation());
        if hangs {
            std::future::pending::<()>().await;
        }
        match &request.job {
            WorkerJob::Install { package_path } => self.simulate_install(package_path),
            WorkerJob::Uninstall { package_name } => self.simulate_uninstall(package_name),
            WorkerJob::RefreshIndex => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn install_copies_staged_data_and_uninstall_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlugindConfig::rooted_at(dir.path());
        let executor = MockExecutor::new(&config);

        let extract = dir.path().join("build");
        let staged = extract
            .join("_pkg")
            .join(config.paths.metadata_dir.strip_prefix("/").unwrap())
            .join("official/admin-ui/wazo");
        std::fs::create_dir_all(&staged).unwrap();
        std::fs::write(staged.join("plugin.toml"), "name = \"admin-ui\"\n").unwrap();

        let install = WorkerRequest {
            correlation_id: Uuid::nil(),
            job: WorkerJob::Install {
                package_path: extract.join("_pkg.deb"),
            },
        };
        assert!(executor.execute(&install).await);
        let installed = config.paths.metadata_dir.join("official/admin-ui/wazo/plugin.toml");
        assert!(installed.exists());

        let uninstall = WorkerRequest {
            correlation_id: Uuid::nil(),
            job: WorkerJob::Uninstall {
                package_name: "wazo-plugind-admin-ui-official".to_string(),
            },
        };
        assert!(executor.execute(&uninstall).await);
        assert!(!installed.exists());
        assert_eq!(executor.operations(), vec!["install", "uninstall"]);
    }

    #[tokio::test]
    async fn failing_operations_report_false() {
        let dir = tempfile::tempdir().unwrap();
        let executor = MockExecutor::new(&PlugindConfig::rooted_at(dir.path()));
        executor.fail("refresh_index");
        let request = WorkerRequest {
            correlation_id: Uuid::nil(),
            job: WorkerJob::RefreshIndex,
        };
        assert!(!executor.execute(&request).await);
        assert_eq!(executor.jobs().len(), 1);
    }
}
