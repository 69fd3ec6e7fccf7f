// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline tests.
//!
//! `TestHarness` assembles the real `PluginService` over a temp directory
//! with mock collaborators: fixture fetching, a mock privileged executor
//! behind the real worker queue, a fixed catalog and platform version, and
//! a recording bus transport. External commands are real; packaging uses no
//! fakeroot wrapper and `true` as the archive builder.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use plugind_bus::{BusTransport, ProgressData, StatusPublisher};
use plugind_config::PlugindConfig;
use plugind_core::{
    Catalog, GitOptions, InstallRequest, MarketOptions, MarketPlugin, PlatformInfo, PlugindError, Status,
};
use plugind_pipeline::{Collaborators, DebianGenerator, PluginService};
use plugind_worker::{JobExecutor, RootWorker};
use uuid::Uuid;

use crate::fixture::{FixtureFetcher, FixturePlugin};
use crate::mock_catalog::{MockCatalog, StaticPlatform};
use crate::mock_worker::MockExecutor;
use crate::recording::RecordingTransport;

const TERMINAL_TIMEOUT: Duration = Duration::from_secs(20);

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    market: Vec<MarketPlugin>,
    market_fixtures: Vec<FixturePlugin>,
    wazo_version: String,
    failing: Vec<&'static str>,
    hanging: Vec<&'static str>,
    configure: Vec<Box<dyn FnOnce(&mut PlugindConfig)>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            market: Vec::new(),
            market_fixtures: Vec::new(),
            wazo_version: "17.10".to_string(),
            failing: Vec::new(),
            hanging: Vec::new(),
            configure: Vec::new(),
        }
    }

    /// Catalog entries served by the mock market.
    pub fn with_market(mut self, plugins: Vec<MarketPlugin>) -> Self {
        self.market = plugins;
        self
    }

    /// Fixture plugins written into the harness and served by the mock
    /// market, one version each.
    pub fn with_market_fixtures(mut self, plugins: &[FixturePlugin]) -> Self {
        self.market_fixtures.extend_from_slice(plugins);
        self
    }

    pub fn with_wazo_version(mut self, version: &str) -> Self {
        self.wazo_version = version.to_string();
        self
    }

    /// Makes the privileged worker fail every job of `operation`.
    pub fn with_failing_worker(mut self, operation: &'static str) -> Self {
        self.failing.push(operation);
        self
    }

    /// Makes the privileged worker never answer jobs of `operation`.
    pub fn with_hanging_worker(mut self, operation: &'static str) -> Self {
        self.hanging.push(operation);
        self
    }

    /// Adjusts the configuration after the harness defaults are applied.
    pub fn with_config(mut self, f: impl FnOnce(&mut PlugindConfig) + 'static) -> Self {
        self.configure.push(Box::new(f));
        self
    }

    /// Build the harness. Must run inside a Tokio runtime.
    pub fn build(self) -> Result<TestHarness, PlugindError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| PlugindError::io("failed to create temp dir", e))?;
        let fixtures = temp_dir.path().join("fixtures");

        let mut config = PlugindConfig::rooted_at(&temp_dir.path().join("var"));
        config.build.fakeroot = String::new();
        config.build.deb_builder = "true".to_string();
        config.worker.timeout_secs = 10;
        config.confd.version_env_var = "PLUGIND_HARNESS_WAZO_VERSION".to_string();
        for f in self.configure {
            f(&mut config);
        }
        let config = Arc::new(config);

        let executor = Arc::new(MockExecutor::new(&config));
        for operation in self.failing {
            executor.fail(operation);
        }
        for operation in self.hanging {
            executor.hang(operation);
        }
        let job_executor: Arc<dyn JobExecutor> = executor.clone();
        let (worker, _) = RootWorker::with_executor(job_executor);

        let transport = Arc::new(RecordingTransport::new());
        let bus: Arc<dyn BusTransport> = transport.clone();
        let (publisher, _) = StatusPublisher::spawn(bus, config.bus.exchange_name.clone());

        let mut market = self.market;
        for plugin in &self.market_fixtures {
            let path = plugin
                .write(&fixtures)
                .map_err(|e| PlugindError::io("failed to write fixture", e))?;
            market.push(plugin.market_entry(&path));
        }
        let catalog = Arc::new(MockCatalog::new(market));
        let shared_catalog: Arc<dyn Catalog> = catalog.clone();
        let platform: Arc<dyn PlatformInfo> = Arc::new(StaticPlatform::new(self.wazo_version));
        let fetcher = FixtureFetcher::new(&config, Arc::clone(&shared_catalog), Arc::clone(&platform))?;

        let collaborators = Collaborators {
            worker: Arc::new(worker),
            fetcher: Arc::new(fetcher),
            generator: Arc::new(DebianGenerator::new(&config)),
            catalog: shared_catalog,
            platform,
            publisher,
        };
        let service = PluginService::new(Arc::clone(&config), collaborators)?;

        Ok(TestHarness {
            service,
            transport,
            executor,
            catalog,
            config,
            fixtures,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete plugind stack over a temp directory.
pub struct TestHarness {
    pub service: PluginService,
    pub transport: Arc<RecordingTransport>,
    pub executor: Arc<MockExecutor>,
    pub catalog: Arc<MockCatalog>,
    pub config: Arc<PlugindConfig>,
    fixtures: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Writes a fixture tree and returns its path.
    pub fn fixture(&self, plugin: &FixturePlugin) -> Result<PathBuf, PlugindError> {
        plugin
            .write(&self.fixtures)
            .map_err(|e| PlugindError::io("failed to write fixture", e))
    }

    /// A git install request for a fixture.
    pub fn git_request(&self, plugin: &FixturePlugin) -> Result<InstallRequest, PlugindError> {
        let path = self.fixture(plugin)?;
        Ok(InstallRequest::Git(GitOptions::new(path.display().to_string())))
    }

    pub fn market_request(namespace: &str, name: &str) -> InstallRequest {
        InstallRequest::Market(MarketOptions::new(namespace, name))
    }

    /// Installs and waits for the terminal event; returns the id and statuses.
    pub async fn install(&self, request: InstallRequest) -> Result<(Uuid, Vec<Status>), PlugindError> {
        let uuid = self.service.install(request)?;
        Ok((uuid, self.wait(uuid).await))
    }

    pub async fn uninstall(&self, namespace: &str, name: &str) -> Result<(Uuid, Vec<Status>), PlugindError> {
        let uuid = self.service.uninstall(namespace, name)?;
        Ok((uuid, self.wait(uuid).await))
    }

    /// Statuses of a run, once it reached its terminal event.
    pub async fn wait(&self, uuid: Uuid) -> Vec<Status> {
        self.transport.wait_terminal(uuid, TERMINAL_TIMEOUT).await
    }

    /// The terminal event body of a finished run.
    pub async fn terminal_event(&self, uuid: Uuid) -> Option<ProgressData> {
        self.transport
            .events_for(uuid)
            .await
            .into_iter()
            .find(|e| e.status.is_terminal())
    }

    /// Whether any per-request scratch directory of `uuid` remains.
    pub fn has_scratch(&self, uuid: Uuid) -> bool {
        let id = uuid.to_string();
        [&self.config.paths.extract_dir, &self.config.paths.download_dir]
            .iter()
            .any(|dir| dir.join(&id).exists())
    }

    pub fn metadata_dir(&self) -> &Path {
        &self.config.paths.metadata_dir
    }
}
