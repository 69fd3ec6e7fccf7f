// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The pipeline engine.
//!
//! Drives one install or uninstall run from `starting` to a terminal state,
//! publishing a progress event before each step. Every failure is turned into
//! exactly one `error` event; an already-installed plugin ends the run early
//! with `completed`. The run's scratch directories are removed before the
//! terminal event is enqueued.
//!
//! Runs for the same plugin key queue on a per-key lock taken at `validating`
//! (the first point where the key is known) and held until the terminal event.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use plugind_bus::{ProgressError, StatusPublisher};
use plugind_config::PlugindConfig;
use plugind_core::{
    Catalog, InstallRequest, PlatformInfo, PluginKey, PlugindError, PrivilegedWorker, Status,
};
use plugind_plugin::{ConfdClient, MarketClient, PluginDb, WazoVersionFinder};
use tokio::sync::OwnedMutexGuard;
use tracing::Level;

use crate::builder::PackageBuilder;
use crate::context::{InstallContext, UninstallContext};
use crate::debian::{DebianGenerator, DescriptorGenerator};
use crate::fetch::{Fetcher, GitFetcher, MarketFetcher, SourceFetcher};
use crate::locks::KeyLocks;
use crate::validator::Validator;

/// Install steps after `starting`, in order.
pub const INSTALL_STEPS: [Status; 9] = [
    Status::Downloading,
    Status::Extracting,
    Status::Validating,
    Status::InstallingDependencies,
    Status::Building,
    Status::Packaging,
    Status::Updating,
    Status::Installing,
    Status::Cleaning,
];

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// The requested version was already installed; nothing was built.
    AlreadyInstalled,
    Failed,
}

impl RunOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Everything the engine talks to outside its own scratch directories.
#[derive(Clone)]
pub struct Collaborators {
    pub worker: Arc<dyn PrivilegedWorker>,
    pub fetcher: Arc<dyn Fetcher>,
    pub generator: Arc<dyn DescriptorGenerator>,
    pub catalog: Arc<dyn Catalog>,
    pub platform: Arc<dyn PlatformInfo>,
    pub publisher: StatusPublisher,
}

impl Collaborators {
    /// The HTTP market and confd clients, git fetching and the default
    /// Debian descriptor generator.
    pub fn production(
        config: &PlugindConfig,
        worker: Arc<dyn PrivilegedWorker>,
        publisher: StatusPublisher,
    ) -> Result<Self, PlugindError> {
        let catalog: Arc<dyn Catalog> = Arc::new(MarketClient::new(&config.market)?);
        let platform: Arc<dyn PlatformInfo> = Arc::new(ConfdClient::new(&config.confd)?);
        let git = GitFetcher::new(config);
        let market = MarketFetcher::new(
            Arc::clone(&catalog),
            PluginDb::new(config)?,
            WazoVersionFinder::new(&config.confd.version_env_var, Arc::clone(&platform)),
            git.clone(),
        );
        Ok(Self {
            worker,
            fetcher: Arc::new(SourceFetcher::new(git, market)),
            generator: Arc::new(DebianGenerator::new(config)),
            catalog,
            platform,
            publisher,
        })
    }

    pub(crate) fn version_finder(&self, config: &PlugindConfig) -> WazoVersionFinder {
        WazoVersionFinder::new(&config.confd.version_env_var, Arc::clone(&self.platform))
    }
}

pub struct PipelineEngine {
    config: Arc<PlugindConfig>,
    builder: PackageBuilder,
    plugin_db: PluginDb,
    worker: Arc<dyn PrivilegedWorker>,
    publisher: StatusPublisher,
    locks: KeyLocks,
}

impl PipelineEngine {
    pub fn new(config: Arc<PlugindConfig>, collaborators: &Collaborators) -> Result<Self, PlugindError> {
        let plugin_db = PluginDb::new(&config)?;
        let validator = Validator::new(plugin_db.clone(), collaborators.version_finder(&config));
        let builder = PackageBuilder::new(
            Arc::clone(&collaborators.fetcher),
            validator,
            Arc::clone(&collaborators.generator),
            Arc::clone(&collaborators.worker),
        );
        Ok(Self {
            config,
            builder,
            plugin_db,
            worker: Arc::clone(&collaborators.worker),
            publisher: collaborators.publisher.clone(),
            locks: KeyLocks::new(),
        })
    }

    /// Runs an install to its terminal state.
    pub async fn run_install(&self, mut ctx: InstallContext) -> RunOutcome {
        self.publisher.install(ctx.uuid, Status::Starting);

        let mut guard = None;
        let result = self.install_steps(&mut ctx, &mut guard).await;

        let outcome = match result {
            Ok(()) => {
                ctx.log(Level::INFO, "install completed");
                RunOutcome::Completed
            }
            Err((_, PlugindError::AlreadyInstalled { namespace, name })) => {
                ctx.log(Level::INFO, format_args!("{namespace}/{name} is already installed"));
                self.builder.clean(&ctx).await;
                RunOutcome::AlreadyInstalled
            }
            Err((step, error)) => {
                ctx.log(Level::ERROR, format_args!("error during {step}"));
                ctx.log(Level::DEBUG, format_args!("{error:?}"));
                self.builder.clean(&ctx).await;
                self.publisher.install_error(ctx.uuid, install_error(&ctx, step, &error));
                return RunOutcome::Failed;
            }
        };
        self.publisher.install(ctx.uuid, Status::Completed);
        drop(guard);
        outcome
    }

    /// Boxed entry point for dependency runs, which recurse into the engine.
    fn run_install_boxed(&self, ctx: InstallContext) -> Pin<Box<dyn Future<Output = RunOutcome> + Send + '_>> {
        Box::pin(self.run_install(ctx))
    }

    async fn install_steps(
        &self,
        ctx: &mut InstallContext,
        guard: &mut Option<OwnedMutexGuard<()>>,
    ) -> Result<(), (Status, PlugindError)> {
        for step in INSTALL_STEPS {
            self.publisher.install(ctx.uuid, step);
            if step == Status::Validating
                && let Some(key) = ctx.raw_metadata().ok().and_then(|raw| raw.key())
            {
                *guard = Some(self.lock_key(ctx, &key).await.map_err(|e| (step, e))?);
            }
            self.run_step(step, ctx).await.map_err(|e| (step, e))?;
        }
        Ok(())
    }

    async fn run_step(&self, step: Status, ctx: &mut InstallContext) -> Result<(), PlugindError> {
        match step {
            Status::Downloading => self.builder.download(ctx).await,
            Status::Extracting => self.builder.extract(ctx).await,
            Status::Validating => self.builder.validate(ctx).await,
            Status::InstallingDependencies => self.install_dependencies(ctx).await,
            Status::Building => self.builder.build(ctx).await,
            Status::Packaging => self.builder.package(ctx).await,
            Status::Updating => self.builder.update(ctx).await,
            Status::Installing => self.builder.install(ctx).await,
            Status::Cleaning => {
                self.builder.clean(ctx).await;
                Ok(())
            }
            other => Err(PlugindError::Internal(format!("`{other}` is not an install step"))),
        }
    }

    /// Takes the key lock for a run. Dependency runs give up after the worker
    /// timeout so that two plugins depending on each other, installed at the
    /// same time, fail instead of waiting forever.
    async fn lock_key(&self, ctx: &InstallContext, key: &PluginKey) -> Result<OwnedMutexGuard<()>, PlugindError> {
        if ctx.ancestors.contains(key) {
            return Err(cycle_error(&ctx.ancestors, key));
        }
        if ctx.depth() == 0 {
            return Ok(self.locks.lock(key).await);
        }
        let timeout = self.config.worker.timeout();
        tokio::time::timeout(timeout, self.locks.lock(key))
            .await
            .map_err(|_| PlugindError::Timeout { duration: timeout })
    }

    /// Installs every declared dependency that is not already satisfied, each
    /// in its own run with its own correlation id.
    async fn install_dependencies(&self, ctx: &mut InstallContext) -> Result<(), PlugindError> {
        let metadata = ctx.metadata()?;
        if metadata.depends.is_empty() {
            return Ok(());
        }

        let mut chain = ctx.ancestors.clone();
        chain.push(metadata.key());
        let max_depth = self.config.build.max_dependency_depth;
        if chain.len() > max_depth {
            return Err(PlugindError::Dependency {
                message: format!("dependency depth limit {max_depth} exceeded at {}", metadata.key()),
                source: None,
            });
        }

        for dependency in metadata.depends.clone() {
            let key = dependency.key();
            if chain.contains(&key) {
                return Err(cycle_error(&chain, &key));
            }
            if self
                .plugin_db
                .is_installed(&key.namespace, &key.name, dependency.version.as_deref())
            {
                ctx.log(Level::DEBUG, format_args!("dependency {key} already installed"));
                continue;
            }

            let child = InstallContext::new(Arc::clone(&ctx.config), InstallRequest::Market(dependency))
                .with_ancestors(chain.clone());
            let child_uuid = child.uuid;
            ctx.log(Level::INFO, format_args!("installing dependency {key} ({child_uuid})"));
            if self.run_install_boxed(child).await == RunOutcome::Failed {
                return Err(PlugindError::Dependency {
                    message: format!("dependency {key} failed to install ({child_uuid})"),
                    source: None,
                });
            }
        }
        Ok(())
    }

    /// Runs an uninstall to its terminal state.
    pub async fn run_uninstall(&self, ctx: UninstallContext) -> RunOutcome {
        self.publisher.uninstall(ctx.uuid, Status::Starting);
        let _guard = self.locks.lock(&ctx.key).await;

        self.publisher.uninstall(ctx.uuid, Status::Removing);
        let result = self
            .worker
            .uninstall(ctx.uuid, ctx.package_name.clone())
            .wait_success(self.config.worker.timeout())
            .await;

        match result {
            Ok(()) => {
                ctx.log(Level::INFO, format_args!("{} uninstalled", ctx.key));
                self.publisher.uninstall(ctx.uuid, Status::Completed);
                RunOutcome::Completed
            }
            Err(error) => {
                ctx.log(Level::ERROR, format_args!("error during {}", Status::Removing));
                ctx.log(Level::DEBUG, format_args!("{error:?}"));
                self.publisher.uninstall_error(
                    ctx.uuid,
                    ProgressError::new(Status::Removing.error_id(), Status::Removing.error_message(), ctx.details()),
                );
                RunOutcome::Failed
            }
        }
    }
}

fn cycle_error(chain: &[PluginKey], key: &PluginKey) -> PlugindError {
    let path: Vec<String> = chain.iter().chain(std::iter::once(key)).map(ToString::to_string).collect();
    PlugindError::Dependency {
        message: format!("dependency cycle: {}", path.join(" -> ")),
        source: None,
    }
}

/// The public error payload for a failed install step.
fn install_error(ctx: &InstallContext, step: Status, error: &PlugindError) -> ProgressError {
    let mut details = ctx.details();
    match error {
        PlugindError::Validation { errors } => {
            for (field, field_error) in errors.iter() {
                details.insert(
                    field.clone(),
                    serde_json::to_value(field_error).unwrap_or(serde_json::Value::Null),
                );
            }
            ProgressError::new("validation_error", "Validation error", details)
        }
        _ => ProgressError::new(step.error_id(), step.error_message(), details),
    }
}
