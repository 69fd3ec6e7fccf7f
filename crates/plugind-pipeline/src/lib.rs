// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The install/uninstall pipeline.
//!
//! [`PluginService`] accepts requests and schedules runs; [`PipelineEngine`]
//! drives each run through its steps, delegating the work of each step to the
//! [`PackageBuilder`] and privileged operations to the worker.

pub mod builder;
pub mod context;
pub mod debian;
pub mod engine;
pub mod fetch;
pub mod locks;
pub mod service;
pub mod shell;
pub mod validator;

pub use builder::PackageBuilder;
pub use context::{InstallContext, UninstallContext, log_with_id};
pub use debian::{DebianGenerator, DescriptorGenerator, DescriptorVars};
pub use engine::{Collaborators, INSTALL_STEPS, PipelineEngine, RunOutcome};
pub use fetch::{Fetcher, GitFetcher, MarketFetcher, SourceFetcher};
pub use locks::KeyLocks;
pub use service::PluginService;
pub use shell::ShellCommand;
pub use validator::Validator;
