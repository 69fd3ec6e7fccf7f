// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the plugin installation daemon.
//!
//! Holds the error type, the domain types exchanged between crates, and the
//! traits for the collaborators the pipeline talks to (privileged worker,
//! market catalog, platform information).

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ConstraintId, FieldError, FieldErrors, PlugindError};
pub use traits::{Catalog, PlatformInfo, PrivilegedWorker, WorkerHandle, WorkerJob, WorkerRequest};
pub use types::{
    GitOptions, InstallRequest, MarketOptions, MarketPlugin, MarketVersion, Operation, PluginKey,
    Status,
};
