// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits at the seams of the installation pipeline.

pub mod catalog;
pub mod platform;
pub mod worker;

pub use catalog::Catalog;
pub use platform::PlatformInfo;
pub use worker::{PrivilegedWorker, WorkerHandle, WorkerJob, WorkerRequest};
