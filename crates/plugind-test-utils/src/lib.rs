// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for plugind integration tests.
//!
//! Provides mock collaborators and a harness that runs the real pipeline
//! against fixture plugin trees, without network access, root privileges or
//! a native package manager.
//!
//! # Components
//!
//! - [`MockExecutor`] - privileged job executor that records jobs and simulates installs
//! - [`MockCatalog`] / [`StaticPlatform`] - fixed market catalog and platform version
//! - [`RecordingTransport`] - bus transport capturing every delivery
//! - [`FixturePlugin`] / [`FixtureFetcher`] - plugin source trees on disk
//! - [`TestHarness`] - the assembled service

pub mod fixture;
pub mod harness;
pub mod mock_catalog;
pub mod mock_worker;
pub mod recording;

pub use fixture::{FixtureFetcher, FixturePlugin};
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_catalog::{MockCatalog, StaticPlatform};
pub use mock_worker::MockExecutor;
pub use recording::RecordingTransport;
