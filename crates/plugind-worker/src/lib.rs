// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The privileged worker boundary.
//!
//! This crate is the only code path that runs the native package manager.

pub mod executor;
pub mod worker;

pub use executor::{AptExecutor, JobExecutor};
pub use worker::RootWorker;
