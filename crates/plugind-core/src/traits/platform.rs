// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform information collaborator.

use async_trait::async_trait;

use crate::error::PlugindError;

/// Reports facts about the host platform.
#[async_trait]
pub trait PlatformInfo: Send + Sync + 'static {
    /// The running platform version (e.g. `"17.10"`).
    async fn wazo_version(&self) -> Result<String, PlugindError>;
}
