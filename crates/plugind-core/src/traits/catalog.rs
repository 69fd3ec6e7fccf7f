// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Market catalog collaborator.

use async_trait::async_trait;

use crate::error::PlugindError;
use crate::types::MarketPlugin;

/// Source of installable plugin entries.
#[async_trait]
pub trait Catalog: Send + Sync + 'static {
    /// Returns every plugin the catalog knows about.
    async fn plugins(&self) -> Result<Vec<MarketPlugin>, PlugindError>;
}
