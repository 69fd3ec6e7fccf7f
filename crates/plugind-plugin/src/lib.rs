// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin knowledge for plugind: versions, metadata, the installed-plugin
//! database, the market catalog and the platform version.

pub mod installed;
pub mod market;
pub mod metadata;
pub mod platform;
pub mod version;

pub use installed::{InstalledPlugin, PluginDb};
pub use market::{MarketClient, MarketDb, MarketPluginUpdater, MarketProxy, select_version};
pub use metadata::{PluginMetadata, RawMetadata};
pub use platform::{ConfdClient, WazoVersionFinder};
pub use version::{LooseVersion, VersionConstraint, VersionError, less_than};
