// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Progress events for plugin install and uninstall runs, and the publisher
//! that delivers them to the bus.

pub mod event;
pub mod publisher;
pub mod transport;

pub use event::{BusMessage, ProgressData, ProgressError, ProgressEvent};
pub use publisher::{StatusPublisher, global, init_global};
pub use transport::{BroadcastTransport, BusTransport, Delivery, topic_matches};
