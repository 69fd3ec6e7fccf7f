// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bus transports.
//!
//! A transport delivers one message to an exchange. Only the publisher loop
//! calls it, so implementations see publishes one at a time.

use async_trait::async_trait;
use plugind_core::PlugindError;
use tokio::sync::broadcast;

use crate::event::BusMessage;

/// A message as delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub exchange: String,
    pub routing_key: String,
    pub message: BusMessage,
}

#[async_trait]
pub trait BusTransport: Send + Sync + 'static {
    async fn publish(&self, delivery: Delivery) -> Result<(), PlugindError>;
}

/// In-process transport fanning deliveries out to broadcast subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastTransport {
    tx: broadcast::Sender<Delivery>,
}

impl BroadcastTransport {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl BusTransport for BroadcastTransport {
    async fn publish(&self, delivery: Delivery) -> Result<(), PlugindError> {
        // No subscriber is not a failure: events are fire-and-forget.
        let _ = self.tx.send(delivery);
        Ok(())
    }
}

/// Whether `routing_key` matches an AMQP-style topic `pattern`
/// (`*` is one word, `#` is zero or more words).
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    fn matches(pattern: &[&str], key: &[&str]) -> bool {
        match (pattern.split_first(), key.split_first()) {
            (None, None) => true,
            (Some((&"#", rest)), _) => {
                matches(rest, key) || key.split_first().is_some_and(|(_, k)| matches(pattern, k))
            }
            (Some((&"*", rest)), Some((_, k))) => matches(rest, k),
            (Some((p, rest)), Some((w, k))) => p == w && matches(rest, k),
            _ => false,
        }
    }
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches(&pattern, &key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_patterns() {
        assert!(topic_matches("plugin.install.#", "plugin.install.abc.starting"));
        assert!(topic_matches("plugin.*.abc.#", "plugin.uninstall.abc.completed"));
        assert!(topic_matches("#", "plugin.install.x.error"));
        assert!(!topic_matches("plugin.install.#", "plugin.uninstall.abc.starting"));
        assert!(!topic_matches("plugin.*", "plugin.install.abc"));
    }
}
