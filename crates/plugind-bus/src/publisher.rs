// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The progress publisher.
//!
//! One background task owns the transport and publishes every event in the
//! order it was enqueued. Pipeline runs hold cheap [`StatusPublisher`] clones
//! and never wait on delivery: enqueueing is synchronous and unbounded.
//!
//! The process-wide instance is created once by [`init_global`]; concurrent
//! callers all observe the same instance and the same loop.

use std::sync::{Arc, OnceLock};

use plugind_core::{Operation, Status};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::event::{ProgressError, ProgressEvent};
use crate::transport::{BusTransport, Delivery};

#[derive(Debug)]
enum Command {
    Publish(ProgressEvent),
    Flush(oneshot::Sender<()>),
}

/// Handle for enqueueing progress events.
#[derive(Clone, Debug)]
pub struct StatusPublisher {
    tx: mpsc::UnboundedSender<Command>,
}

impl StatusPublisher {
    /// Starts the publishing loop on the current runtime.
    pub fn spawn(transport: Arc<dyn BusTransport>, exchange: impl Into<String>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(rx, transport, exchange.into()));
        (Self { tx }, handle)
    }

    pub fn install(&self, uuid: Uuid, status: Status) {
        self.enqueue(ProgressEvent::status(Operation::Install, uuid, status));
    }

    pub fn uninstall(&self, uuid: Uuid, status: Status) {
        self.enqueue(ProgressEvent::status(Operation::Uninstall, uuid, status));
    }

    pub fn install_error(&self, uuid: Uuid, error: ProgressError) {
        self.enqueue(ProgressEvent::error(Operation::Install, uuid, error));
    }

    pub fn uninstall_error(&self, uuid: Uuid, error: ProgressError) {
        self.enqueue(ProgressEvent::error(Operation::Uninstall, uuid, error));
    }

    /// Resolves once every event enqueued before the call has been handed
    /// to the transport.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    fn enqueue(&self, event: ProgressEvent) {
        if let Err(mpsc::error::SendError(Command::Publish(event))) = self.tx.send(Command::Publish(event)) {
            warn!(uuid = %event.uuid, status = %event.status, "publisher loop stopped, dropping event");
        }
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Command>, transport: Arc<dyn BusTransport>, exchange: String) {
    debug!(%exchange, "progress publisher started");
    while let Some(command) = rx.recv().await {
        match command {
            Command::Publish(event) => {
                let delivery = Delivery {
                    exchange: exchange.clone(),
                    routing_key: event.routing_key(),
                    message: event.to_message(),
                };
                debug!(routing_key = %delivery.routing_key, "publishing progress event");
                if let Err(e) = transport.publish(delivery).await {
                    warn!(uuid = %event.uuid, status = %event.status, error = %e, "failed to publish progress event");
                }
            }
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("progress publisher stopped");
}

static GLOBAL: OnceLock<StatusPublisher> = OnceLock::new();

/// Creates the process-wide publisher on first call; later calls return it
/// unchanged and drop their arguments. Must run inside a Tokio runtime.
pub fn init_global(transport: Arc<dyn BusTransport>, exchange: &str) -> &'static StatusPublisher {
    GLOBAL.get_or_init(|| StatusPublisher::spawn(transport, exchange).0)
}

/// The process-wide publisher, if initialised.
pub fn global() -> Option<&'static StatusPublisher> {
    GLOBAL.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::BroadcastTransport;

    #[tokio::test]
    async fn events_are_delivered_in_enqueue_order() {
        let transport = BroadcastTransport::new(16);
        let mut rx = transport.subscribe();
        let (publisher, _task) = StatusPublisher::spawn(Arc::new(transport), "plugins");
        let uuid = Uuid::new_v4();

        publisher.install(uuid, Status::Starting);
        publisher.install(uuid, Status::Downloading);
        publisher.install_error(
            uuid,
            ProgressError::new("downloading_error", "Downloading Error", Default::default()),
        );
        publisher.flush().await;

        let statuses: Vec<Status> = (0..3).map(|_| rx.try_recv().unwrap().message.data.status).collect();
        assert_eq!(statuses, vec![Status::Starting, Status::Downloading, Status::Error]);
    }

    #[tokio::test]
    async fn deliveries_use_the_configured_exchange() {
        let transport = BroadcastTransport::new(4);
        let mut rx = transport.subscribe();
        let (publisher, _task) = StatusPublisher::spawn(Arc::new(transport), "xivo");

        publisher.uninstall(Uuid::nil(), Status::Removing);
        publisher.flush().await;

        let delivery = rx.try_recv().unwrap();
        assert_eq!(delivery.exchange, "xivo");
        assert!(delivery.routing_key.starts_with("plugin.uninstall."));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_global_init_yields_one_instance() {
        let mut tasks = Vec::new();
        for _ in 0..8 {
            tasks.push(tokio::spawn(async {
                let publisher = init_global(Arc::new(BroadcastTransport::new(4)), "xivo");
                publisher as *const StatusPublisher as usize
            }));
        }
        let mut addresses = Vec::new();
        for task in tasks {
            addresses.push(task.await.unwrap());
        }
        addresses.dedup();
        assert_eq!(addresses.len(), 1);
        assert!(global().is_some());
    }
}
