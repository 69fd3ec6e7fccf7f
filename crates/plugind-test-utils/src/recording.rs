// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bus transport capturing every delivery for assertions.

use std::time::Duration;

use async_trait::async_trait;
use plugind_bus::{BusTransport, Delivery, ProgressData};
use plugind_core::{PlugindError, Status};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct RecordingTransport {
    deliveries: Mutex<Vec<Delivery>>,
    notify: Notify,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().await.clone()
    }

    /// Event bodies of one correlation id, in delivery order.
    pub async fn events_for(&self, uuid: Uuid) -> Vec<ProgressData> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter(|d| d.message.data.uuid == uuid)
            .map(|d| d.message.data.clone())
            .collect()
    }

    pub async fn statuses(&self, uuid: Uuid) -> Vec<Status> {
        self.events_for(uuid).await.into_iter().map(|e| e.status).collect()
    }

    /// Waits until a terminal event for `uuid` was delivered and returns every
    /// status of that run.
    ///
    /// # Panics
    ///
    /// Panics if no terminal event arrives within `timeout`.
    pub async fn wait_terminal(&self, uuid: Uuid, timeout: Duration) -> Vec<Status> {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                let statuses = self.statuses(uuid).await;
                if statuses.iter().any(|s| s.is_terminal()) {
                    return statuses;
                }
                notified.await;
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(statuses) => statuses,
            Err(_) => panic!(
                "no terminal event for {uuid} within {timeout:?}; got {:?}",
                self.statuses(uuid).await
            ),
        }
    }
}

#[async_trait]
impl BusTransport for RecordingTransport {
    async fn publish(&self, delivery: Delivery) -> Result<(), PlugindError> {
        self.deliveries.lock().await.push(delivery);
        self.notify.notify_waiters();
        Ok(())
    }
}
