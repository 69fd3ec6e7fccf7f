// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The privileged worker: one task draining a job queue.
//!
//! Jobs run strictly one after another, so the host package manager never
//! sees two concurrent install/remove operations from this process.

use std::sync::Arc;

use plugind_config::model::WorkerConfig;
use plugind_core::{PrivilegedWorker, WorkerHandle, WorkerRequest};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::executor::{AptExecutor, JobExecutor};

struct Job {
    request: WorkerRequest,
    reply: oneshot::Sender<bool>,
}

/// Handle to the privileged job queue.
#[derive(Clone)]
pub struct RootWorker {
    tx: mpsc::UnboundedSender<Job>,
}

impl RootWorker {
    /// Starts a worker running jobs through the native package manager.
    pub fn spawn(config: &WorkerConfig) -> (Self, JoinHandle<()>) {
        Self::with_executor(Arc::new(AptExecutor::new(config)))
    }

    pub fn with_executor(executor: Arc<dyn JobExecutor>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(rx, executor));
        (Self { tx }, handle)
    }
}

impl PrivilegedWorker for RootWorker {
    fn submit(&self, request: WorkerRequest) -> WorkerHandle {
        let operation = request.job.operation();
        let (reply, result) = oneshot::channel();
        if self.tx.send(Job { request, reply }).is_err() {
            warn!(operation, "privileged worker stopped, rejecting job");
            return WorkerHandle::ready(operation, false);
        }
        WorkerHandle::new(operation, result)
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Job>, executor: Arc<dyn JobExecutor>) {
    while let Some(Job { request, reply }) = rx.recv().await {
        let success = executor.execute(&request).await;
        debug!(
            uuid = %request.correlation_id,
            operation = request.job.operation(),
            success,
            "privileged job finished"
        );
        let _ = reply.send(success);
    }
}
