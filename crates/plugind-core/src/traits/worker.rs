// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The privileged worker boundary.
//!
//! Installing and removing native packages, and refreshing the package index,
//! are the only operations that mutate system package state. They are never
//! executed by the pipeline itself: the pipeline submits a [`WorkerRequest`]
//! and blocks on the returned [`WorkerHandle`] until the worker reports a
//! definitive result or the timeout elapses.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::PlugindError;

/// A privileged operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerJob {
    /// Install a built native package archive.
    Install { package_path: PathBuf },
    /// Remove an installed native package.
    Uninstall { package_name: String },
    /// Refresh the native package index.
    RefreshIndex,
}

impl WorkerJob {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Install { .. } => "install",
            Self::Uninstall { .. } => "uninstall",
            Self::RefreshIndex => "refresh_index",
        }
    }
}

/// A job tagged with the correlation id of the requesting pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRequest {
    pub correlation_id: Uuid,
    pub job: WorkerJob,
}

/// Completion handle for a submitted privileged job.
#[derive(Debug)]
pub struct WorkerHandle {
    operation: &'static str,
    result: oneshot::Receiver<bool>,
}

impl WorkerHandle {
    pub fn new(operation: &'static str, result: oneshot::Receiver<bool>) -> Self {
        Self { operation, result }
    }

    /// Returns a handle that is already resolved to `success`.
    pub fn ready(operation: &'static str, success: bool) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(success);
        Self::new(operation, rx)
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Waits for the worker's boolean result.
    ///
    /// A worker that drops the job without answering is an internal error.
    pub async fn wait(self, timeout: Duration) -> Result<bool, PlugindError> {
        match tokio::time::timeout(timeout, self.result).await {
            Ok(Ok(success)) => Ok(success),
            Ok(Err(_)) => Err(PlugindError::Internal(format!(
                "privileged worker dropped the `{}` job",
                self.operation
            ))),
            Err(_) => Err(PlugindError::Timeout { duration: timeout }),
        }
    }

    /// Waits for the result and turns `false` into [`PlugindError::Privileged`].
    pub async fn wait_success(self, timeout: Duration) -> Result<(), PlugindError> {
        let operation = self.operation;
        if self.wait(timeout).await? {
            Ok(())
        } else {
            Err(PlugindError::Privileged {
                operation: operation.to_string(),
            })
        }
    }
}

/// The sole component allowed to mutate installed native-package state.
pub trait PrivilegedWorker: Send + Sync + 'static {
    /// Enqueues a job and returns its completion handle without blocking.
    fn submit(&self, request: WorkerRequest) -> WorkerHandle;

    fn install(&self, correlation_id: Uuid, package_path: PathBuf) -> WorkerHandle {
        self.submit(WorkerRequest {
            correlation_id,
            job: WorkerJob::Install { package_path },
        })
    }

    fn uninstall(&self, correlation_id: Uuid, package_name: String) -> WorkerHandle {
        self.submit(WorkerRequest {
            correlation_id,
            job: WorkerJob::Uninstall { package_name },
        })
    }

    fn refresh_index(&self, correlation_id: Uuid) -> WorkerHandle {
        self.submit(WorkerRequest {
            correlation_id,
            job: WorkerJob::RefreshIndex,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_handle_resolves_immediately() {
        let handle = WorkerHandle::ready("install", true);
        assert!(handle.wait(Duration::from_millis(10)).await.unwrap());
    }

    #[tokio::test]
    async fn false_result_becomes_privileged_error() {
        let handle = WorkerHandle::ready("uninstall", false);
        let err = handle.wait_success(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, PlugindError::Privileged { ref operation } if operation == "uninstall"));
    }

    #[tokio::test]
    async fn dropped_sender_is_internal_error() {
        let (tx, rx) = oneshot::channel::<bool>();
        drop(tx);
        let err = WorkerHandle::new("install", rx)
            .wait(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, PlugindError::Internal(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_handle_times_out() {
        let (_tx, rx) = oneshot::channel::<bool>();
        let err = WorkerHandle::new("refresh_index", rx)
            .wait(Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, PlugindError::Timeout { .. }));
    }
}
