// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution of privileged jobs.

use async_trait::async_trait;
use plugind_config::model::WorkerConfig;
use plugind_core::{WorkerJob, WorkerRequest};
use tracing::{debug, error, info};

/// Runs one privileged job to completion and reports success.
#[async_trait]
pub trait JobExecutor: Send + Sync + 'static {
    async fn execute(&self, request: &WorkerRequest) -> bool;
}

/// Runs jobs through the native package manager, behind the configured
/// privilege command.
#[derive(Debug, Clone)]
pub struct AptExecutor {
    privilege_command: Vec<String>,
    apt_get: String,
}

impl AptExecutor {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            privilege_command: config.privilege_command.clone(),
            apt_get: config.apt_get.clone(),
        }
    }

    /// Full argument vector for `job`, privilege prefix included.
    pub fn command_line(&self, job: &WorkerJob) -> Vec<String> {
        let mut argv = self.privilege_command.clone();
        argv.push(self.apt_get.clone());
        match job {
            WorkerJob::Install { package_path } => {
                argv.extend(["install".to_string(), "-y".to_string()]);
                argv.push(package_path.display().to_string());
            }
            WorkerJob::Uninstall { package_name } => {
                argv.extend(["remove".to_string(), "-y".to_string()]);
                argv.push(package_name.clone());
            }
            WorkerJob::RefreshIndex => argv.push("update".to_string()),
        }
        argv
    }
}

#[async_trait]
impl JobExecutor for AptExecutor {
    async fn execute(&self, request: &WorkerRequest) -> bool {
        let argv = self.command_line(&request.job);
        let Some((program, args)) = argv.split_first() else {
            return false;
        };
        let uuid = request.correlation_id;
        info!(%uuid, operation = request.job.operation(), "running privileged job");

        let output = match tokio::process::Command::new(program)
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                error!(%uuid, program = %program, error = %e, "failed to spawn privileged command");
                return false;
            }
        };

        let cmd = argv.join(" ");
        if !output.stdout.is_empty() {
            debug!("[{uuid}] {cmd}\n==== STDOUT ====\n{}==== END ====", String::from_utf8_lossy(&output.stdout));
        }
        if !output.stderr.is_empty() {
            debug!("[{uuid}] {cmd}\n==== STDERR ====\n{}==== END ====", String::from_utf8_lossy(&output.stderr));
        }
        if !output.status.success() {
            error!(%uuid, command = %cmd, code = ?output.status.code(), "privileged command failed");
        }
        output.status.success()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn command_lines_include_privilege_prefix() {
        let executor = AptExecutor::new(&WorkerConfig::default());
        assert_eq!(
            executor.command_line(&WorkerJob::Install {
                package_path: PathBuf::from("/tmp/x/_pkg.deb")
            }),
            vec!["sudo", "-n", "apt-get", "install", "-y", "/tmp/x/_pkg.deb"]
        );
        assert_eq!(
            executor.command_line(&WorkerJob::Uninstall {
                package_name: "wazo-plugind-a-b".to_string()
            }),
            vec!["sudo", "-n", "apt-get", "remove", "-y", "wazo-plugind-a-b"]
        );
    }

    #[test]
    fn empty_privilege_command_runs_directly() {
        let config = WorkerConfig {
            privilege_command: Vec::new(),
            ..WorkerConfig::default()
        };
        let executor = AptExecutor::new(&config);
        assert_eq!(executor.command_line(&WorkerJob::RefreshIndex), vec!["apt-get", "update"]);
    }

    #[tokio::test]
    async fn exit_status_decides_success() {
        let request = WorkerRequest {
            correlation_id: uuid::Uuid::nil(),
            job: WorkerJob::RefreshIndex,
        };
        let succeeding = AptExecutor {
            privilege_command: Vec::new(),
            apt_get: "true".to_string(),
        };
        let failing = AptExecutor {
            privilege_command: Vec::new(),
            apt_get: "false".to_string(),
        };
        let missing = AptExecutor {
            privilege_command: Vec::new(),
            apt_get: "/nonexistent/apt-get".to_string(),
        };
        assert!(succeeding.execute(&request).await);
        assert!(!failing.execute(&request).await);
        assert!(!missing.execute(&request).await);
    }
}
