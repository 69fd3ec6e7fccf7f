// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External command execution with output logging.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use plugind_core::PlugindError;
use tracing::Level;
use uuid::Uuid;

use crate::context::log_with_id;

/// An external command run on behalf of one pipeline run.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
}

impl ShellCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    /// Runs `program` through `wrapper` (e.g. `fakeroot`); an empty wrapper
    /// runs it directly.
    pub fn wrapped(wrapper: &str, program: impl Into<OsString>) -> Self {
        if wrapper.is_empty() {
            Self::new(program)
        } else {
            Self::new(wrapper).arg(program)
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs the command to completion. A non-zero exit is an error.
    pub async fn run(&self, uuid: Uuid) -> Result<(), PlugindError> {
        let cmd = self.command_line();
        log_with_id(uuid, Level::DEBUG, format_args!("running {cmd}"));

        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }

        let output = command.output().await.map_err(|e| {
            log_with_id(uuid, Level::ERROR, format_args!("failed to spawn {cmd}: {e}"));
            PlugindError::Command {
                program: self.program.to_string_lossy().into_owned(),
                code: None,
                stderr: e.to_string(),
            }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.is_empty() {
            log_with_id(uuid, Level::DEBUG, format_args!("{cmd}\n==== STDOUT ====\n{stdout}==== END ===="));
        }
        if !stderr.is_empty() {
            log_with_id(uuid, Level::DEBUG, format_args!("{cmd}\n==== STDERR ====\n{stderr}==== END ===="));
        }

        if output.status.success() {
            Ok(())
        } else {
            log_with_id(
                uuid,
                Level::ERROR,
                format_args!("{cmd} exited with {:?}", output.status.code()),
            );
            Err(PlugindError::Command {
                program: self.program.to_string_lossy().into_owned(),
                code: output.status.code(),
                stderr: stderr.into_owned(),
            })
        }
    }
}
