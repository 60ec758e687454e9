//! Sequential hand-off of template commands to an execution facility.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::process::Command;

const DEFAULT_SHELL: &str = "/bin/sh";

/// Completion status reported by an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandExit {
    pub exit_code: Option<i32>,
}

/// Invocation failure for a single command.
#[derive(Debug, Error)]
pub enum CommandExecutionError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("executor rejected command '{0}'")]
    Rejected(String),
}

/// Process-execution capability. Receives each command string verbatim.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &str) -> Result<CommandExit, CommandExecutionError>;
}

/// Runs each command as `<shell> -c <command>` with null stdio.
#[derive(Debug, Clone)]
pub struct ShellCommandExecutor {
    shell: PathBuf,
}

impl Default for ShellCommandExecutor {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
        }
    }
}

impl ShellCommandExecutor {
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl CommandExecutor for ShellCommandExecutor {
    async fn execute(&self, command: &str) -> Result<CommandExit, CommandExecutionError> {
        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|source| CommandExecutionError::Spawn {
                program: self.shell.display().to_string(),
                source,
            })?;
        Ok(CommandExit {
            exit_code: status.code(),
        })
    }
}

/// Logs commands instead of running them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunCommandExecutor;

#[async_trait]
impl CommandExecutor for DryRunCommandExecutor {
    async fn execute(&self, command: &str) -> Result<CommandExit, CommandExecutionError> {
        tracing::info!(command, "dry-run command executor skipped template command");
        Ok(CommandExit { exit_code: None })
    }
}

/// Records every invocation; optionally fails selected commands.
#[derive(Debug, Default)]
pub struct RecordingCommandExecutor {
    invocations: Mutex<Vec<String>>,
    failing: HashSet<String>,
}

impl RecordingCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor that returns an error for each command in `commands`.
    pub fn failing_on<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            invocations: Mutex::new(Vec::new()),
            failing: commands.into_iter().map(Into::into).collect(),
        }
    }

    pub fn invocations(&self) -> Vec<String> {
        match self.invocations.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl CommandExecutor for RecordingCommandExecutor {
    async fn execute(&self, command: &str) -> Result<CommandExit, CommandExecutionError> {
        match self.invocations.lock() {
            Ok(mut guard) => guard.push(command.to_string()),
            Err(poisoned) => poisoned.into_inner().push(command.to_string()),
        }
        if self.failing.contains(command) {
            return Err(CommandExecutionError::Rejected(command.to_string()));
        }
        Ok(CommandExit { exit_code: Some(0) })
    }
}

/// Which commands were handed to the executor, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchLog {
    pub commands: Vec<String>,
    /// Invocations the executor could not run.
    pub failed: usize,
}

impl DispatchLog {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

/// Dispatches command lists one at a time through a shared executor.
#[derive(Clone)]
pub struct CommandDispatcher {
    executor: Arc<dyn CommandExecutor>,
}

impl CommandDispatcher {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    pub fn shell() -> Self {
        Self::new(Arc::new(ShellCommandExecutor::default()))
    }

    /// Awaits each command before starting the next. Individual failures are
    /// counted and skipped; exit status and output are discarded.
    pub async fn dispatch(&self, commands: &[String]) -> DispatchLog {
        let mut log = DispatchLog::default();
        for (index, command) in commands.iter().enumerate() {
            log.commands.push(command.clone());
            match self.executor.execute(command).await {
                Ok(exit) => {
                    tracing::debug!(index, exit_code = ?exit.exit_code, "template command finished");
                }
                Err(error) => {
                    log.failed += 1;
                    tracing::debug!(index, %error, "template command failed");
                }
            }
        }
        log
    }
}
