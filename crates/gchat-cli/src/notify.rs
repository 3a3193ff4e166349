//! Notification sink that pipes each answer into a shell command.

use async_trait::async_trait;
use gchat_core::NotificationSink;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[cfg(windows)]
const SHELL: (&str, &str) = ("cmd", "/C");
#[cfg(not(windows))]
const SHELL: (&str, &str) = ("sh", "-c");

/// Runs `command` through the platform shell with the answer on stdin,
/// e.g. `--notify 'notify-send gchat "$(cat)"'`.
pub struct CommandNotificationSink {
    command: String,
}

impl CommandNotificationSink {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn shell(&self) -> Command {
        let (program, flag) = SHELL;
        let mut cmd = Command::new(program);
        cmd.arg(flag).arg(&self.command);
        cmd
    }
}

#[async_trait]
impl NotificationSink for CommandNotificationSink {
    async fn notify(&self, text: &str) -> Result<(), String> {
        let mut child = self
            .shell()
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| format!("failed to start '{}': {}", self.command, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| format!("failed to write to '{}': {}", self.command, e))?;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| format!("failed to wait for '{}': {}", self.command, e))?;
        if status.success() {
            tracing::debug!(command = %self.command, "notification delivered");
            Ok(())
        } else {
            Err(format!("'{}' exited with {}", self.command, status))
        }
    }
}
