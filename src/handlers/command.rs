// src/handlers/command.rs

//! Shell command job handler.

use std::process::Stdio;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::{GatedagError, Result};
use crate::handlers::registry::JobHandler;
use crate::handlers::JobContext;

#[derive(Debug, Deserialize)]
struct CommandConfig {
    cmd: String,
    #[serde(default)]
    env: Vec<(String, String)>,
    #[serde(default)]
    cwd: Option<String>,
}

/// Runs the configured command under the platform shell, capturing
/// stdout into the job output. Cancellation kills the child process.
#[derive(Debug, Default)]
pub struct CommandHandler;

impl CommandHandler {
    pub fn new() -> Self {
        Self
    }
}

impl JobHandler for CommandHandler {
    fn execute(&self, config: Value, ctx: JobContext) -> BoxFuture<'static, Result<Value>> {
        Box::pin(async move {
            let config: CommandConfig = serde_json::from_value(config).map_err(|err| {
                GatedagError::Config(format!("invalid command config: {err}"))
            })?;
            run_command(config, ctx).await
        })
    }
}

async fn run_command(config: CommandConfig, ctx: JobContext) -> Result<Value> {
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&config.cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&config.cmd);
        c
    };
    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &config.env {
        command.env(key, value);
    }
    if let Some(cwd) = &config.cwd {
        command.current_dir(cwd);
    }

    info!(execution = %ctx.execution_id, job = %ctx.job_id, cmd = %config.cmd, "running command");

    let mut child = command.spawn().map_err(|err| {
        GatedagError::HandlerExecution(format!("failed to spawn '{}': {err}", config.cmd))
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_task = tokio::spawn(async move {
        let mut lines = Vec::new();
        if let Some(stdout) = stdout {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                lines.push(line);
            }
        }
        lines
    });

    // Drain stderr so the child never blocks on a full pipe.
    let stderr_task = tokio::spawn(async move {
        if let Some(stderr) = stderr {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                debug!(stderr = %line, "command stderr");
            }
        }
    });

    let status = tokio::select! {
        _ = ctx.cancel.cancelled() => {
            warn!(job = %ctx.job_id, "cancelling running command");
            let _ = child.kill().await;
            return Err(GatedagError::JobCancelled(
                "execution cancelled".to_string(),
            ));
        }
        status = child.wait() => status.map_err(|err| {
            GatedagError::HandlerExecution(format!("failed to wait on command: {err}"))
        })?,
    };

    let stdout_lines = stdout_task.await.unwrap_or_default();
    let _ = stderr_task.await;

    let exit_code = status.code().unwrap_or(-1);
    if !status.success() {
        return Err(GatedagError::HandlerExecution(format!(
            "command '{}' exited with code {exit_code}",
            config.cmd
        )));
    }

    Ok(json!({
        "exit_code": exit_code,
        "stdout": stdout_lines.join("\n"),
        "success": true,
    }))
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let handler = CommandHandler::new();
        let output = handler
            .execute(json!({"cmd": "echo hello"}), JobContext::for_tests("exec-1", "cmd-job", std::collections::HashMap::new()))
            .await
            .unwrap();
        assert_eq!(output["exit_code"], 0);
        assert_eq!(output["stdout"], "hello");
        assert_eq!(output["success"], true);
    }

    #[tokio::test]
    async fn nonzero_exit_fails() {
        let handler = CommandHandler::new();
        let err = handler
            .execute(json!({"cmd": "exit 3"}), JobContext::for_tests("exec-1", "cmd-job", std::collections::HashMap::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, GatedagError::HandlerExecution(_)));
        assert!(err.to_string().contains("code 3"));
    }

    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let handler = CommandHandler::new();
        let ctx = JobContext::for_tests("exec-1", "cmd-job", std::collections::HashMap::new());
        let cancel = ctx.cancel.clone();

        let fut = handler.execute(json!({"cmd": "sleep 30"}), ctx);
        let task = tokio::spawn(fut);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, GatedagError::JobCancelled(_)));
    }

    #[tokio::test]
    async fn invalid_config_is_a_config_error() {
        let handler = CommandHandler::new();
        let err = handler
            .execute(json!({"nope": true}), JobContext::for_tests("exec-1", "cmd-job", std::collections::HashMap::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, GatedagError::Config(_)));
    }
}
