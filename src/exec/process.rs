// src/exec/process.rs

//! Subprocess-backed action invoker.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::exec::backend::{ActionInvoker, ActionOutcome, ActionRequest};
use crate::exec::template::{placeholders, render, CommandTable};

/// Runs the configured command template for each request through the shell,
/// bounded by a timeout.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    commands: CommandTable,
    timeout: Duration,
}

impl ProcessInvoker {
    pub fn new(commands: CommandTable, timeout: Duration) -> Self {
        Self { commands, timeout }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(
            CommandTable::from_config(cfg),
            Duration::from_secs(cfg.config.action_timeout_seconds),
        )
    }

    async fn run(&self, request: ActionRequest) -> Result<ActionOutcome> {
        let template = self
            .commands
            .command_for(&request)
            .ok_or_else(|| anyhow!("no command configured for {} actions", request.kind))?;
        let cmd_line = render(template, &request);

        info!(action = %request, cmd = %cmd_line, "starting action process");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&cmd_line);

        for (name, value) in placeholders(&request) {
            cmd.env(format!("FORCEWATCH_{}", name.to_uppercase()), value);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for {request}"))?;

        // Output goes to debug logs, line by line.
        let label = request.to_string();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, label.clone(), "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, label.clone(), "stderr");
        }

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => {
                let status = status.with_context(|| format!("waiting for process of {label}"))?;
                let code = status.code().unwrap_or(-1);
                info!(
                    action = %label,
                    exit_code = code,
                    success = status.success(),
                    "action process exited"
                );
                if status.success() {
                    Ok(ActionOutcome::Succeeded)
                } else {
                    Ok(ActionOutcome::Failed(code))
                }
            }
            Err(_) => {
                warn!(
                    action = %label,
                    timeout_secs = self.timeout.as_secs(),
                    "action exceeded its timeout; killing process"
                );
                if let Err(e) = child.kill().await {
                    warn!(action = %label, error = %e, "failed to kill timed-out process");
                }
                Ok(ActionOutcome::TimedOut)
            }
        }
    }
}

impl ActionInvoker for ProcessInvoker {
    fn invoke(
        &mut self,
        request: ActionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ActionOutcome>> + Send + '_>> {
        Box::pin(self.run(request))
    }
}

fn forward_lines<R>(reader: R, label: String, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(action = %label, stream, "{}", line);
        }
    });
}
