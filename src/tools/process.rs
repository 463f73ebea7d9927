//! Subprocess tool runner
//!
//! Spawns the tool with piped output in its own process group, so a
//! terminal Ctrl+C reaches the sequencer only. The sequencer then decides to
//! kill the child. The child is also `kill_on_drop`, so no exit path leaves
//! an instrument-control process running.

use std::io;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use super::{Interrupt, Invocation, ToolOutput, ToolRunner};
use crate::common::{Error, Result};

/// Runs tools as real child processes
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation, interrupt: &Interrupt) -> Result<ToolOutput> {
        tracing::debug!("Running {}", invocation.command_line());

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        #[cfg(windows)]
        {
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
            cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::tool_spawn(&invocation.description, e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let outcome = tokio::select! {
            result = collect(&mut child, stdout, stderr) => Some(result),
            _ = interrupt.triggered() => None,
        };

        let (status, output) = match outcome {
            Some(Ok(done)) => done,
            Some(Err(e)) => {
                let _ = child.kill().await;
                return Err(Error::tool_spawn(&invocation.description, e));
            }
            None => {
                tracing::warn!("Terminating tool: {}", invocation.description);
                let _ = child.kill().await;
                return Err(Error::Interrupted);
            }
        };

        tracing::debug!(
            "Tool [{}] exited with {}; stdout: {:?}",
            invocation.description,
            status,
            output.stdout.trim()
        );

        if !status.success() {
            let stderr = if output.stderr.trim().is_empty() {
                format!("exited with {}", status)
            } else {
                output.stderr.clone()
            };
            return Err(Error::tool_failed(&invocation.description, &stderr));
        }

        Ok(output)
    }
}

/// Wait for exit while draining both pipes
async fn collect<O, E>(
    child: &mut Child,
    stdout: Option<O>,
    stderr: Option<E>,
) -> io::Result<(ExitStatus, ToolOutput)>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let (status, stdout, stderr) =
        tokio::try_join!(child.wait(), read_pipe(stdout), read_pipe(stderr))?;
    Ok((status, ToolOutput { stdout, stderr }))
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<String> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
