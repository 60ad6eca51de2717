//! Bounded subprocess execution
//!
//! Every run gets a hard wall-clock deadline and a cap on captured output.
//! Breaching either kills the child; whatever was read up to that point is
//! handed back inside the failure so callers can still parse it.

use super::{ResolvedInvocation, ToolFailure, ToolOutput};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::debug;

const READ_CHUNK: usize = 8192;

/// Environment forcing plain, unbuffered UTF-8 output from the tools
const SANITIZED_ENV: &[(&str, &str)] = &[
    ("NO_COLOR", "1"),
    ("FORCE_COLOR", "0"),
    ("TERM", "dumb"),
    ("RICH_NO_COLOR", "1"),
    ("PYTHONUNBUFFERED", "1"),
    ("PYTHONIOENCODING", "utf-8"),
    ("PYTHONUTF8", "1"),
];

/// Per-run bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

/// Stateless executor; each call is independent, no retries
#[derive(Debug, Clone, Default)]
pub struct ToolRunner;

impl ToolRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run `invocation` with `args`, optionally inside `cwd`
    pub async fn run(
        &self,
        invocation: &ResolvedInvocation,
        args: &[String],
        limits: RunLimits,
        cwd: Option<&Path>,
    ) -> Result<ToolOutput, ToolFailure> {
        if !invocation.available {
            return Err(ToolFailure::NotFound("tool is not available".to_string()));
        }

        let mut command = Command::new(&invocation.executable);
        command
            .args(&invocation.arg_prefix)
            .args(args)
            .envs(SANITIZED_ENV.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        debug!(
            executable = %invocation.executable.display(),
            args = ?args,
            timeout = ?limits.timeout,
            "Spawning tool"
        );

        let mut child = command.spawn().map_err(|e| {
            ToolFailure::NotFound(format!("{}: {}", invocation.executable.display(), e))
        })?;

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut out_buf: Vec<u8> = Vec::new();
        let mut err_buf: Vec<u8> = Vec::new();
        let mut out_chunk = [0u8; READ_CHUNK];
        let mut err_chunk = [0u8; READ_CHUNK];

        let deadline = tokio::time::sleep(limits.timeout);
        tokio::pin!(deadline);

        while stdout.is_some() || stderr.is_some() {
            tokio::select! {
                _ = &mut deadline => {
                    kill(&mut child).await;
                    return Err(ToolFailure::Timeout {
                        timeout: limits.timeout,
                        partial: to_output(out_buf, err_buf, None),
                    });
                }
                read = read_chunk(&mut stdout, &mut out_chunk), if stdout.is_some() => {
                    match read {
                        Ok(n) if n > 0 => out_buf.extend_from_slice(&out_chunk[..n]),
                        _ => stdout = None,
                    }
                }
                read = read_chunk(&mut stderr, &mut err_chunk), if stderr.is_some() => {
                    match read {
                        Ok(n) if n > 0 => err_buf.extend_from_slice(&err_chunk[..n]),
                        _ => stderr = None,
                    }
                }
            }

            if out_buf.len() + err_buf.len() > limits.max_output_bytes {
                kill(&mut child).await;
                out_buf.truncate(limits.max_output_bytes);
                err_buf.truncate(limits.max_output_bytes.saturating_sub(out_buf.len()));
                return Err(ToolFailure::OutputTooLarge {
                    limit: limits.max_output_bytes,
                    partial: to_output(out_buf, err_buf, None),
                });
            }
        }

        // Both pipes closed; the child may still be running
        let status = tokio::select! {
            _ = &mut deadline => {
                kill(&mut child).await;
                return Err(ToolFailure::Timeout {
                    timeout: limits.timeout,
                    partial: to_output(out_buf, err_buf, None),
                });
            }
            status = child.wait() => status,
        };

        let code = status.ok().and_then(|s| s.code());
        let output = to_output(out_buf, err_buf, code);

        debug!(
            executable = %invocation.executable.display(),
            exit_code = ?code,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "Tool finished"
        );

        if code == Some(0) {
            Ok(output)
        } else {
            Err(ToolFailure::NonZeroExit { code, output })
        }
    }
}

async fn read_chunk<R: AsyncRead + Unpin>(
    pipe: &mut Option<R>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match pipe {
        Some(reader) => reader.read(buf).await,
        None => Ok(0),
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!(error = %e, "Failed to kill tool process");
    }
}

fn to_output(stdout: Vec<u8>, stderr: Vec<u8>, exit_code: Option<i32>) -> ToolOutput {
    ToolOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code,
    }
}
