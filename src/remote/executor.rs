//! Command execution protocol.
//!
//! A command runs on its own [`ExecChannel`] with standard input closed.
//! Standard error is appended to the result and logged chunk by chunk as it
//! arrives; standard output is kept only with [`OutputMode::Capture`].
//!
//! Waiting is event driven: each wait for the next channel event is bounded
//! by [`POLL_INTERVAL`], and an elapsed interval simply waits again. The loop
//! only ends on channel close, or on EOF once the exit status is known, so
//! every byte of error output sent before the process exited has already
//! been drained by then. There is no overall timeout.
//!
//! Success is decided by the exit code alone, never by the error output.

use std::time::Duration;

use tracing::{info, trace, warn};

use crate::remote::channel::ExecChannel;
use crate::remote::error::{Error, Result};
use crate::remote::types::{ExecEvent, ExecResult, OutputMode};

/// Upper bound on a single wait for the next channel event
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Exit code reported when the remote side never sent an exit status
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Run `command` on `channel` and collect its result.
///
/// A nonzero exit code is not an error here; see [`execute_checked`].
pub async fn execute<C>(channel: &mut C, command: &str, mode: OutputMode) -> Result<ExecResult>
where
    C: ExecChannel + ?Sized,
{
    channel.start(command).await?;

    let mut stderr = Vec::with_capacity(1024);
    let mut stdout = Vec::new();
    let mut exit_code: Option<i32> = None;

    loop {
        let event = match tokio::time::timeout(POLL_INTERVAL, channel.next_event()).await {
            Ok(event) => event.map_err(|e| match e {
                Error::ExecIo { source, .. } => Error::ExecIo {
                    command: command.to_string(),
                    source,
                },
                other => other,
            })?,
            Err(_) => {
                trace!("Still waiting for [{}]", command);
                continue;
            }
        };

        match event {
            Some(ExecEvent::Stderr(data)) => {
                info!("{}", String::from_utf8_lossy(&data).trim_end());
                stderr.extend_from_slice(&data);
            }
            Some(ExecEvent::Stdout(data)) => {
                if mode == OutputMode::Capture {
                    stdout.extend_from_slice(&data);
                }
            }
            Some(ExecEvent::ExitStatus(status)) => {
                exit_code = Some(status as i32);
            }
            Some(ExecEvent::ExitSignal(signal)) => {
                warn!("Command [{}] terminated by signal {}", command, signal);
            }
            Some(ExecEvent::Eof) => {
                // No data can follow EOF
                if exit_code.is_some() {
                    break;
                }
            }
            Some(ExecEvent::Closed) | None => break,
        }
    }

    Ok(ExecResult::new(
        exit_code.unwrap_or(UNKNOWN_EXIT_CODE),
        &stderr,
        &stdout,
    ))
}

/// Run `command` and fail with [`Error::CommandFailed`] unless it exits 0.
///
/// Whether a failure is acceptable (e.g. deleting something already gone)
/// is the caller's call; nothing is retried.
pub async fn execute_checked<C>(
    channel: &mut C,
    host: &str,
    command: &str,
    mode: OutputMode,
) -> Result<ExecResult>
where
    C: ExecChannel + ?Sized,
{
    let result = execute(channel, command, mode).await?;
    if result.succeeded {
        return Ok(result);
    }

    Err(Error::CommandFailed {
        host: host.to_string(),
        command: command.to_string(),
        exit_code: result.exit_code,
        stderr: result.captured_error_text,
    })
}
