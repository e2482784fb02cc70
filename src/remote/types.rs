//! Result and event types shared by the executor, uploader and facade.

use std::path::PathBuf;

use serde::Serialize;

/// Whether the executor keeps the remote process' standard output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Standard output is read off the channel and dropped.
    Discard,
    /// Standard output is collected into [`ExecResult::captured_output`].
    Capture,
}

/// One message read off a command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    ExitStatus(u32),
    /// The process was terminated by a signal (signal name).
    ExitSignal(String),
    /// The remote side will send no more data.
    Eof,
    /// The channel was closed by the remote side.
    Closed,
}

/// Outcome of one remote command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecResult {
    pub succeeded: bool,
    /// -1 when the remote side never reported an exit status.
    pub exit_code: i32,
    pub captured_error_text: String,
    /// Empty unless the command ran with [`OutputMode::Capture`].
    pub captured_output: String,
}

impl ExecResult {
    pub(crate) fn new(exit_code: i32, stderr: &[u8], stdout: &[u8]) -> Self {
        Self {
            succeeded: exit_code == 0,
            exit_code,
            captured_error_text: String::from_utf8_lossy(stderr).into_owned(),
            captured_output: String::from_utf8_lossy(stdout).into_owned(),
        }
    }
}

/// A file that was skipped during a tree upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Summary of a tree upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub files_copied: usize,
    pub bytes_copied: u64,
    pub dirs_created: usize,
    pub failures: Vec<UploadFailure>,
}

impl UploadReport {
    /// True when no file was skipped.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
