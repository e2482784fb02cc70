//! The operation-level facade.
//!
//! Every call on [`RemoteShell`] opens a fresh session with the channels it
//! needs, runs, and closes the command channel, the transfer channel and
//! the session, in that order, whatever the outcome. Any failure is
//! reported as a single [`Error::OperationFailed`] naming the operation and
//! its arguments.
//!
//! No state is shared between calls, so one `RemoteShell` (or many) can be
//! driven from concurrent tasks. Calls have no overall timeout; wrap them in
//! `tokio::time::timeout` when latency must be bounded.

use std::path::Path;

use tracing::{error, info};

use crate::remote::channel::{ExecChannel, RemoteFs};
use crate::remote::config::ConnectionConfig;
use crate::remote::error::{Error, Result};
use crate::remote::executor::execute_checked;
use crate::remote::session::{Connector, RemoteSession, SshConnector};
use crate::remote::types::{ExecResult, OutputMode, UploadReport};
use crate::remote::uploader::upload;

/// Replace Windows path separators so commands written on any platform run
/// on the remote host.
pub(crate) fn normalize_separators(text: &str) -> String {
    text.replace('\\', "/")
}

/// Runs commands on, and copies files to, one remote host.
pub struct RemoteShell<C = SshConnector> {
    config: ConnectionConfig,
    connector: C,
}

impl RemoteShell<SshConnector> {
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_connector(config, SshConnector)
    }
}

impl<C: Connector> RemoteShell<C> {
    pub fn with_connector(config: ConnectionConfig, connector: C) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Run `command`, failing unless it exits 0. Standard output is dropped.
    pub async fn exec(&self, command: &str) -> Result<()> {
        self.run_command("exec", command, OutputMode::Discard)
            .await
            .map(|_| ())
    }

    /// Run `command` and return its standard output.
    pub async fn exec_with_output(&self, command: &str) -> Result<String> {
        self.run_command("exec_with_output", command, OutputMode::Capture)
            .await
    }

    /// Upload the file or directory `local` into the remote directory
    /// `remote`, creating it if needed.
    pub async fn copy(&self, local: impl AsRef<Path>, remote: &str) -> Result<UploadReport> {
        let local = local.as_ref();
        let remote = normalize_separators(remote);
        info!(
            "Copying {} to {}:{}",
            local.display(),
            self.config.host,
            remote
        );

        let mut session = None;
        let mut transfer = None;
        let mut command = None;

        let result: Result<UploadReport> = async {
            let session = session.insert(self.connector.connect(&self.config).await?);
            let fs = transfer.insert(session.open_transfer_channel().await?);
            let commands = command.insert(session.open_command_channel().await?);
            upload(fs, commands, session.host(), local, &remote).await
        }
        .await;

        close_all(command, transfer, session).await;

        result.map_err(|e| {
            self.operation_failed(
                "copy",
                vec![local.display().to_string(), remote.clone()],
                e,
            )
        })
    }

    async fn run_command(
        &self,
        operation: &'static str,
        command: &str,
        mode: OutputMode,
    ) -> Result<String> {
        let command = normalize_separators(command);
        info!("Executing command on {}: {}", self.config.host, command);

        let mut session = None;
        let mut channel = None;

        let result: Result<ExecResult> = async {
            let session = session.insert(self.connector.connect(&self.config).await?);
            let channel = channel.insert(session.open_command_channel().await?);
            execute_checked(channel, session.host(), &command, mode).await
        }
        .await;

        close_all(channel, None::<<C::Session as RemoteSession>::Transfer>, session).await;

        result
            .map(|r| r.captured_output)
            .map_err(|e| self.operation_failed(operation, vec![command.clone()], e))
    }

    fn operation_failed(
        &self,
        operation: &'static str,
        arguments: Vec<String>,
        source: Error,
    ) -> Error {
        let err = Error::operation_failed(operation, arguments, source);
        error!("{} on {}: {}", operation, self.config.host, err);
        err
    }
}

/// Close whatever was opened: command channel, transfer channel, session.
async fn close_all<S: RemoteSession>(
    command: Option<S::Command>,
    transfer: Option<S::Transfer>,
    session: Option<S>,
) {
    if let Some(mut command) = command {
        command.close().await;
    }
    if let Some(mut transfer) = transfer {
        transfer.close().await;
    }
    if let Some(mut session) = session {
        session.close().await;
    }
}
