//! Command and transfer channels.
//!
//! A [`CommandChannel`] wraps one `exec` channel and runs exactly one
//! command. A [`TransferChannel`] wraps an SFTP session and keeps a
//! client-side working directory, since SFTP itself has no `cd`.
//!
//! Both are reached through the [`ExecChannel`] and [`RemoteFs`] traits so
//! the executor and uploader can be exercised against in-memory doubles.

use std::io;

use async_trait::async_trait;
use russh::{Channel, ChannelMsg, client};
use russh_sftp::client::SftpSession;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::debug;

use crate::remote::error::{ChannelKind, Error, Result};
use crate::remote::types::ExecEvent;

/// A channel able to run one remote command.
#[async_trait]
pub trait ExecChannel: Send {
    /// Start `command` with standard input closed.
    async fn start(&mut self, command: &str) -> Result<()>;

    /// Wait for the next event. `None` once the channel is gone.
    async fn next_event(&mut self) -> Result<Option<ExecEvent>>;

    /// Close the channel. Idempotent and infallible.
    async fn close(&mut self);
}

/// File-system view of a transfer channel with a working directory.
///
/// Relative paths are resolved against [`RemoteFs::working_dir`].
#[async_trait]
pub trait RemoteFs: Send {
    /// Change the working directory. Fails unless `path` is an existing
    /// directory.
    async fn change_dir(&mut self, path: &str) -> Result<()>;

    /// Current absolute working directory.
    fn working_dir(&self) -> &str;

    /// Whether `path` exists and is a directory.
    async fn is_dir(&mut self, path: &str) -> Result<bool>;

    async fn make_dir(&mut self, path: &str) -> Result<()>;

    /// Write everything from `source` into the file `path`, replacing it.
    /// Returns the number of bytes written.
    async fn put(&mut self, source: &mut (dyn AsyncRead + Unpin + Send), path: &str)
    -> Result<u64>;

    /// End the transfer session. Idempotent and infallible.
    async fn close(&mut self);
}

/// Join a remote directory and a name without doubling the separator.
pub(crate) fn join_remote(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Resolve `path` against the working directory `cwd`.
pub(crate) fn resolve_remote(cwd: &str, path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        join_remote(cwd, path)
    }
}

/// An `exec` channel over a russh session.
///
/// The client never sees `CHANNEL_CLOSE` itself: the channel just ends.
/// Ending after EOF or an exit status is the normal finish; ending before
/// either means the transport went away mid-command.
pub struct CommandChannel {
    channel: Option<Channel<client::Msg>>,
    finished: bool,
}

impl CommandChannel {
    pub(crate) fn new(channel: Channel<client::Msg>) -> Self {
        Self {
            channel: Some(channel),
            finished: false,
        }
    }

    fn closed() -> Error {
        Error::channel(ChannelKind::Command, "channel is closed")
    }
}

#[async_trait]
impl ExecChannel for CommandChannel {
    async fn start(&mut self, command: &str) -> Result<()> {
        let channel = self.channel.as_ref().ok_or_else(Self::closed)?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::channel(ChannelKind::Command, format!("Failed to execute command: {}", e)))?;

        // Nothing is ever written to the process' standard input
        channel
            .eof()
            .await
            .map_err(|e| Error::channel(ChannelKind::Command, e))?;

        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<ExecEvent>> {
        let Some(channel) = self.channel.as_mut() else {
            return Ok(None);
        };

        loop {
            let event = match channel.wait().await {
                Some(ChannelMsg::Data { data }) => ExecEvent::Stdout(data.to_vec()),
                // ext == 1 is stderr in SSH protocol
                Some(ChannelMsg::ExtendedData { data, ext }) if ext == 1 => {
                    ExecEvent::Stderr(data.to_vec())
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    self.finished = true;
                    ExecEvent::ExitStatus(exit_status)
                }
                Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                    ExecEvent::ExitSignal(format!("{:?}", signal_name))
                }
                Some(ChannelMsg::Eof) => {
                    self.finished = true;
                    ExecEvent::Eof
                }
                Some(ChannelMsg::Close) => ExecEvent::Closed,
                Some(_) => continue,
                None if self.finished => return Ok(None),
                None => {
                    return Err(Error::ExecIo {
                        command: String::new(),
                        source: io::Error::new(
                            io::ErrorKind::ConnectionAborted,
                            "connection closed before the command finished",
                        ),
                    });
                }
            };
            return Ok(Some(event));
        }
    }

    async fn close(&mut self) {
        if let Some(channel) = self.channel.take()
            && let Err(e) = channel.close().await
        {
            debug!("Closing exec channel failed: {}", e);
        }
    }
}

/// An SFTP subsystem channel over a russh session.
pub struct TransferChannel {
    sftp: Option<SftpSession>,
    cwd: String,
}

impl TransferChannel {
    /// Wrap an initialized SFTP session, starting in the login directory.
    pub(crate) async fn open(sftp: SftpSession) -> Result<Self> {
        let cwd = sftp
            .canonicalize(".")
            .await
            .map_err(|e| Error::channel(ChannelKind::Transfer, e))?;
        Ok(Self {
            sftp: Some(sftp),
            cwd,
        })
    }

    fn session(&self, path: &str) -> Result<&SftpSession> {
        self.sftp
            .as_ref()
            .ok_or_else(|| Error::remote_io(path, "sftp channel is closed"))
    }
}

#[async_trait]
impl RemoteFs for TransferChannel {
    async fn change_dir(&mut self, path: &str) -> Result<()> {
        let target = resolve_remote(&self.cwd, path);
        let sftp = self.session(&target)?;

        let canonical = sftp
            .canonicalize(target.as_str())
            .await
            .map_err(|e| Error::remote_io(&target, e))?;
        let metadata = sftp
            .metadata(canonical.as_str())
            .await
            .map_err(|e| Error::remote_io(&canonical, e))?;
        if !metadata.is_dir() {
            return Err(Error::remote_io(canonical, "not a directory"));
        }

        self.cwd = canonical;
        Ok(())
    }

    fn working_dir(&self) -> &str {
        &self.cwd
    }

    async fn is_dir(&mut self, path: &str) -> Result<bool> {
        let target = resolve_remote(&self.cwd, path);
        let metadata = self
            .session(&target)?
            .metadata(target.as_str())
            .await
            .map_err(|e| Error::remote_io(&target, e))?;
        Ok(metadata.is_dir())
    }

    async fn make_dir(&mut self, path: &str) -> Result<()> {
        let target = resolve_remote(&self.cwd, path);
        self.session(&target)?
            .create_dir(target.as_str())
            .await
            .map_err(|e| Error::remote_io(&target, e))
    }

    async fn put(
        &mut self,
        source: &mut (dyn AsyncRead + Unpin + Send),
        path: &str,
    ) -> Result<u64> {
        let target = resolve_remote(&self.cwd, path);
        let mut file = self
            .session(&target)?
            .create(target.as_str())
            .await
            .map_err(|e| Error::remote_io(&target, e))?;

        let written = tokio::io::copy(source, &mut file)
            .await
            .map_err(|e| Error::remote_io(&target, e))?;
        file.shutdown()
            .await
            .map_err(|e| Error::remote_io(&target, e))?;

        Ok(written)
    }

    async fn close(&mut self) {
        if let Some(sftp) = self.sftp.take()
            && let Err(e) = sftp.close().await
        {
            debug!("Closing sftp session failed: {}", e);
        }
    }
}
