//! Error taxonomy for remote shell operations.
//!
//! Low-level failures (`Connect`, `Channel`, `ExecIo`, `RemoteIo`, `LocalIo`)
//! and remote command failures (`CommandFailed`) are raised by the session,
//! executor and uploader. The facade wraps every one of them into a single
//! [`Error::OperationFailed`] carrying the operation name and its arguments,
//! keeping the wrapped error as the source.
//!
//! # Connect Failure Classification
//!
//! Connect errors are classified from their message into a
//! [`ConnectFailure`] so callers can tell a wrong password from an
//! unreachable host:
//!
//! 1. **Authentication** patterns are checked first and take precedence.
//! 2. **Host key** rejection patterns come next.
//! 3. **Timeout** and **network** patterns follow.
//! 4. Anything else is reported as a **handshake** failure.
//!
//! ```rust,ignore
//! assert_eq!(ConnectFailure::classify("Permission denied"), ConnectFailure::Authentication);
//! assert_eq!(ConnectFailure::classify("Connection refused"), ConnectFailure::Network);
//! assert_eq!(ConnectFailure::classify("Unknown server key"), ConnectFailure::HostKeyRejected);
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Authentication error patterns.
const AUTH_ERRORS: &[&str] = &[
    "authentication failed",
    "authentication rejected",
    "password authentication",
    "key authentication",
    "permission denied",
    "publickey",
    "auth fail",
    "no authentication",
    "failed to load private key",
];

/// Host key verification patterns.
const HOST_KEY_ERRORS: &[&str] = &[
    "unknown server key",
    "unknown key",
    "key changed",
    "host key",
];

/// Timeout patterns.
const TIMEOUT_ERRORS: &[&str] = &["timed out", "timeout"];

/// Network level patterns.
const NETWORK_ERRORS: &[&str] = &[
    "connection refused",
    "connection reset",
    "network is unreachable",
    "no route to host",
    "host is down",
    "temporary failure",
    "name or service not known",
    "failed to lookup address",
    "nodename nor servname",
    "broken pipe",
    "failed to connect",
];

/// Why a connection attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// The connect timeout elapsed.
    Timeout,
    /// DNS or TCP level failure.
    Network,
    /// The server host key was not accepted by the host key policy.
    HostKeyRejected,
    /// The server rejected the credential.
    Authentication,
    /// Any other transport/protocol failure during the handshake.
    Handshake,
}

impl ConnectFailure {
    /// Classify a connect error message.
    ///
    /// Matching is case-insensitive. Authentication patterns win over all
    /// others, so "timeout during authentication failed" is `Authentication`.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let matches = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

        if matches(AUTH_ERRORS) {
            ConnectFailure::Authentication
        } else if matches(HOST_KEY_ERRORS) {
            ConnectFailure::HostKeyRejected
        } else if matches(TIMEOUT_ERRORS) {
            ConnectFailure::Timeout
        } else if matches(NETWORK_ERRORS) {
            ConnectFailure::Network
        } else {
            ConnectFailure::Handshake
        }
    }
}

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectFailure::Timeout => write!(f, "timeout"),
            ConnectFailure::Network => write!(f, "network"),
            ConnectFailure::HostKeyRejected => write!(f, "host key rejected"),
            ConnectFailure::Authentication => write!(f, "authentication"),
            ConnectFailure::Handshake => write!(f, "handshake"),
        }
    }
}

/// Kind of logical channel over a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// `exec` channel for running a single command.
    Command,
    /// `sftp` subsystem channel.
    Transfer,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Command => write!(f, "exec"),
            ChannelKind::Transfer => write!(f, "sftp"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to connect to {host}:{port} ({kind}): {message}")]
    Connect {
        host: String,
        port: u16,
        kind: ConnectFailure,
        message: String,
    },

    #[error("failed to open {kind} channel: {message}")]
    Channel { kind: ChannelKind, message: String },

    #[error("failed to read error stream of command [{command}]: {source}")]
    ExecIo {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("host[{host}], command[{command}] failed with exit code {exit_code}, error output [{stderr}]")]
    CommandFailed {
        host: String,
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("remote operation on {path} failed: {message}")]
    RemoteIo { path: String, message: String },

    #[error("local operation on {} failed: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{operation} [{}] failed: {source}", arguments.join(", "))]
    OperationFailed {
        operation: &'static str,
        arguments: Vec<String>,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Build a connect error, classifying the message.
    pub(crate) fn connect(host: &str, port: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        Error::Connect {
            host: host.to_string(),
            port,
            kind: ConnectFailure::classify(&message),
            message,
        }
    }

    pub(crate) fn channel(kind: ChannelKind, message: impl fmt::Display) -> Self {
        Error::Channel {
            kind,
            message: message.to_string(),
        }
    }

    pub(crate) fn remote_io(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::RemoteIo {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn local_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Wrap an error with the facade operation that produced it.
    pub(crate) fn operation_failed(
        operation: &'static str,
        arguments: Vec<String>,
        source: Error,
    ) -> Self {
        Error::OperationFailed {
            operation,
            arguments,
            source: Box::new(source),
        }
    }

    /// Stable short code for business error reporting.
    ///
    /// Wrapped errors report the code of the failure they wrap.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Connect { .. } => "connect",
            Error::Channel { .. } => "channel",
            Error::ExecIo { .. } => "exec_io",
            Error::CommandFailed { .. } => "command_failed",
            Error::RemoteIo { .. } => "remote_io",
            Error::LocalIo { .. } => "local_io",
            Error::OperationFailed { source, .. } => source.code(),
        }
    }

    /// Exit code and captured error output if this is (or wraps) a failed
    /// remote command.
    ///
    /// Lets callers decide that e.g. `rm` reporting a missing file is fine.
    pub fn command_failure(&self) -> Option<(i32, &str)> {
        match self {
            Error::CommandFailed {
                exit_code, stderr, ..
            } => Some((*exit_code, stderr.as_str())),
            Error::OperationFailed { source, .. } => source.command_failure(),
            _ => None,
        }
    }

    /// Connect failure kind if this is (or wraps) a connect error.
    pub fn connect_failure(&self) -> Option<ConnectFailure> {
        match self {
            Error::Connect { kind, .. } => Some(*kind),
            Error::OperationFailed { source, .. } => source.connect_failure(),
            _ => None,
        }
    }
}
