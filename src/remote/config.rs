//! Connection configuration.
//!
//! Defaults are resolved with a three-tier priority system:
//!
//! 1. **Explicit value** - Set on the config by the caller (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SSH_PORT` | 22 | Server port |
//! | `SSH_CONNECT_TIMEOUT_MS` | 0 | Connect timeout in milliseconds (0 = no override) |
//! | `SSH_STRICT_HOST_KEY_CHECKING` | no | `yes`/`strict` verifies against known_hosts |
//! | `SSH_COMPRESSION` | true | Enable zlib compression |

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Default SSH port
pub(crate) const DEFAULT_PORT: u16 = 22;

/// Default connect timeout in milliseconds (0 means no override)
pub(crate) const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 0;

/// Environment variable name for the SSH port
pub(crate) const PORT_ENV_VAR: &str = "SSH_PORT";

/// Environment variable name for the connect timeout in milliseconds
pub(crate) const CONNECT_TIMEOUT_MS_ENV_VAR: &str = "SSH_CONNECT_TIMEOUT_MS";

/// Environment variable name for host key checking
pub(crate) const STRICT_HOST_KEY_CHECKING_ENV_VAR: &str = "SSH_STRICT_HOST_KEY_CHECKING";

/// Environment variable name for SSH compression
pub(crate) const COMPRESSION_ENV_VAR: &str = "SSH_COMPRESSION";

/// Credential used to authenticate.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credential {
    /// Password authentication.
    Password(String),
    /// Public key authentication with a passphrase-less private key file.
    KeyFile(PathBuf),
}

impl Credential {
    pub fn password(password: impl Into<String>) -> Self {
        Credential::Password(password.into())
    }

    pub fn key_file(path: impl Into<PathBuf>) -> Self {
        Credential::KeyFile(path.into())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.debug_tuple("Password").field(&"<redacted>").finish(),
            Credential::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
        }
    }
}

/// Server host key verification policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKeyPolicy {
    /// Only accept keys already present in known_hosts.
    Strict,
    /// Accept any host key (like `StrictHostKeyChecking=no`).
    #[default]
    Accept,
}

impl FromStr for HostKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "strict" | "true" => Ok(HostKeyPolicy::Strict),
            "no" | "accept" | "false" => Ok(HostKeyPolicy::Accept),
            other => Err(format!("Invalid host key policy: {}", other)),
        }
    }
}

/// Everything needed to open a session to one host.
///
/// Read-only once handed to [`crate::RemoteShell`].
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub credential: Credential,
    #[serde(default = "default_host_key_policy")]
    pub host_key_policy: HostKeyPolicy,
    /// known_hosts file used by [`HostKeyPolicy::Strict`]; the user's
    /// default file when unset.
    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,
    /// 0 means no override.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_compression")]
    pub compression: bool,
}

fn default_port() -> u16 {
    resolve_port(None)
}

fn default_host_key_policy() -> HostKeyPolicy {
    resolve_host_key_policy(None)
}

fn default_connect_timeout_ms() -> u64 {
    resolve_connect_timeout_ms(None)
}

fn default_compression() -> bool {
    resolve_compression(None)
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>, credential: Credential) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            user: user.into(),
            credential,
            host_key_policy: default_host_key_policy(),
            known_hosts_path: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            compression: default_compression(),
        }
    }

    /// Build a config from a `host:port` or `host` address.
    pub fn from_address(
        address: &str,
        user: impl Into<String>,
        credential: Credential,
    ) -> Result<Self, String> {
        let (host, port) = parse_address(address)?;
        let mut config = Self::new(host, user, credential);
        if let Some(port) = port {
            config.port = port;
        }
        Ok(config)
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    pub fn compression(mut self, compress: bool) -> Self {
        self.compression = compress;
        self
    }

    /// Connect timeout, `None` when no override is configured.
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }
}

/// Parse an address string into host and optional port.
///
/// IPv6 hosts are written in brackets when a port follows (`[::1]:22`);
/// `[::1]` and a bare `::1` are hosts without a port.
pub(crate) fn parse_address(address: &str) -> Result<(String, Option<u16>), String> {
    if let Some(bracketed) = address.strip_prefix('[') {
        let (host, rest) = bracketed
            .split_once(']')
            .ok_or_else(|| format!("Missing ']' in address: {}", address))?;
        return match rest {
            "" => Ok((host.to_string(), None)),
            rest => match rest.strip_prefix(':') {
                Some(port_str) => Ok((host.to_string(), Some(parse_port(port_str)?))),
                None => Err(format!("Unexpected text after ']' in address: {}", address)),
            },
        };
    }

    match address.rsplit_once(':') {
        // More than one colon without brackets is an IPv6 literal
        Some((host, _)) if host.contains(':') => Ok((address.to_string(), None)),
        Some((host, port_str)) => Ok((host.to_string(), Some(parse_port(port_str)?))),
        None => Ok((address.to_string(), None)),
    }
}

fn parse_port(port_str: &str) -> Result<u16, String> {
    port_str
        .parse::<u16>()
        .map_err(|e| format!("Invalid port number: {}", e))
}

/// Resolve the port with priority: parameter -> env var -> default
pub(crate) fn resolve_port(port_param: Option<u16>) -> u16 {
    if let Some(port) = port_param {
        return port;
    }

    if let Ok(env_port) = env::var(PORT_ENV_VAR)
        && let Ok(port) = env_port.parse::<u16>()
    {
        return port;
    }

    DEFAULT_PORT
}

/// Resolve the connect timeout with priority: parameter -> env var -> default
pub(crate) fn resolve_connect_timeout_ms(timeout_param: Option<u64>) -> u64 {
    if let Some(timeout) = timeout_param {
        return timeout;
    }

    if let Ok(env_timeout) = env::var(CONNECT_TIMEOUT_MS_ENV_VAR)
        && let Ok(timeout) = env_timeout.parse::<u64>()
    {
        return timeout;
    }

    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Resolve the host key policy with priority: parameter -> env var -> default (accept)
pub(crate) fn resolve_host_key_policy(policy_param: Option<HostKeyPolicy>) -> HostKeyPolicy {
    if let Some(policy) = policy_param {
        return policy;
    }

    if let Ok(env_policy) = env::var(STRICT_HOST_KEY_CHECKING_ENV_VAR)
        && let Ok(policy) = env_policy.parse::<HostKeyPolicy>()
    {
        return policy;
    }

    HostKeyPolicy::default()
}

/// Resolve the compression setting with priority: parameter -> env var -> default (true)
pub(crate) fn resolve_compression(compress_param: Option<bool>) -> bool {
    if let Some(compress) = compress_param {
        return compress;
    }

    if let Ok(env_compress) = env::var(COMPRESSION_ENV_VAR) {
        return env_compress.eq_ignore_ascii_case("true") || env_compress == "1";
    }

    true
}
