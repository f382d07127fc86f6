//! Error types for the NovaVPN control plane

use std::time::Duration;

use thiserror::Error;

/// Main error type for NovaVPN
#[derive(Error, Debug)]
pub enum VpnError {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Address pool errors
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Tunnel peer errors
    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("server not found: {code}")]
    ServerNotFound { code: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// System I/O errors
    #[error("System error: {0}")]
    System(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid config format at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Invalid base64 key: {field}")]
    InvalidKey { field: String },

    #[error("Invalid IP address: {value}")]
    InvalidAddress { value: String },

    #[error("Invalid CIDR notation: {value}")]
    InvalidCidr { value: String },

    #[error("Invalid port in {field}: {value}")]
    InvalidPort { field: String, value: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Subnet {subnet} has no usable client addresses")]
    SubnetTooSmall { subnet: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Address pool errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("address pool exhausted for {subnet}")]
    Exhausted { subnet: String },
}

/// Errors from the tunneling control plane (`wg` command)
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("failed to add peer {public_key}: {reason}")]
    AddFailed { public_key: String, reason: String },

    #[error("failed to remove peer {public_key}: {reason}")]
    RemoveFailed { public_key: String, reason: String },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed: {output}")]
    CommandFailed { command: String, output: String },
}

/// Error categories exposed to callers of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Exhausted,
    ExternalOperationFailed,
    InvalidRequest,
    Internal,
}

impl VpnError {
    /// Build an `InvalidRequest` error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SessionNotFound { .. } | Self::ServerNotFound { .. } => ErrorKind::NotFound,
            Self::Pool(PoolError::Exhausted { .. }) => ErrorKind::Exhausted,
            Self::Peer(_) => ErrorKind::ExternalOperationFailed,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Self::Config(_) | Self::System(_) => ErrorKind::Internal,
        }
    }

    /// Get a user-friendly error message with suggested action
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(ConfigError::MissingField { field }) if field == "SERVER_ENDPOINT" => {
                "SERVER_ENDPOINT must be set to the server's public IP or hostname.".to_string()
            }

            Self::Config(ConfigError::MissingField { field }) if field == "SERVER_PUBLIC_KEY" => {
                "Server public key not found.\n  \
                Set SERVER_PUBLIC_KEY or SERVER_PRIVATE_KEY, or make sure the WireGuard interface is up."
                    .to_string()
            }

            Self::Config(ConfigError::InvalidKey { field }) => {
                format!(
                    "Invalid {} in config. Expected 32-byte base64-encoded key.",
                    field
                )
            }

            Self::Peer(PeerError::Spawn { .. }) => {
                "Could not run the `wg` command.\n  \
                Install wireguard-tools and run with CAP_NET_ADMIN."
                    .to_string()
            }

            _ => format!("{}", self),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::Peer(_) => 3,
            _ => 255,
        }
    }
}

/// Result type alias for NovaVPN operations
pub type Result<T> = std::result::Result<T, VpnError>;
