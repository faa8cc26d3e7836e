use std::fmt;

use thiserror::Error;

use super::channel_error::ChannelError;

/// Credential that an operation required but the session did not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingCredential {
    ApiKey,
    BearerToken,
}

impl fmt::Display for MissingCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingCredential::ApiKey => write!(f, "API key not initialized"),
            MissingCredential::BearerToken => write!(f, "Not authenticated"),
        }
    }
}

/// Error type returned by every session operation.
///
/// The client never retries internally. Callers inspect [`ClientError::kind`]
/// to render a message and [`ClientError::is_retryable`] to decide whether
/// offering a manual retry of the failed step makes sense.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A step was invoked before the credential it needs was set
    #[error("Precondition failed: {0}")]
    Precondition(MissingCredential),

    /// The IAM endpoint rejected the client credentials (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Network failure, non-2xx status or undecodable response body
    #[error("Transport error{}: {message}", status_suffix(.status))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// Event channel failure
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Result type for session operations.
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub(crate) fn network(message: impl Into<String>) -> Self {
        ClientError::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub(crate) fn status(status: u16, message: impl Into<String>) -> Self {
        ClientError::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Short stable label for display.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Precondition(_) => "precondition",
            ClientError::Unauthorized(_) => "unauthorized",
            ClientError::Transport { .. } => "transport",
            ClientError::Channel(_) => "channel",
            ClientError::Configuration(_) => "configuration",
        }
    }

    /// Whether repeating the same step unchanged can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { .. } => true,
            ClientError::Channel(ChannelError::NotConnected) => false,
            ClientError::Channel(_) => true,
            ClientError::Precondition(_)
            | ClientError::Unauthorized(_)
            | ClientError::Configuration(_) => false,
        }
    }
}

impl From<MissingCredential> for ClientError {
    fn from(missing: MissingCredential) -> Self {
        ClientError::Precondition(missing)
    }
}
