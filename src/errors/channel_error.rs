use thiserror::Error;

/// Failures of the persistent event channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The WebSocket could not be opened
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The server refused the namespace connect (bad token or API key)
    #[error("Connection rejected by server: {0}")]
    Rejected(String),

    /// An operation needed an open channel
    #[error("Channel not connected")]
    NotConnected,

    /// A frame could not be decoded during the handshake
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The handshake did not complete in time
    #[error("Operation timed out: {0}")]
    Timeout(String),
}
