//! Errors raised by the classification channel and its transports.

use thiserror::Error;

/// Result type alias for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Errors that can occur while connecting to or reading from the broker.
///
/// None of these reach the state machine: the channel records them in its
/// connection state and retries after a fixed backoff.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Connect + subscribe did not finish in time.
    #[error("Connection timeout after {0}ms")]
    ConnectTimeout(u64),

    /// Broker refused the connection.
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Established link went away.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Subscription was not acknowledged.
    #[error("Subscribe to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    /// Transport-level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid channel settings.
    #[error("Configuration error: {0}")]
    Config(#[from] tapngo_core::Error),

    /// Low-level I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rumqttc::ConnectionError> for ChannelError {
    fn from(error: rumqttc::ConnectionError) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<rumqttc::ClientError> for ChannelError {
    fn from(error: rumqttc::ClientError) -> Self {
        Self::Transport(error.to_string())
    }
}
