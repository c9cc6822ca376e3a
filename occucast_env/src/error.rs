//! Error types for the Occucast environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The receiving side of a channel has gone away
    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

impl EnvError {
    /// Creates a channel-closed error.
    pub fn closed(topic: impl std::fmt::Display) -> Self {
        Self::ChannelClosed(topic.to_string())
    }
}
