//! Error types for the PhoneBT client

use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client layer
#[derive(Debug, Error)]
pub enum ClientError {
    /// HFP engine error
    #[error("{0}")]
    Hfp(#[from] phonebt_hfp_core::HfpError),

    /// Tool input validation failure or unavailable capability
    #[error("{message}")]
    Tool { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Terminal or pipe I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Create a tool error
    pub fn tool(message: impl Into<String>) -> Self {
        Self::Tool { message: message.into() }
    }
}
