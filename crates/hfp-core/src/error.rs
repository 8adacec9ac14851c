//! Error types for HFP engine operations

use thiserror::Error;

/// Result type alias for HFP engine operations
pub type HfpResult<T> = Result<T, HfpError>;

/// Errors produced by the HFP protocol engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HfpError {
    /// Operation requires an established service-level connection
    #[error("Not connected to an audio gateway")]
    NotConnected,

    /// A command precondition was violated (bad argument, wrong state)
    #[error("Command failed: {reason}")]
    CommandFailed { reason: String },

    /// SLC setup was rejected, lost during establishment, or timed out
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    /// The underlying platform call returned a non-success status
    #[error("Transport error: status {code}")]
    TransportError { code: i32 },
}

impl HfpError {
    /// Create a command failed error
    pub fn command_failed(reason: impl Into<String>) -> Self {
        Self::CommandFailed { reason: reason.into() }
    }

    /// Create a connection failed error
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        Self::ConnectionFailed { reason: reason.into() }
    }

    /// Check if error is recoverable (a retry may succeed)
    ///
    /// Drives the retry loop in [`recovery`](crate::recovery): transient
    /// link failures are worth another attempt, precondition violations are
    /// not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HfpError::ConnectionFailed { .. } | HfpError::TransportError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_failures_are_recoverable() {
        assert!(HfpError::connection_failed("timed out").is_recoverable());
        assert!(HfpError::TransportError { code: -5 }.is_recoverable());
    }

    #[test]
    fn precondition_failures_are_not() {
        assert!(!HfpError::NotConnected.is_recoverable());
        assert!(!HfpError::command_failed("bad digit").is_recoverable());
    }
}
