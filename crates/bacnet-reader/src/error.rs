//! Reader errors

use thiserror::Error;

use crate::transport::TransportError;

/// Errors produced by the reader's foreground operations
///
/// Public operations never propagate these as panics. Operations that return
/// a `Result` hand them back typed; the boolean/optional operations log them
/// and record the message in `Statistics::last_error`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReaderError {
    /// Session could not be opened, or was lost
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No response within the configured timeout
    #[error("Request timed out after {0:.1}s")]
    Timeout(f64),

    /// Response received but it carried no usable value
    #[error("Empty response for {0}")]
    EmptyResponse(String),

    /// Operation referenced a name that is not registered
    #[error("Unknown object: {0}")]
    UnknownObject(String),

    /// Value cannot be coerced to a protocol primitive
    #[error("Type conversion failed: {0}")]
    TypeConversion(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport collaborator error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ReaderError {
    /// Whether this error means an open session went away and must be reopened
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, ReaderError::Transport(TransportError::ConnectionClosed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_conversion() {
        let err: ReaderError = TransportError::ConnectionClosed.into();
        assert!(err.is_connection_lost());
        assert_eq!(err.to_string(), "Transport error: Connection closed");
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(
            ReaderError::Timeout(5.0).to_string(),
            "Request timed out after 5.0s"
        );
        assert!(!ReaderError::Timeout(5.0).is_connection_lost());
    }
}
