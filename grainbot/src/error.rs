//! Error types for the grain runtime and the bot front end.
//!
//! Cancellation is modelled as a variant at every layer rather than as a
//! separate channel, so callers can tell a deliberate stop apart from a
//! fault with [`is_cancelled`](DispatchError::is_cancelled).

use thiserror::Error;

/// Errors returned by grain calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrainError {
    /// The call's cancellation token fired before a result was produced.
    #[error("grain call cancelled")]
    Cancelled,

    /// The activation went away before replying.
    #[error("grain activation stopped before replying")]
    Deactivated,

    /// The grain itself reported a failure.
    #[error("grain call failed: {0}")]
    Failed(String),
}

impl GrainError {
    /// Whether this error is a cancellation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GrainError::Cancelled)
    }
}

/// Errors raised by the bot platform transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The operation was cancelled.
    #[error("transport operation cancelled")]
    Cancelled,

    /// Writing to or reading from the platform failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An outgoing or incoming payload could not be encoded or decoded.
    #[error("transport encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The platform rejected the request.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Errors from the upstream joke corpus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The upstream service could not be reached or answered with an error.
    #[error("joke source unavailable: {0}")]
    Unavailable(String),

    /// The requested joke does not exist.
    #[error("joke {0} not found")]
    NotFound(u64),
}

/// Errors raised by command handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler observed cancellation.
    #[error("command cancelled")]
    Cancelled,

    /// A grain call made by the handler failed.
    #[error(transparent)]
    Grain(#[from] GrainError),

    /// Replying through the transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Handler-specific failure.
    #[error("command failed: {0}")]
    Failed(String),
}

impl HandlerError {
    /// Whether this error is a cancellation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        match self {
            HandlerError::Cancelled => true,
            HandlerError::Grain(e) => e.is_cancelled(),
            HandlerError::Transport(TransportError::Cancelled) => true,
            _ => false,
        }
    }
}

/// Errors escaping the handling of a single update.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The session or call token was cancelled.
    #[error("update handling cancelled")]
    Cancelled,

    /// A command handler failed.
    #[error("command handler failed: {0}")]
    Handler(#[source] HandlerError),

    /// A grain call failed.
    #[error("grain call failed: {0}")]
    Grain(#[source] GrainError),

    /// Answering through the transport failed.
    #[error("transport failed: {0}")]
    Transport(#[source] TransportError),
}

impl DispatchError {
    /// Whether this error is a cancellation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DispatchError::Cancelled)
    }
}

impl From<HandlerError> for DispatchError {
    fn from(err: HandlerError) -> Self {
        if err.is_cancelled() {
            DispatchError::Cancelled
        } else {
            DispatchError::Handler(err)
        }
    }
}

impl From<GrainError> for DispatchError {
    fn from(err: GrainError) -> Self {
        if err.is_cancelled() {
            DispatchError::Cancelled
        } else {
            DispatchError::Grain(err)
        }
    }
}

impl From<TransportError> for DispatchError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Cancelled => DispatchError::Cancelled,
            other => DispatchError::Transport(other),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has a value outside its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_classification_crosses_layers() {
        let err: DispatchError = HandlerError::Grain(GrainError::Cancelled).into();
        assert!(err.is_cancelled());

        let err: DispatchError = HandlerError::Transport(TransportError::Cancelled).into();
        assert!(err.is_cancelled());

        let err: DispatchError = GrainError::Cancelled.into();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_faults_are_not_cancellation() {
        let err: DispatchError = HandlerError::Failed("boom".to_string()).into();
        assert!(!err.is_cancelled());
        assert!(err.to_string().contains("boom"));

        let err: DispatchError = GrainError::Deactivated.into();
        assert!(matches!(err, DispatchError::Grain(GrainError::Deactivated)));
    }
}
