use std::fmt;

use crate::transport::ErrorCode;

/// Main error type for the ripple broadcast node
#[derive(Debug)]
pub enum RippleError {
    /// Configuration or CLI argument errors
    Config(String),

    /// Request body could not be decoded into the expected shape
    MalformedRequest(String),

    /// No handler registered for a message type
    NotSupported(String),

    /// Node identity requested before `init` arrived
    NotInitialized,

    /// A request to a peer was not answered in time
    Timeout(String),

    /// A peer answered a request with an `error` body
    Rpc { code: u32, text: String },

    /// Transport layer errors
    Transport(String),

    /// System I/O errors
    Io(std::io::Error),

    /// JSON serialization/deserialization errors
    Serialization(serde_json::Error),
}

impl fmt::Display for RippleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RippleError::Config(msg) => write!(f, "Configuration error: {}", msg),
            RippleError::MalformedRequest(msg) => write!(f, "Malformed request: {}", msg),
            RippleError::NotSupported(msg) => write!(f, "Not supported: {}", msg),
            RippleError::NotInitialized => write!(f, "Node has not received init"),
            RippleError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            RippleError::Rpc { code, text } => write!(f, "RPC error {}: {}", code, text),
            RippleError::Transport(msg) => write!(f, "Transport error: {}", msg),
            RippleError::Io(err) => write!(f, "I/O error: {}", err),
            RippleError::Serialization(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for RippleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RippleError::Io(err) => Some(err),
            RippleError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, RippleError>;

impl RippleError {
    /// Get the wire error code sent back to the requester for this error
    pub fn error_code(&self) -> ErrorCode {
        match self {
            RippleError::Timeout(_) => ErrorCode::Timeout,
            RippleError::NotSupported(_) => ErrorCode::NotSupported,
            RippleError::NotInitialized => ErrorCode::TemporarilyUnavailable,
            RippleError::MalformedRequest(_) => ErrorCode::MalformedRequest,
            RippleError::Serialization(_) => ErrorCode::MalformedRequest,
            RippleError::Rpc { code, .. } => ErrorCode::from(*code),
            RippleError::Config(_) | RippleError::Transport(_) | RippleError::Io(_) => {
                ErrorCode::Crash
            }
        }
    }
}

// Conversions from common error types
impl From<std::io::Error> for RippleError {
    fn from(err: std::io::Error) -> Self {
        RippleError::Io(err)
    }
}

impl From<serde_json::Error> for RippleError {
    fn from(err: serde_json::Error) -> Self {
        RippleError::Serialization(err)
    }
}

impl From<tokio::time::error::Elapsed> for RippleError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        RippleError::Timeout(err.to_string())
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::RippleError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::RippleError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! malformed_error {
    ($msg:expr) => {
        $crate::error::RippleError::MalformedRequest($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::RippleError::MalformedRequest(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! transport_error {
    ($msg:expr) => {
        $crate::error::RippleError::Transport($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::RippleError::Transport(format!($fmt, $($arg)*))
    };
}
