//! Transport error types

use std::fmt;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Error type for transport operations
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Nothing exists at the URI
    NotFound { uri: String },

    /// Access to the URI was refused
    PermissionDenied { uri: String },

    /// The URI could not be mapped onto this transport
    InvalidUri { uri: String, reason: String },

    /// The resource was retrieved but is not UTF-8 text
    InvalidUtf8 { uri: String },

    /// IO error
    Io { message: String },

    /// Custom error message
    Custom { message: String },
}

impl TransportError {
    /// The URI this error refers to, if any
    pub fn uri(&self) -> Option<&str> {
        match self {
            TransportError::NotFound { uri }
            | TransportError::PermissionDenied { uri }
            | TransportError::InvalidUri { uri, .. }
            | TransportError::InvalidUtf8 { uri } => Some(uri),
            TransportError::Io { .. } | TransportError::Custom { .. } => None,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::NotFound { uri } => write!(f, "Resource not found: {}", uri),
            TransportError::PermissionDenied { uri } => write!(f, "Access denied: {}", uri),
            TransportError::InvalidUri { uri, reason } => {
                write!(f, "Invalid URI '{}': {}", uri, reason)
            }
            TransportError::InvalidUtf8 { uri } => write!(f, "Resource is not UTF-8: {}", uri),
            TransportError::Io { message } => write!(f, "IO error: {}", message),
            TransportError::Custom { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = TransportError::NotFound {
            uri: "mem://lib/a.js".to_string(),
        };
        assert_eq!(err.to_string(), "Resource not found: mem://lib/a.js");
        assert_eq!(err.uri(), Some("mem://lib/a.js"));
    }

    #[test]
    fn test_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: TransportError = io.into();
        assert!(matches!(err, TransportError::Io { .. }));
        assert_eq!(err.uri(), None);
    }
}
