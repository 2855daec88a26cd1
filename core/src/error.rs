use std::fmt;
use thiserror::Error;

/// The error type for metersign operations
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<anyhow::Error>,
}

/// The kind of error that occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A handshake step did not return the fields it must return; terminal
    /// once the retry budget is spent
    AuthorizationFailed,

    /// Credentials exist but are invalid/malformed
    CredentialInvalid,

    /// Cache path exists but is not a directory, or cannot be created
    CacheInvalid,

    /// Configuration error (missing fields, invalid values)
    ConfigInvalid,

    /// Request cannot be signed or built (missing required fields, etc.)
    RequestInvalid,

    /// No meter in the catalog matches the requested identifier
    MeterNotFound,

    /// The meter catalog could not be fetched within the retry budget
    CatalogUnavailable,

    /// Unexpected errors (network, I/O, service errors, etc.)
    Unexpected,
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Check if this error is terminal for session construction
    pub fn is_authorization_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::AuthorizationFailed | ErrorKind::CredentialInvalid
        )
    }
}

// Convenience constructors
impl Error {
    /// Create an authorization failed error
    pub fn authorization_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthorizationFailed, message)
    }

    /// Create a credential invalid error
    pub fn credential_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CredentialInvalid, message)
    }

    /// Create a cache invalid error
    pub fn cache_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CacheInvalid, message)
    }

    /// Create a config invalid error
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Create a request invalid error
    pub fn request_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestInvalid, message)
    }

    /// Create a meter not found error
    pub fn meter_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MeterNotFound, message)
    }

    /// Create a catalog unavailable error
    pub fn catalog_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CatalogUnavailable, message)
    }

    /// Create an unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::AuthorizationFailed => write!(f, "authorization failed"),
            ErrorKind::CredentialInvalid => write!(f, "invalid credentials"),
            ErrorKind::CacheInvalid => write!(f, "invalid cache directory"),
            ErrorKind::ConfigInvalid => write!(f, "invalid configuration"),
            ErrorKind::RequestInvalid => write!(f, "invalid request"),
            ErrorKind::MeterNotFound => write!(f, "meter not found"),
            ErrorKind::CatalogUnavailable => write!(f, "meter catalog unavailable"),
            ErrorKind::Unexpected => write!(f, "unexpected error"),
        }
    }
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

// Common From implementations
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(err)
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(err: http::uri::InvalidUri) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUriParts> for Error {
    fn from(err: http::uri::InvalidUriParts) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::ToStrError> for Error {
    fn from(err: http::header::ToStrError) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}
