//! Exchange-specific error types
//!
//! Every failure carries a human readable message for logs; programmatic
//! handling matches on [`ExchangeError::kind`], which sees through the
//! [`ExchangeError::Context`] wrapper added at the REST boundary.

use thiserror::Error;

/// Result type for exchange operations
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Exchange operation errors
#[derive(Error, Debug, Clone)]
pub enum ExchangeError {
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("Venue error {code}: {message}")]
    VenueError { code: String, message: String },

    #[error("Unknown pair: {0}")]
    UnknownPair(String),

    #[error("Precision unknown: {0}")]
    PrecisionUnknown(String),

    #[error("Unknown venue: {0}")]
    UnknownVenue(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Signing error: {0}")]
    SigningError(String),

    #[error("Feature not supported: {0}")]
    FeatureNotSupported(String),

    #[error("Fixed point error: {0}")]
    FixedPointError(String),

    #[error("{venue} {operation}: {source}")]
    Context {
        venue: String,
        operation: String,
        source: Box<ExchangeError>,
    },
}

/// Coarse error classification used for retry and fallback decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Decode,
    Schema,
    Auth,
    Venue,
    UnknownPair,
    PrecisionUnknown,
    UnknownVenue,
    Unsupported,
    Internal,
}

impl ExchangeError {
    /// Business error reported by the venue itself
    pub fn venue(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::VenueError {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Expected field absent or of the wrong JSON kind
    pub fn schema(what: impl Into<String>) -> Self {
        Self::SchemaMismatch(what.into())
    }

    /// Wrap with the venue name and the operation (usually `METHOD /path`)
    pub fn context(self, venue: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Context {
            venue: venue.into(),
            operation: operation.into(),
            source: Box::new(self),
        }
    }

    /// Structured classification, looking through context wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransportFailure(_) | Self::Timeout(_) => ErrorKind::Transport,
            Self::DecodeFailure(_) => ErrorKind::Decode,
            Self::SchemaMismatch(_) => ErrorKind::Schema,
            Self::AuthFailure(_) | Self::MissingCredentials(_) => ErrorKind::Auth,
            Self::VenueError { .. } => ErrorKind::Venue,
            Self::UnknownPair(_) => ErrorKind::UnknownPair,
            Self::PrecisionUnknown(_) => ErrorKind::PrecisionUnknown,
            Self::UnknownVenue(_) => ErrorKind::UnknownVenue,
            Self::FeatureNotSupported(_) => ErrorKind::Unsupported,
            Self::InvalidUrl(_) | Self::SigningError(_) | Self::FixedPointError(_) => {
                ErrorKind::Internal
            }
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// The innermost error, without context wrappers
    pub fn root(&self) -> &ExchangeError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Venue error code, if this is (or wraps) a venue business error
    pub fn venue_code(&self) -> Option<&str> {
        match self.root() {
            Self::VenueError { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// Venue error message, if this is (or wraps) a venue business error
    pub fn venue_message(&self) -> Option<&str> {
        match self.root() {
            Self::VenueError { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}

impl From<unifex_core::FixedError> for ExchangeError {
    fn from(err: unifex_core::FixedError) -> Self {
        Self::FixedPointError(err.to_string())
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        Self::DecodeFailure(err.to_string())
    }
}

impl From<url::ParseError> for ExchangeError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}
