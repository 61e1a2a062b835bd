//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
///
/// Variants follow the platform's failure taxonomy: validation failures
/// surface immediately with no state change, transient upstream failures are
/// retried by background loops, decode failures skip the offending message,
/// and cancellation propagates freely without counting as a failure.
#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("duplicate session: id '{0}' already exists")]
    Duplicate(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("transient {subsystem} failure: {message}")]
    Transient {
        subsystem: &'static str,
        message: String,
    },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("subscriber lagged: {dropped} events dropped")]
    SubscriberLagged { dropped: u64 },

    #[error("operation canceled")]
    Canceled,

    #[error("fatal startup failure: {0}")]
    Fatal(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn duplicate(id: impl Into<String>) -> Self {
        Self::Duplicate(id.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn transient(subsystem: &'static str, message: impl Into<String>) -> Self {
        Self::Transient {
            subsystem,
            message: message.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// True for the not-found variant, regardless of entity.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::transient("store", e.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::transient("broker", e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::decode(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::transient("io", e.to_string())
    }
}
