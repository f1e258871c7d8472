//! Error types for endpoint provisioning and invocation

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::retry::RetryError;

/// Result type alias for endpoint operations
pub type Result<T> = std::result::Result<T, Error>;

/// Well-known error codes reported by the control and data planes
pub mod codes {
    /// Endpoint (or endpoint configuration) does not exist
    pub const NOT_FOUND: &str = "NotFound";
    /// A resource with the requested name already exists
    pub const ALREADY_EXISTS: &str = "AlreadyExists";
    /// Account-level instance or endpoint limit reached
    pub const RESOURCE_LIMIT_EXCEEDED: &str = "ResourceLimitExceeded";
    /// Malformed request or invalid parameters
    pub const VALIDATION: &str = "ValidationException";
    /// Request rate exceeded
    pub const THROTTLING: &str = "ThrottlingException";
    /// Service quota exhausted
    pub const SERVICE_QUOTA_EXCEEDED: &str = "ServiceQuotaExceededException";
    /// Model took too long to respond
    pub const MODEL_TIMEOUT: &str = "ModelTimeoutException";
    /// Model container is still warming up
    pub const MODEL_NOT_READY: &str = "ModelNotReadyException";
    /// Model container rejected or failed the request
    pub const MODEL_ERROR: &str = "ModelError";
    /// Service temporarily out of capacity
    pub const SERVICE_UNAVAILABLE: &str = "ServiceUnavailable";
    /// Unspecified server-side failure
    pub const INTERNAL_FAILURE: &str = "InternalFailure";
    /// Transport-level timeout talking to the service
    pub const REQUEST_TIMEOUT: &str = "RequestTimeout";
    /// Response body could not be decoded
    pub const INVALID_RESPONSE: &str = "InvalidResponse";
}

/// Structured error returned by a remote control-plane or data-plane call
///
/// Carries the service's error code and message, independent of any vendor
/// SDK's exception hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// Error code (see [`codes`])
    pub code: String,
    /// Human-readable message from the service
    pub message: String,
}

impl RemoteError {
    /// Create a remote error from a code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(codes::NOT_FOUND, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(codes::ALREADY_EXISTS, message)
    }

    pub fn throttling(message: impl Into<String>) -> Self {
        Self::new(codes::THROTTLING, message)
    }

    /// Whether the remote resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.code == codes::NOT_FOUND
    }

    /// Whether a resource with the requested name already exists
    pub fn is_already_exists(&self) -> bool {
        self.code == codes::ALREADY_EXISTS
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RemoteError {}

/// Endpoint orchestration errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (bad policy, bad settings file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model id not present in the catalog
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Non-retryable remote error, passed through unchanged
    #[error("Remote call failed: {0}")]
    Remote(RemoteError),

    /// Retryable remote error that persisted past the retry bound
    #[error("Retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: RemoteError,
    },

    /// The platform reported the endpoint as failed
    #[error("Provisioning of endpoint '{endpoint}' failed (status {status}): {detail}")]
    ProvisioningFailed {
        endpoint: String,
        status: String,
        detail: String,
    },

    /// The local wait ceiling was reached before the endpoint became ready
    #[error(
        "Timed out after {elapsed:?} waiting for endpoint '{endpoint}' (last status {last_status})"
    )]
    ProvisioningTimeout {
        endpoint: String,
        elapsed: Duration,
        last_status: String,
    },

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Remote error code, if this error came from a remote call
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            Error::Remote(e) => Some(&e.code),
            Error::RetriesExhausted { source, .. } => Some(&source.code),
            _ => None,
        }
    }
}

impl From<RetryError<RemoteError>> for Error {
    fn from(err: RetryError<RemoteError>) -> Self {
        match err {
            RetryError::Fatal(source) => Error::Remote(source),
            RetryError::Exhausted { attempts, last } => Error::RetriesExhausted {
                attempts,
                source: last,
            },
        }
    }
}
