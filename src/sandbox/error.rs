//! Domain-specific error types for remote sandbox operations.
//!
//! Typed errors enable callers to match on specific failure modes
//! rather than parsing error message strings.

use std::time::Duration;

/// Errors returned by the remote sandbox service.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// The named template, sandbox or file does not exist.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// The service did not answer within the allotted time.
    #[error("Sandbox request timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The service answered with a non-success status.
    #[error("Sandbox API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The request could not be sent (connection refused, DNS, TLS, ...).
    #[error("Sandbox request failed: {message}")]
    Request { message: String },

    /// The service answered with a body we could not decode.
    #[error("Invalid response from sandbox API: {message}")]
    InvalidResponse { message: String },

    /// No API key was found in the configured environment variable.
    #[error("Sandbox API key is not set (expected in ${var})")]
    MissingApiKey { var: String },
}

impl SandboxError {
    /// Creates a `NotFound` error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a `Timeout` error from a `Duration`.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout {
            timeout_secs: duration.as_secs(),
        }
    }

    /// Creates an `Api` error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Creates a `Request` error.
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Creates an `InvalidResponse` error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Creates a `MissingApiKey` error.
    pub fn missing_api_key(var: impl Into<String>) -> Self {
        Self::MissingApiKey { var: var.into() }
    }

    /// Returns true if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
