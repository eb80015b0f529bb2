//! Error types for the SoftLayer REST client.

use thiserror::Error;

/// Errors raised while talking to the SoftLayer API.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SoftLayerError {
    /// Raised when the request never produced an HTTP response.
    #[error("request to {path} failed: {message}")]
    Http {
        /// Service path that was requested.
        path: String,
        /// Transport error message.
        message: String,
    },
    /// Raised when the API answers with a non-success status.
    #[error("{path} returned HTTP {status}: {message}")]
    Api {
        /// Service path that was requested.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Error text from the response body.
        message: String,
    },
    /// Raised when the referenced object does not exist.
    #[error("{path}: object not found")]
    NotFound {
        /// Service path that was requested.
        path: String,
    },
    /// Raised when the response body cannot be decoded.
    #[error("failed to decode response from {path}: {message}")]
    Decode {
        /// Service path that was requested.
        path: String,
        /// Decoder error message.
        message: String,
    },
}

impl SoftLayerError {
    /// Returns `true` when the error means the object is absent rather than
    /// the lookup having failed.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
