//! Invocation error types

use thiserror::Error;

/// The invocation payload is not a proxy integration event.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid proxy event JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Proxy event must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Call-level invocation failure.
///
/// Handler panics are not represented here; they are answered with a
/// 500 envelope and the call succeeds.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Failed to encode response envelope: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to finalize response body: {0}")]
    Capture(#[from] std::io::Error),
}

impl InvokeError {
    /// Error type string reported to the Lambda Runtime API.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Decode(_) => "Runtime.InvalidEvent",
            Self::Encode(_) | Self::Capture(_) => "Runtime.ResponseEncoding",
        }
    }
}
