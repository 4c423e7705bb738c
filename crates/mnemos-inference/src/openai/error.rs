//! OpenAI-specific error handling.

use mnemos_core::Error;

/// OpenAI-specific error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    AuthenticationError,
    RateLimitExceeded,
    ModelNotFound,
    ContextLengthExceeded,
    ServerError,
    Unknown,
}

impl OpenAIErrorCode {
    /// Determine error code from HTTP status and error type.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401, _) | (403, _) => Self::AuthenticationError,
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (400, _) if error_type.contains("context_length") => Self::ContextLengthExceeded,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Rate limits and server errors may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded | Self::ServerError)
    }
}

/// Which provider surface a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOp {
    Embedding,
    Generation,
}

impl ProviderOp {
    /// Wrap a message in the error variant of this surface.
    pub fn error(&self, message: String) -> Error {
        match self {
            ProviderOp::Embedding => Error::Embedding(message),
            ProviderOp::Generation => Error::Inference(message),
        }
    }
}

/// Convert an OpenAI error into a mnemos error.
///
/// Credential and model problems are configuration errors; everything else is
/// a provider error of the calling surface.
pub fn to_mnemos_error(code: OpenAIErrorCode, op: ProviderOp, message: &str) -> Error {
    match code {
        OpenAIErrorCode::AuthenticationError => {
            Error::Config(format!("Authentication failed: {}", message))
        }
        OpenAIErrorCode::ModelNotFound => Error::Config(format!("Model not found: {}", message)),
        OpenAIErrorCode::RateLimitExceeded => op.error(format!("Rate limit exceeded: {}", message)),
        OpenAIErrorCode::ContextLengthExceeded => op.error(format!("Context too long: {}", message)),
        OpenAIErrorCode::ServerError => op.error(format!("Server error: {}", message)),
        OpenAIErrorCode::Unknown => op.error(message.to_string()),
    }
}
