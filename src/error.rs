//! Error taxonomy for the translation engine.
//!
//! `TranslationError` is what callers of the service see; `ProviderError` is
//! what a single adapter reports and is folded into `TranslationError::Provider`
//! once the fallback chain is exhausted.

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the translation service and its satellites.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Text exceeds the configured maximum length
    #[error("Text length {length} exceeds maximum of {max} characters")]
    TextTooLong { length: usize, max: usize },

    /// Caller exceeded the request-volume ceiling
    #[error("Rate limit exceeded: at most {limit} requests per {window_secs}s")]
    RateLimited { limit: u32, window_secs: u64 },

    /// Every provider that was tried failed
    #[error("Translation failed: {0}")]
    Provider(String),

    /// Unknown job or mapping
    #[error("{0} not found")]
    NotFound(String),

    /// Anything uncategorized (storage failures, cancelled work, ...)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TranslationError {
    /// Stable machine-readable identifier for API consumers
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::TextTooLong { .. } => "text_too_long",
            Self::RateLimited { .. } => "rate_limited",
            Self::Provider(_) => "provider_error",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    /// HTTP status the API layer reports for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::TextTooLong { .. } => 413,
            Self::RateLimited { .. } => 429,
            Self::NotFound(_) => 404,
            Self::Provider(_) | Self::Internal(_) => 500,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<anyhow::Error> for TranslationError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", err))
    }
}

/// Serializable form of a failed item inside a batch or bulk report
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl From<&TranslationError> for ErrorBody {
    fn from(err: &TranslationError) -> Self {
        Self {
            error: err.code(),
            message: err.to_string(),
        }
    }
}

/// Failure of a single provider adapter call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{provider}: request failed: {message}")]
    Network { provider: String, message: String },

    #[error("{provider}: no response within {secs}s")]
    Timeout { provider: String, secs: u64 },

    #[error("{provider}: API error ({status}): {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider}: malformed response: {message}")]
    Malformed { provider: String, message: String },

    #[error("{provider}: not configured: {message}")]
    NotConfigured { provider: String, message: String },
}

impl ProviderError {
    /// Category recorded as the analytics `errorKind`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
            Self::Status { status: 429, .. } => "provider_rate_limited",
            Self::Status { .. } => "http_status",
            Self::Malformed { .. } => "malformed_response",
            Self::NotConfigured { .. } => "not_configured",
        }
    }
}
