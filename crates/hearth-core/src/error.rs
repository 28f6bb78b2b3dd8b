//! Error types for hearth operations.
//!
//! Errors carry a structured [`ErrorCode`] so callers (and the retry policy)
//! can branch on the kind of failure without matching on message text.

use std::collections::HashMap;
use thiserror::Error;

use crate::types::FallbackReason;

/// Result type alias for hearth operations.
pub type HearthResult<T> = Result<T, HearthError>;

/// Main error type for all hearth operations.
#[derive(Error, Debug)]
pub enum HearthError {
    /// Authentication with the completion service failed.
    #[error("Authentication error: {message}")]
    Authentication {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Input validation failed (including malformed provider requests).
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// Entry or user not found in the collaborator store.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        resource_id: Option<String>,
    },

    /// Provider rate limit exceeded.
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        code: ErrorCode,
        retry_after: Option<u64>,
    },

    /// Completion service call failed.
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Collaborator store operation failed.
    #[error("Store error: {message}")]
    Store {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network error.
    #[error("Network error: {message}")]
    Network {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Scheduler error.
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Authentication (AUTH_xxx)
    AuthInvalidKey,
    AuthMissingCredentials,

    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMalformedRequest,

    // Lookup (NF_xxx)
    EntryNotFound,
    UserNotFound,

    // Rate Limit (RATE_xxx)
    RateLimitExceeded,

    // LLM (LLM_xxx)
    LlmConnectionFailed,
    LlmGenerationFailed,
    LlmInvalidResponse,
    LlmServerError,

    // Store (STO_xxx)
    StoreOperationFailed,

    // Network (NET_xxx)
    NetTimeout,
    NetConnectionFailed,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthInvalidKey => "AUTH_001",
            ErrorCode::AuthMissingCredentials => "AUTH_002",
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMalformedRequest => "VAL_002",
            ErrorCode::EntryNotFound => "NF_001",
            ErrorCode::UserNotFound => "NF_002",
            ErrorCode::RateLimitExceeded => "RATE_001",
            ErrorCode::LlmConnectionFailed => "LLM_001",
            ErrorCode::LlmGenerationFailed => "LLM_002",
            ErrorCode::LlmInvalidResponse => "LLM_003",
            ErrorCode::LlmServerError => "LLM_004",
            ErrorCode::StoreOperationFailed => "STO_001",
            ErrorCode::NetTimeout => "NET_001",
            ErrorCode::NetConnectionFailed => "NET_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl HearthError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create an entry-not-found error.
    pub fn entry_not_found(entry_id: impl Into<String>) -> Self {
        let id = entry_id.into();
        Self::NotFound {
            message: format!("Journal entry '{}' not found", id),
            code: ErrorCode::EntryNotFound,
            resource_id: Some(id),
        }
    }

    /// Create an LLM error (permanent).
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            code: ErrorCode::LlmGenerationFailed,
            source: None,
        }
    }

    /// Create an LLM error for a provider-side 5xx failure (transient).
    pub fn llm_server(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            code: ErrorCode::LlmServerError,
            source: None,
        }
    }

    /// Create an LLM error for output that could not be used.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            code: ErrorCode::LlmInvalidResponse,
            source: None,
        }
    }

    /// Create a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            code: ErrorCode::StoreOperationFailed,
            source: None,
        }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            code: ErrorCode::NetTimeout,
            source: None,
        }
    }

    /// Create a network connection error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            code: ErrorCode::NetConnectionFailed,
            source: None,
        }
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            code: ErrorCode::AuthInvalidKey,
            source: None,
        }
    }

    /// Create a rate limit error.
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
            code: ErrorCode::RateLimitExceeded,
            retry_after: None,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Authentication { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::RateLimit { code, .. } => *code,
            Self::Llm { code, .. } => *code,
            Self::Store { code, .. } => *code,
            Self::Network { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether retrying the same provider call may succeed.
    ///
    /// Rate limits, timeouts, dropped connections and provider 5xx are
    /// transient. Everything else (auth, malformed request, config,
    /// unusable output) is permanent and must not be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimit { .. } | Self::Network { .. } => true,
            Self::Llm { code, .. } => {
                matches!(code, ErrorCode::LlmServerError | ErrorCode::LlmConnectionFailed)
            }
            _ => false,
        }
    }

    /// Tag attached to the emergency response when this error ends a request.
    pub fn fallback_reason(&self) -> FallbackReason {
        match self {
            Self::RateLimit { .. } => FallbackReason::RateLimited,
            Self::Network {
                code: ErrorCode::NetTimeout,
                ..
            } => FallbackReason::Timeout,
            Self::Llm {
                code: ErrorCode::LlmInvalidResponse,
                ..
            } => FallbackReason::MalformedOutput,
            _ => FallbackReason::ProviderUnavailable,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Authentication { .. } => Some("Please check the completion service API key"),
            Self::RateLimit { .. } => Some("Please wait before making more requests"),
            Self::NotFound { .. } => Some("Please check the entry ID and ensure it exists"),
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::Llm { .. } => Some("Please check your LLM provider configuration"),
            _ => None,
        }
    }

    /// Convert from an HTTP status code returned by a completion service.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            400 | 422 => Self::Validation {
                message: body.to_string(),
                code: ErrorCode::ValMalformedRequest,
                details: HashMap::new(),
                suggestion: Some("Please check the request parameters".to_string()),
            },
            401 | 403 => Self::Authentication {
                message: body.to_string(),
                code: ErrorCode::AuthInvalidKey,
                source: None,
            },
            404 => Self::llm(format!("Unknown model or endpoint: {}", body)),
            408 => Self::timeout(body.to_string()),
            429 => Self::RateLimit {
                message: body.to_string(),
                code: ErrorCode::RateLimitExceeded,
                retry_after: None,
            },
            500..=599 => Self::llm_server(format!("HTTP {}: {}", status, body)),
            _ => Self::Internal(format!("HTTP {}: {}", status, body)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = HearthError::validation("Invalid input");
        assert_eq!(err.code(), ErrorCode::ValInvalidInput);
        assert!(err.to_string().contains("Invalid input"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::AuthInvalidKey.as_str(), "AUTH_001");
        assert_eq!(ErrorCode::NetTimeout.as_str(), "NET_001");
    }

    #[test]
    fn test_transient_classification() {
        assert!(HearthError::rate_limit("slow down").is_transient());
        assert!(HearthError::timeout("deadline").is_transient());
        assert!(HearthError::from_http_status(503, "unavailable").is_transient());
        assert!(!HearthError::from_http_status(401, "bad key").is_transient());
        assert!(!HearthError::from_http_status(400, "bad request").is_transient());
        assert!(!HearthError::invalid_response("empty").is_transient());
        assert!(!HearthError::store("insight table locked").is_transient());
    }

    #[test]
    fn test_fallback_reason_mapping() {
        assert_eq!(
            HearthError::rate_limit("x").fallback_reason(),
            FallbackReason::RateLimited
        );
        assert_eq!(
            HearthError::timeout("x").fallback_reason(),
            FallbackReason::Timeout
        );
        assert_eq!(
            HearthError::invalid_response("x").fallback_reason(),
            FallbackReason::MalformedOutput
        );
        assert_eq!(
            HearthError::authentication("x").fallback_reason(),
            FallbackReason::ProviderUnavailable
        );
    }
}
