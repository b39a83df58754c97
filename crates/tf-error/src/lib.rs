//! Unified error taxonomy for the Taskforge orchestrator.
//!
//! Every public orchestrator method returns an [`OrchestratorError`] (or a
//! `Result` wrapping one). Each error carries a stable [`ErrorCode`] — the
//! contract callers switch on — a human-readable message, an optional cause
//! chain, and arbitrary key-value context for diagnostics. Translating a
//! code to a transport-specific status (e.g. HTTP) is left to the layer
//! that owns that transport; this crate only exposes [`ErrorCode::status_hint`]
//! as an advisory default.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed or semantically invalid request shape.
    Request,
    /// Authorization/authentication failure.
    Auth,
    /// Requested entity does not exist.
    NotFound,
    /// Duplicate creation or conflicting idempotent state.
    Conflict,
    /// Durable-store failure.
    Persistence,
    /// An upstream collaborator is unavailable or a fan-out collapsed.
    Availability,
    /// Catch-all for synchronization and provider misbehavior.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Request => "request",
            Self::Auth => "auth",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Persistence => "persistence",
            Self::Availability => "availability",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// One variant per kind named in the orchestrator's error-handling design:
/// `InvalidRequest`, `Forbidden`, `NotFound`, `Conflict`, `InvalidApiKey`,
/// `ApiKeyRevoked`, `DatabaseError`, `ServiceUnavailable`, `Internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Shape or validation failure in the request.
    InvalidRequest,
    /// The enforcer denied the action.
    Forbidden,
    /// The requested entity does not exist.
    NotFound,
    /// Duplicate creation or an idempotent overlap that cannot be resolved silently.
    Conflict,
    /// Presented API key does not resolve to any user.
    InvalidApiKey,
    /// Presented API key resolves to a revoked user.
    ApiKeyRevoked,
    /// A repository call failed.
    DatabaseError,
    /// An upstream dependency is unavailable, or a fan-out collapsed.
    ServiceUnavailable,
    /// Catch-all for synchronization failures and provider misbehavior.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest => ErrorCategory::Request,
            Self::Forbidden | Self::InvalidApiKey | Self::ApiKeyRevoked => ErrorCategory::Auth,
            Self::NotFound => ErrorCategory::NotFound,
            Self::Conflict => ErrorCategory::Conflict,
            Self::DatabaseError => ErrorCategory::Persistence,
            Self::ServiceUnavailable => ErrorCategory::Availability,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation (e.g. `"INVALID_REQUEST"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::ApiKeyRevoked => "API_KEY_REVOKED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::Internal => "INTERNAL",
        }
    }

    /// Advisory HTTP status code a transport layer may default to.
    ///
    /// The core never depends on HTTP; this is a convenience for `tf-daemon`.
    #[must_use]
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::InvalidRequest => 400,
            Self::InvalidApiKey | Self::ApiKeyRevoked => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::ServiceUnavailable => 503,
            Self::DatabaseError | Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OrchestratorError
// ---------------------------------------------------------------------------

/// Unified orchestrator error.
///
/// # Example
///
/// ```
/// use tf_error::{ErrorCode, OrchestratorError};
///
/// let err = OrchestratorError::new(ErrorCode::NotFound, "execution not found")
///     .with_context("execution_id", "exec-123");
/// assert_eq!(err.code, ErrorCode::NotFound);
/// ```
pub struct OrchestratorError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics (e.g. which subsystem
    /// diverged and whether a compensating write was attempted).
    pub context: BTreeMap<String, serde_json::Value>,
}

impl OrchestratorError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Shorthand for `OrchestratorError::new(ErrorCode::InvalidRequest, ..)`.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Shorthand for `OrchestratorError::new(ErrorCode::Forbidden, ..)`.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Shorthand for `OrchestratorError::new(ErrorCode::NotFound, ..)`.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Shorthand for `OrchestratorError::new(ErrorCode::Conflict, ..)`.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Shorthand for `OrchestratorError::new(ErrorCode::DatabaseError, ..)`.
    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Shorthand for `OrchestratorError::new(ErrorCode::ServiceUnavailable, ..)`.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Shorthand for `OrchestratorError::new(ErrorCode::Internal, ..)`.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialization
    /// fails the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Debug for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("OrchestratorError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Shorthand alias used throughout the orchestrator crates.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
