//! Request-scoped context threaded through every provider call.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tf_error::{OrchestratorError, Result};

/// Carries cancellation, an optional deadline, and the request id a call
/// should stamp onto any record it creates or modifies.
///
/// The orchestrator never retains a context past the call that received
/// it; a background reconciler (C9) constructs its own rather than
/// inheriting a caller's.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    deadline: Option<DateTime<Utc>>,
    cancelled: Arc<AtomicBool>,
}

impl RequestContext {
    /// Construct a context for a fresh request id with no deadline.
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attach an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The request id to stamp onto created or modified records.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The absolute deadline, if one was set.
    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Signal cancellation. Cooperative: in-flight work observes this via
    /// [`RequestContext::check_cancelled`] at its next suspension point.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`RequestContext::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Utc::now() > d)
    }

    /// Convenience for call sites that want to short-circuit with a
    /// typed error at a suspension point.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::service_unavailable`] if the context
    /// has been cancelled or its deadline has passed.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(OrchestratorError::service_unavailable(
                "request context cancelled or deadline exceeded",
            )
            .with_context("request_id", self.request_id.clone()));
        }
        Ok(())
    }
}
