//! Trace aggregation (C7), exposed through the orchestrator so callers
//! never need to import `tf-trace` or reach into repositories directly.

use crate::Orchestrator;
use tf_error::Result;
use tf_provider::RequestContext;
use tf_trace::TraceResult;

impl Orchestrator {
    /// Assemble every durable record and backend log line stamped with
    /// `request_id`.
    ///
    /// # Errors
    ///
    /// See [`tf_trace::fetch_trace`]: `InvalidRequest` for an empty
    /// `request_id`, `ServiceUnavailable` if any fan-out branch fails.
    pub async fn fetch_trace(&self, ctx: &RequestContext, request_id: &str) -> Result<TraceResult> {
        tf_trace::fetch_trace(
            ctx,
            request_id,
            self.observability.as_ref(),
            self.execution_repo.as_ref(),
            self.secrets_repo.as_ref(),
            self.user_repo.as_ref(),
            self.image_repo.as_ref(),
        )
        .await
    }
}
