//! Backend observability: logs emitted by the control plane itself
//! (enforcer decisions, dispatch errors) rather than by a user's
//! command, indexed by request id for [`crate::HealthManager`]-adjacent
//! diagnostics and the trace aggregator (C7).

use crate::context::RequestContext;
use crate::log_event::LogEvent;
use async_trait::async_trait;
use std::collections::HashMap;
use tf_error::Result;
use tokio::sync::RwLock;

/// Fetches backend-originated log events for a request id.
#[async_trait]
pub trait ObservabilityManager: Send + Sync {
    /// Every backend log event stamped with `request_id`, oldest first.
    async fn fetch_backend_logs(
        &self,
        ctx: &RequestContext,
        request_id: &str,
    ) -> Result<Vec<LogEvent>>;
}

/// In-memory [`ObservabilityManager`] reference implementation.
#[derive(Default)]
pub struct InMemoryObservabilityManager {
    events: RwLock<HashMap<String, Vec<LogEvent>>>,
}

impl InMemoryObservabilityManager {
    /// Construct an empty observability manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a backend event under a request id.
    pub async fn record(&self, request_id: &str, event: LogEvent) {
        self.events
            .write()
            .await
            .entry(request_id.to_string())
            .or_default()
            .push(event);
    }
}

#[async_trait]
impl ObservabilityManager for InMemoryObservabilityManager {
    async fn fetch_backend_logs(
        &self,
        ctx: &RequestContext,
        request_id: &str,
    ) -> Result<Vec<LogEvent>> {
        ctx.check_cancelled()?;
        Ok(self
            .events
            .read()
            .await
            .get(request_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_unknown_request_id_yields_empty_list() {
        let mgr = InMemoryObservabilityManager::new();
        let ctx = RequestContext::new("req-1");
        let events = mgr.fetch_backend_logs(&ctx, "req-9").await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn recorded_events_are_scoped_to_their_request_id() {
        let mgr = InMemoryObservabilityManager::new();
        let ctx = RequestContext::new("req-1");
        mgr.record("req-1", LogEvent::now("backend", "enforcer denied")).await;
        mgr.record("req-2", LogEvent::now("backend", "unrelated")).await;
        let events = mgr.fetch_backend_logs(&ctx, "req-1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "enforcer denied");
    }
}
