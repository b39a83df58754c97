//! Retrieval of an execution's recorded log output.

use crate::context::RequestContext;
use crate::log_event::LogEvent;
use async_trait::async_trait;
use std::collections::HashMap;
use tf_error::Result;
use tokio::sync::RwLock;

/// Fetches the recorded log output for a terminal execution.
#[async_trait]
pub trait LogManager: Send + Sync {
    /// Every log event recorded for `execution_id`, oldest first. A
    /// never-logged execution yields an empty list, not an error.
    async fn fetch_logs_by_execution_id(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
    ) -> Result<Vec<LogEvent>>;
}

/// In-memory [`LogManager`] reference implementation, seeded via
/// [`InMemoryLogManager::append`].
#[derive(Default)]
pub struct InMemoryLogManager {
    events: RwLock<HashMap<String, Vec<LogEvent>>>,
}

impl InMemoryLogManager {
    /// Construct an empty log manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to an execution's recorded log.
    pub async fn append(&self, execution_id: &str, event: LogEvent) {
        self.events
            .write()
            .await
            .entry(execution_id.to_string())
            .or_default()
            .push(event);
    }
}

#[async_trait]
impl LogManager for InMemoryLogManager {
    async fn fetch_logs_by_execution_id(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
    ) -> Result<Vec<LogEvent>> {
        ctx.check_cancelled()?;
        Ok(self
            .events
            .read()
            .await
            .get(execution_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn never_logged_execution_yields_empty_list_not_error() {
        let mgr = InMemoryLogManager::new();
        let ctx = RequestContext::new("req-1");
        let events = mgr.fetch_logs_by_execution_id(&ctx, "e-1").await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn appended_events_are_returned_in_order() {
        let mgr = InMemoryLogManager::new();
        let ctx = RequestContext::new("req-1");
        mgr.append("e-1", LogEvent::now("stdout", "first")).await;
        mgr.append("e-1", LogEvent::now("stdout", "second")).await;
        let events = mgr.fetch_logs_by_execution_id(&ctx, "e-1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "first");
        assert_eq!(events[1].message, "second");
    }
}
