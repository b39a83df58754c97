//! The provider's own view of what is actually running, as distinct from
//! what the repositories record. The health reconciler (`tf-health`, C9)
//! diffs this snapshot against persisted execution state; this module
//! only defines what the provider hands back.

use crate::context::RequestContext;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tf_error::Result;
use tokio::sync::RwLock;

/// The provider's self-reported view of live work, taken at `checked_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderHealthSnapshot {
    /// Execution ids the provider currently considers running.
    pub live_execution_ids: BTreeSet<String>,
    /// When this snapshot was taken.
    pub checked_at: DateTime<Utc>,
}

/// Reports the provider's live-execution view on demand.
#[async_trait]
pub trait HealthManager: Send + Sync {
    /// Take a fresh snapshot of what the provider believes is running.
    async fn reconcile(&self, ctx: &RequestContext) -> Result<ProviderHealthSnapshot>;
}

/// In-memory [`HealthManager`] reference implementation; its view of
/// "live" executions is whatever tests or the daemon's demo seed data
/// set via [`InMemoryHealthManager::set_live_execution_ids`].
#[derive(Default)]
pub struct InMemoryHealthManager {
    live: RwLock<BTreeSet<String>>,
}

impl InMemoryHealthManager {
    /// Construct a health manager reporting no live executions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set of execution ids this manager reports as live.
    pub async fn set_live_execution_ids(&self, ids: BTreeSet<String>) {
        *self.live.write().await = ids;
    }
}

#[async_trait]
impl HealthManager for InMemoryHealthManager {
    async fn reconcile(&self, ctx: &RequestContext) -> Result<ProviderHealthSnapshot> {
        ctx.check_cancelled()?;
        Ok(ProviderHealthSnapshot {
            live_execution_ids: self.live.read().await.clone(),
            checked_at: Utc::now(),
        })
    }
}
