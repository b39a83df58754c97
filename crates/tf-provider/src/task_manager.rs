//! Task dispatch: the provider that actually launches and kills
//! containerized commands.

use crate::context::RequestContext;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tf_error::{OrchestratorError, Result};
use tokio::sync::RwLock;

/// What the task manager needs to launch a command: the resolved image,
/// the command line, and the environment it should run with (already
/// merged with any resolved secrets by the orchestrator).
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    /// The command to run.
    pub command: String,
    /// The image id (or human name, if unresolved) to run under.
    pub image: String,
    /// The environment the command runs with.
    pub env: BTreeMap<String, String>,
}

/// Launches and terminates command executions on a compute backend.
#[async_trait]
pub trait TaskManager: Send + Sync {
    /// Launch `spec` on behalf of `user_email`. Returns the provider-issued
    /// execution id and, if the provider reports one, the instant it
    /// considers the task to have started.
    async fn start_task(
        &self,
        ctx: &RequestContext,
        user_email: &str,
        spec: &TaskSpec,
    ) -> Result<(String, Option<DateTime<Utc>>)>;

    /// Request termination of a running execution. Idempotent: killing an
    /// execution the provider no longer recognizes as running is not an
    /// error — the status state machine (`tf-status`) is the sole
    /// authority on whether the kill was meaningful.
    async fn kill_task(&self, ctx: &RequestContext, execution_id: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
struct TrackedTask {
    spec: TaskSpec,
    user_email: String,
    started_at: DateTime<Utc>,
    killed: bool,
}

/// In-memory [`TaskManager`] reference implementation. Tasks never
/// actually run; `start_task` immediately mints an id and records the
/// spec so tests and the daemon's demo mode can inspect what was
/// launched.
#[derive(Default)]
pub struct InMemoryTaskManager {
    tasks: RwLock<HashMap<String, TrackedTask>>,
    sequence: AtomicU64,
}

impl InMemoryTaskManager {
    /// Construct an empty task manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> String {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        format!("exec-{n:08x}")
    }

    /// Inspect whether an execution id was handed a kill request. Used by
    /// tests that verify `KillExecution` actually reached the provider.
    pub async fn was_killed(&self, execution_id: &str) -> bool {
        self.tasks
            .read()
            .await
            .get(execution_id)
            .is_some_and(|t| t.killed)
    }
}

#[async_trait]
impl TaskManager for InMemoryTaskManager {
    async fn start_task(
        &self,
        ctx: &RequestContext,
        user_email: &str,
        spec: &TaskSpec,
    ) -> Result<(String, Option<DateTime<Utc>>)> {
        ctx.check_cancelled()?;
        let id = self.next_id();
        let started_at = Utc::now();
        self.tasks.write().await.insert(
            id.clone(),
            TrackedTask {
                spec: spec.clone(),
                user_email: user_email.to_string(),
                started_at,
                killed: false,
            },
        );
        Ok((id, Some(started_at)))
    }

    async fn kill_task(&self, ctx: &RequestContext, execution_id: &str) -> Result<()> {
        ctx.check_cancelled()?;
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(execution_id).ok_or_else(|| {
            OrchestratorError::not_found(format!("no tracked task for {execution_id}"))
        })?;
        task.killed = true;
        Ok(())
    }
}
