//! Execution storage.

use crate::entities::Execution;
use async_trait::async_trait;
use std::collections::HashMap;
use tf_error::{OrchestratorError, Result};
use tf_status::ExecutionStatus;
use tokio::sync::RwLock;

/// Durable storage for command executions.
#[async_trait]
pub trait ExecutionRepo: Send + Sync {
    /// Persist a newly created execution. Fails with `Conflict` if the
    /// execution id is already in use.
    async fn create_execution(&self, execution: Execution) -> Result<()>;

    /// Look up an execution by id.
    async fn get_execution(&self, execution_id: &str) -> Result<Option<Execution>>;

    /// Overwrite a stored execution with a new snapshot.
    async fn update_execution(&self, execution: Execution) -> Result<()>;

    /// List executions newest-first, optionally filtered to a status set
    /// and capped at `limit` (0 means unbounded).
    async fn list_executions(
        &self,
        limit: usize,
        statuses: &[ExecutionStatus],
    ) -> Result<Vec<Execution>>;

    /// Every execution stamped with the given request id.
    async fn get_executions_by_request_id(&self, request_id: &str) -> Result<Vec<Execution>>;
}

/// In-memory [`ExecutionRepo`] reference implementation.
#[derive(Default)]
pub struct InMemoryExecutionRepo {
    executions: RwLock<HashMap<String, Execution>>,
}

impl InMemoryExecutionRepo {
    /// Construct an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionRepo for InMemoryExecutionRepo {
    async fn create_execution(&self, execution: Execution) -> Result<()> {
        let mut table = self.executions.write().await;
        if table.contains_key(&execution.execution_id) {
            return Err(OrchestratorError::conflict(format!(
                "execution already exists: {}",
                execution.execution_id
            )));
        }
        table.insert(execution.execution_id.clone(), execution);
        Ok(())
    }

    async fn get_execution(&self, execution_id: &str) -> Result<Option<Execution>> {
        Ok(self.executions.read().await.get(execution_id).cloned())
    }

    async fn update_execution(&self, execution: Execution) -> Result<()> {
        let mut table = self.executions.write().await;
        if !table.contains_key(&execution.execution_id) {
            return Err(OrchestratorError::not_found(format!(
                "execution not found: {}",
                execution.execution_id
            )));
        }
        table.insert(execution.execution_id.clone(), execution);
        Ok(())
    }

    async fn list_executions(
        &self,
        limit: usize,
        statuses: &[ExecutionStatus],
    ) -> Result<Vec<Execution>> {
        let table = self.executions.read().await;
        let mut matching: Vec<Execution> = table
            .values()
            .filter(|e| statuses.is_empty() || statuses.contains(&e.status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        if limit > 0 {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    async fn get_executions_by_request_id(&self, request_id: &str) -> Result<Vec<Execution>> {
        let table = self.executions.read().await;
        Ok(table
            .values()
            .filter(|e| {
                e.created_by_request_id.as_deref() == Some(request_id)
                    || e.modified_by_request_id.as_deref() == Some(request_id)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::{BTreeMap, BTreeSet};

    fn sample(execution_id: &str, status: ExecutionStatus) -> Execution {
        Execution {
            execution_id: execution_id.to_string(),
            created_by: "owner@x.com".to_string(),
            owned_by: BTreeSet::from(["owner@x.com".to_string()]),
            command: "echo hi".to_string(),
            image_id: "img-1".to_string(),
            env: BTreeMap::new(),
            secrets: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            status,
            exit_code: None,
            compute_platform: None,
            created_by_request_id: Some("req-1".to_string()),
            modified_by_request_id: None,
        }
    }

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let repo = InMemoryExecutionRepo::new();
        repo.create_execution(sample("e-1", ExecutionStatus::Starting))
            .await
            .unwrap();
        let found = repo.get_execution("e-1").await.unwrap().unwrap();
        assert_eq!(found.execution_id, "e-1");
    }

    #[tokio::test]
    async fn list_executions_filters_and_orders_newest_first() {
        let repo = InMemoryExecutionRepo::new();
        let mut first = sample("e-1", ExecutionStatus::Running);
        first.started_at = Utc::now() - chrono::Duration::seconds(10);
        let second = sample("e-2", ExecutionStatus::Succeeded);
        repo.create_execution(first).await.unwrap();
        repo.create_execution(second).await.unwrap();

        let all = repo.list_executions(0, &[]).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].execution_id, "e-2");

        let running_only = repo
            .list_executions(0, &[ExecutionStatus::Running])
            .await
            .unwrap();
        assert_eq!(running_only.len(), 1);
        assert_eq!(running_only[0].execution_id, "e-1");
    }

    #[tokio::test]
    async fn list_executions_respects_limit() {
        let repo = InMemoryExecutionRepo::new();
        repo.create_execution(sample("e-1", ExecutionStatus::Running))
            .await
            .unwrap();
        repo.create_execution(sample("e-2", ExecutionStatus::Running))
            .await
            .unwrap();
        let limited = repo.list_executions(1, &[]).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn get_by_request_id_matches_created_or_modified() {
        let repo = InMemoryExecutionRepo::new();
        repo.create_execution(sample("e-1", ExecutionStatus::Running))
            .await
            .unwrap();
        let found = repo.get_executions_by_request_id("req-1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(repo
            .get_executions_by_request_id("req-nope")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn update_missing_execution_is_not_found() {
        let repo = InMemoryExecutionRepo::new();
        let err = repo
            .update_execution(sample("e-1", ExecutionStatus::Running))
            .await
            .unwrap_err();
        assert_eq!(err.code, tf_error::ErrorCode::NotFound);
    }
}
