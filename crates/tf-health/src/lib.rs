// SPDX-License-Identifier: MIT OR Apache-2.0
//! Health reconciliation (C9): drift detection between persisted execution
//! state and what the compute provider actually reports as live.
//!
//! This crate never mutates execution state itself — it only observes and
//! reports. A drift is only ever a signal to the orchestrator (or an
//! operator) that something needs attention; deciding what to do about a
//! `running` execution the provider no longer recognizes is out of scope
//! here; this component stays a "contract + driver" pair, nothing more.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tf_error::Result;
use tf_provider::{HealthManager, RequestContext};
use tf_repo::ExecutionRepo;
use tf_status::ExecutionStatus;
use tracing::{info, instrument, warn};

/// A single disagreement between persisted execution state and the
/// provider's live-execution snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Drift {
    /// The repository records this execution as non-terminal, but the
    /// provider no longer considers it live — it either finished without
    /// the orchestrator observing it, or was lost.
    OrphanedInRepo {
        /// The execution id that diverged.
        execution_id: String,
        /// The status currently recorded in the repository.
        recorded_status: ExecutionStatus,
    },
    /// The provider reports an execution as live that the repository has
    /// no record of at all, or records as already terminal.
    UnknownToRepo {
        /// The execution id the provider reports as live.
        execution_id: String,
        /// The repository's status for this id, if it has any record.
        recorded_status: Option<ExecutionStatus>,
    },
}

impl Drift {
    /// The execution id this drift concerns.
    #[must_use]
    pub fn execution_id(&self) -> &str {
        match self {
            Drift::OrphanedInRepo { execution_id, .. }
            | Drift::UnknownToRepo { execution_id, .. } => execution_id,
        }
    }
}

/// A single reconciliation pass: the provider snapshot it was taken
/// against, and every drift found relative to repository state.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationReport {
    /// When the underlying provider snapshot was taken.
    pub checked_at: DateTime<Utc>,
    /// Every drift found. Empty means the repository and the provider
    /// agree on every non-terminal execution.
    pub drifts: Vec<Drift>,
}

impl ReconciliationReport {
    /// Returns `true` if the repository and the provider agree.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.drifts.is_empty()
    }
}

/// Drives a single reconciliation pass between an [`ExecutionRepo`] and a
/// [`HealthManager`]-reported provider snapshot.
///
/// This never runs on a caller's request-scoped context: a background
/// reconciliation pass constructs its own context rather than inheriting
/// a request's deadline.
pub struct HealthReconciler {
    execution_repo: Arc<dyn ExecutionRepo>,
    health_manager: Arc<dyn HealthManager>,
}

impl HealthReconciler {
    /// Construct a reconciler over the given repository and provider.
    #[must_use]
    pub fn new(execution_repo: Arc<dyn ExecutionRepo>, health_manager: Arc<dyn HealthManager>) -> Self {
        Self {
            execution_repo,
            health_manager,
        }
    }

    /// Take a fresh provider snapshot and diff it against every
    /// non-terminal execution the repository knows about.
    ///
    /// # Errors
    ///
    /// Returns whatever error the provider or repository call surfaces;
    /// there is no partial report on failure.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ReconciliationReport> {
        let ctx = RequestContext::new(format!("health-reconcile-{}", tf_ids::generate_uuid()));

        let snapshot = self.health_manager.reconcile(&ctx).await?;
        let non_terminal = [ExecutionStatus::Starting, ExecutionStatus::Running];
        let recorded = self.execution_repo.list_executions(0, &non_terminal).await?;

        let mut drifts = Vec::new();
        let mut recorded_live_ids = BTreeSet::new();
        for execution in &recorded {
            recorded_live_ids.insert(execution.execution_id.clone());
            if !snapshot.live_execution_ids.contains(&execution.execution_id) {
                drifts.push(Drift::OrphanedInRepo {
                    execution_id: execution.execution_id.clone(),
                    recorded_status: execution.status,
                });
            }
        }

        for execution_id in &snapshot.live_execution_ids {
            if recorded_live_ids.contains(execution_id) {
                continue;
            }
            let recorded_status = self
                .execution_repo
                .get_execution(execution_id)
                .await?
                .map(|e| e.status);
            drifts.push(Drift::UnknownToRepo {
                execution_id: execution_id.clone(),
                recorded_status,
            });
        }

        if drifts.is_empty() {
            info!(checked_at = %snapshot.checked_at, "reconciliation found no drift");
        } else {
            warn!(
                checked_at = %snapshot.checked_at,
                drift_count = drifts.len(),
                "reconciliation found drift between repository and provider"
            );
        }

        Ok(ReconciliationReport {
            checked_at: snapshot.checked_at,
            drifts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeMap;
    use tf_provider::InMemoryHealthManager;
    use tf_repo::{Execution, InMemoryExecutionRepo};

    fn sample(execution_id: &str, status: ExecutionStatus) -> Execution {
        Execution {
            execution_id: execution_id.to_string(),
            created_by: "owner@x.com".to_string(),
            owned_by: std::collections::BTreeSet::from(["owner@x.com".to_string()]),
            command: "echo hi".to_string(),
            image_id: "img-1".to_string(),
            env: BTreeMap::new(),
            secrets: Vec::new(),
            started_at: Utc::now() - Duration::seconds(5),
            completed_at: None,
            status,
            exit_code: None,
            compute_platform: None,
            created_by_request_id: Some("req-1".to_string()),
            modified_by_request_id: None,
        }
    }

    #[tokio::test]
    async fn agreement_between_repo_and_provider_is_healthy() {
        let repo = Arc::new(InMemoryExecutionRepo::new());
        repo.create_execution(sample("e-1", ExecutionStatus::Running))
            .await
            .unwrap();
        let health = Arc::new(InMemoryHealthManager::new());
        health
            .set_live_execution_ids(BTreeSet::from(["e-1".to_string()]))
            .await;

        let reconciler = HealthReconciler::new(repo, health);
        let report = reconciler.reconcile().await.unwrap();
        assert!(report.is_healthy());
    }

    #[tokio::test]
    async fn repo_running_but_provider_silent_is_orphaned() {
        let repo = Arc::new(InMemoryExecutionRepo::new());
        repo.create_execution(sample("e-1", ExecutionStatus::Running))
            .await
            .unwrap();
        let health = Arc::new(InMemoryHealthManager::new());

        let reconciler = HealthReconciler::new(repo, health);
        let report = reconciler.reconcile().await.unwrap();
        assert_eq!(report.drifts.len(), 1);
        assert_eq!(
            report.drifts[0],
            Drift::OrphanedInRepo {
                execution_id: "e-1".to_string(),
                recorded_status: ExecutionStatus::Running,
            }
        );
    }

    #[tokio::test]
    async fn provider_live_but_repo_unaware_is_unknown_to_repo() {
        let repo = Arc::new(InMemoryExecutionRepo::new());
        let health = Arc::new(InMemoryHealthManager::new());
        health
            .set_live_execution_ids(BTreeSet::from(["e-ghost".to_string()]))
            .await;

        let reconciler = HealthReconciler::new(repo, health);
        let report = reconciler.reconcile().await.unwrap();
        assert_eq!(report.drifts.len(), 1);
        assert_eq!(
            report.drifts[0],
            Drift::UnknownToRepo {
                execution_id: "e-ghost".to_string(),
                recorded_status: None,
            }
        );
    }

    #[tokio::test]
    async fn provider_live_but_repo_thinks_terminal_is_unknown_to_repo_with_status() {
        let repo = Arc::new(InMemoryExecutionRepo::new());
        repo.create_execution(sample("e-1", ExecutionStatus::Succeeded))
            .await
            .unwrap();
        let health = Arc::new(InMemoryHealthManager::new());
        health
            .set_live_execution_ids(BTreeSet::from(["e-1".to_string()]))
            .await;

        let reconciler = HealthReconciler::new(repo, health);
        let report = reconciler.reconcile().await.unwrap();
        assert_eq!(report.drifts.len(), 1);
        assert_eq!(
            report.drifts[0],
            Drift::UnknownToRepo {
                execution_id: "e-1".to_string(),
                recorded_status: Some(ExecutionStatus::Succeeded),
            }
        );
    }

    #[tokio::test]
    async fn terminal_executions_are_ignored_even_without_provider_agreement() {
        let repo = Arc::new(InMemoryExecutionRepo::new());
        repo.create_execution(sample("e-done", ExecutionStatus::Failed))
            .await
            .unwrap();
        let health = Arc::new(InMemoryHealthManager::new());

        let reconciler = HealthReconciler::new(repo, health);
        let report = reconciler.reconcile().await.unwrap();
        assert!(report.is_healthy());
    }

    #[test]
    fn drift_execution_id_accessor() {
        let d = Drift::OrphanedInRepo {
            execution_id: "e-1".to_string(),
            recorded_status: ExecutionStatus::Running,
        };
        assert_eq!(d.execution_id(), "e-1");
    }
}
