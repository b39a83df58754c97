// SPDX-License-Identifier: MIT OR Apache-2.0
//! Trace aggregation: given a request id, fan out across backend
//! observability and every repository indexed by request id, and
//! assemble a single fixed-field record.
//!
//! The fan-out is first-error-cancels-siblings: `tokio::try_join!`
//! polls every branch concurrently and returns as soon as one fails,
//! dropping the rest. Empty slices are preferred over nulls — a branch
//! that legitimately found nothing still returns `Ok(vec![])`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::Serialize;
use tf_error::{OrchestratorError, Result};
use tf_provider::{LogEvent, ObservabilityManager, RequestContext};
use tf_repo::{Execution, ExecutionRepo, ImageInfo, ImageRepo, Secret, SecretsRepo, User, UserRepo};

/// Every durable record stamped with a given request id, plus the
/// backend log events emitted while handling it.
#[derive(Debug, Clone, Serialize)]
pub struct TraceResult {
    /// Backend-originated log events for the request.
    pub logs: Vec<LogEvent>,
    /// Executions created or modified under this request.
    pub executions: Vec<Execution>,
    /// Secrets created or modified under this request.
    pub secrets: Vec<Secret>,
    /// Users created under this request.
    pub users: Vec<User>,
    /// Images registered under this request.
    pub images: Vec<ImageInfo>,
}

/// Fetch the full trace for `request_id`.
///
/// # Errors
///
/// Returns [`OrchestratorError::invalid_request`] if `request_id` is
/// empty. Returns [`OrchestratorError::service_unavailable`] if any
/// fan-out branch fails — the whole aggregation is discarded rather than
/// returned as a partial success.
pub async fn fetch_trace(
    ctx: &RequestContext,
    request_id: &str,
    observability: &dyn ObservabilityManager,
    execution_repo: &dyn ExecutionRepo,
    secrets_repo: &dyn SecretsRepo,
    user_repo: &dyn UserRepo,
    image_repo: &dyn ImageRepo,
) -> Result<TraceResult> {
    if request_id.trim().is_empty() {
        return Err(OrchestratorError::invalid_request("request_id must not be empty"));
    }

    let logs_fut = observability.fetch_backend_logs(ctx, request_id);
    let executions_fut = execution_repo.get_executions_by_request_id(request_id);
    let secrets_fut = secrets_repo.get_secrets_by_request_id(request_id);
    let users_fut = user_repo.get_users_by_request_id(request_id);
    let images_fut = image_repo.get_images_by_request_id(request_id);

    let (logs, executions, secrets, users, images) =
        tokio::try_join!(logs_fut, executions_fut, secrets_fut, users_fut, images_fut).map_err(
            |err| {
                OrchestratorError::service_unavailable(format!(
                    "trace fan-out collapsed: {}",
                    err.message
                ))
                .with_context("request_id", request_id.to_string())
                .with_source(err)
            },
        )?;

    Ok(TraceResult {
        logs,
        executions,
        secrets,
        users,
        images,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::{BTreeMap, BTreeSet};
    use std::time::Duration as StdDuration;
    use tf_provider::InMemoryObservabilityManager;
    use tf_repo::{InMemoryExecutionRepo, InMemoryImageRepo, InMemorySecretsRepo, InMemoryUserRepo};
    use tf_status::ExecutionStatus;

    #[tokio::test]
    async fn empty_request_id_is_invalid_request() {
        let ctx = RequestContext::new("req-1");
        let observability = InMemoryObservabilityManager::new();
        let executions = InMemoryExecutionRepo::new();
        let secrets = InMemorySecretsRepo::new();
        let users = InMemoryUserRepo::new();
        let images = InMemoryImageRepo::new();
        let err = fetch_trace(&ctx, "", &observability, &executions, &secrets, &users, &images)
            .await
            .unwrap_err();
        assert_eq!(err.code, tf_error::ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn empty_slices_are_returned_instead_of_an_error_when_nothing_matches() {
        let ctx = RequestContext::new("req-1");
        let observability = InMemoryObservabilityManager::new();
        let executions = InMemoryExecutionRepo::new();
        let secrets = InMemorySecretsRepo::new();
        let users = InMemoryUserRepo::new();
        let images = InMemoryImageRepo::new();
        let trace = fetch_trace(&ctx, "req-nothing", &observability, &executions, &secrets, &users, &images)
            .await
            .unwrap();
        assert!(trace.logs.is_empty());
        assert!(trace.executions.is_empty());
        assert!(trace.secrets.is_empty());
        assert!(trace.users.is_empty());
        assert!(trace.images.is_empty());
    }

    #[tokio::test]
    async fn assembles_matching_records_from_every_branch() {
        let ctx = RequestContext::new("req-1");
        let observability = InMemoryObservabilityManager::new();
        observability.record("req-1", LogEvent::now("backend", "dispatching")).await;

        let executions = InMemoryExecutionRepo::new();
        executions
            .create_execution(Execution {
                execution_id: "e-1".to_string(),
                created_by: "dev@x.com".to_string(),
                owned_by: BTreeSet::from(["dev@x.com".to_string()]),
                command: "echo hi".to_string(),
                image_id: "img-1".to_string(),
                env: BTreeMap::new(),
                secrets: Vec::new(),
                started_at: Utc::now(),
                completed_at: None,
                status: ExecutionStatus::Running,
                exit_code: None,
                compute_platform: None,
                created_by_request_id: Some("req-1".to_string()),
                modified_by_request_id: None,
            })
            .await
            .unwrap();

        let secrets = InMemorySecretsRepo::new();
        let users = InMemoryUserRepo::new();
        let images = InMemoryImageRepo::new();

        let trace = fetch_trace(&ctx, "req-1", &observability, &executions, &secrets, &users, &images)
            .await
            .unwrap();
        assert_eq!(trace.logs.len(), 1);
        assert_eq!(trace.executions.len(), 1);
        assert_eq!(trace.executions[0].execution_id, "e-1");
    }

    /// A `LogManager`-shaped double that can be made to fail, used to
    /// prove the fan-out is cancel-on-first-error rather than
    /// best-effort partial success.
    struct FailingObservability;

    #[async_trait::async_trait]
    impl ObservabilityManager for FailingObservability {
        async fn fetch_backend_logs(
            &self,
            _ctx: &RequestContext,
            _request_id: &str,
        ) -> Result<Vec<LogEvent>> {
            tokio::time::sleep(StdDuration::from_millis(5)).await;
            Err(OrchestratorError::internal("backend log store unreachable"))
        }
    }

    #[tokio::test]
    async fn one_failing_branch_collapses_the_whole_trace() {
        let ctx = RequestContext::new("req-1");
        let observability = FailingObservability;
        let executions = InMemoryExecutionRepo::new();
        let secrets = InMemorySecretsRepo::new();
        let users = InMemoryUserRepo::new();
        let images = InMemoryImageRepo::new();
        let err = fetch_trace(&ctx, "req-1", &observability, &executions, &secrets, &users, &images)
            .await
            .unwrap_err();
        assert_eq!(err.code, tf_error::ErrorCode::ServiceUnavailable);
    }
}
