//! Execution lifecycle: `RunCommand`, `ValidateExecutionResourceAccess`,
//! `GetExecutionStatus`, `KillExecution`, `GetLogsByExecutionID`, and
//! `ListExecutions`.

use crate::Orchestrator;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use tf_error::{OrchestratorError, Result};
use tf_provider::{LogEvent, RequestContext, TaskSpec};
use tf_rbac::Action;
use tf_repo::Execution;
use tf_status::{can_transition, ExecutionStatus};
use tracing::{instrument, warn};

/// Input to [`Orchestrator::run_command`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunCommandRequest {
    /// The command to run. Must be non-empty.
    pub command: String,
    /// The human image name, or a resolved image id if `resolved_image_id`
    /// is supplied.
    pub image: String,
    /// Explicit environment. Wins over any resolved secret targeting the
    /// same key.
    pub env: BTreeMap<String, String>,
    /// Secret names to resolve into `env`.
    pub secrets: Vec<String>,
}

/// An image id resolved by the caller ahead of time; `resolved_image` on
/// a request is always optional.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    /// The provider-stable image id.
    pub image_id: String,
}

/// Response to a successful [`Orchestrator::run_command`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResponse {
    /// The provider-issued execution id.
    pub execution_id: String,
    /// Always `Starting` on a fresh `RunCommand` success.
    pub status: ExecutionStatus,
    /// The image id the execution ultimately ran under.
    pub image_id: String,
    /// The streaming URL, or an empty string if minting failed.
    pub websocket_url: String,
}

/// Response to [`Orchestrator::get_logs_by_execution_id`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    /// Populated only for a terminal execution. `None` while non-terminal.
    pub events: Option<Vec<LogEvent>>,
    /// The streaming URL for a non-terminal execution; empty otherwise or
    /// if minting failed.
    pub websocket_url: String,
}

impl Orchestrator {
    /// Validate, resolve secrets, dispatch, record, grant ownership, and
    /// issue a streaming credential for a new command execution.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for an empty command or an unresolvable secret
    /// name, `InternalError` for an empty secret `key_name` or a
    /// dispatch/synchronization failure, `DatabaseError` if the execution
    /// record cannot be persisted after the provider already accepted it.
    #[instrument(skip(self, ctx, req), fields(user_email = user_email, request_id = ctx.request_id()))]
    pub async fn run_command(
        &self,
        ctx: &RequestContext,
        user_email: &str,
        client_ip: Option<&str>,
        mut req: RunCommandRequest,
        resolved_image: Option<ResolvedImage>,
    ) -> Result<ExecutionResponse> {
        if req.command.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("command must not be empty"));
        }

        if let Some(resolved) = &resolved_image {
            req.image = resolved.image_id.clone();
        }

        let mut resolved_secret_names = Vec::new();
        let mut secret_env = BTreeMap::new();
        let mut seen = BTreeSet::new();
        for raw_name in &req.secrets {
            let name = raw_name.trim();
            if name.is_empty() || !seen.insert(name.to_string()) {
                continue;
            }
            let secret = self.secrets_repo.get_secret(name, true).await.map_err(|err| {
                if err.code == tf_error::ErrorCode::NotFound {
                    OrchestratorError::invalid_request(format!("unknown secret: {name}"))
                        .with_context("secret_name", name.to_string())
                        .with_source(err)
                } else {
                    err.with_context("secret_name", name.to_string())
                }
            })?;
            if secret.key_name.trim().is_empty() {
                return Err(OrchestratorError::internal(format!(
                    "secret {name} has an empty key_name"
                ))
                .with_context("secret_name", name.to_string()));
            }
            secret_env.insert(secret.key_name.clone(), secret.value.clone());
            resolved_secret_names.push(name.to_string());
        }

        // Explicit env always wins over a resolved secret's value.
        for (key, value) in secret_env {
            req.env.entry(key).or_insert(value);
        }

        let spec = TaskSpec {
            command: req.command.clone(),
            image: req.image.clone(),
            env: req.env.clone(),
        };
        let (execution_id, provider_started_at) = self
            .task_manager
            .start_task(ctx, user_email, &spec)
            .await
            .map_err(|err| {
                OrchestratorError::internal("task dispatch failed").with_source(err)
            })?;

        let execution = Execution {
            execution_id: execution_id.clone(),
            created_by: user_email.to_string(),
            owned_by: BTreeSet::from([user_email.to_string()]),
            command: req.command,
            image_id: req.image.clone(),
            env: req.env,
            secrets: resolved_secret_names,
            started_at: provider_started_at.unwrap_or_else(Utc::now),
            completed_at: None,
            status: ExecutionStatus::Starting,
            exit_code: None,
            compute_platform: None,
            created_by_request_id: Some(ctx.request_id().to_string()),
            modified_by_request_id: None,
        };

        self.execution_repo
            .create_execution(execution.clone())
            .await
            .map_err(|err| {
                OrchestratorError::database_error(
                    "execution accepted by provider but could not be recorded",
                )
                .with_context("execution_id", execution_id.clone())
                .with_source(err)
            })?;

        self.enforcer
            .add_ownership_for_resource(&format!("execution:{execution_id}"), user_email)
            .await
            .map_err(|err| {
                OrchestratorError::internal("failed to synchronize execution ownership")
                    .with_context("execution_id", execution_id.clone())
                    .with_source(err)
            })?;

        let websocket_url = match self
            .websocket_manager
            .generate_websocket_url(ctx, &execution_id, Some(user_email), client_ip)
            .await
        {
            Ok(url) => url,
            Err(err) => {
                warn!(execution_id = %execution_id, error = %err, "streaming URL mint failed, continuing without one");
                String::new()
            }
        };

        Ok(ExecutionResponse {
            execution_id,
            status: ExecutionStatus::Starting,
            image_id: execution.image_id,
            websocket_url,
        })
    }

    /// Check that `user_email` may use the resolved image (if any) and
    /// every named secret in `req`.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` if any check is denied, `InternalError` if the
    /// enforcer itself fails (e.g. not yet hydrated).
    pub async fn validate_execution_resource_access(
        &self,
        user_email: &str,
        req: &RunCommandRequest,
        resolved_image: Option<&ResolvedImage>,
    ) -> Result<()> {
        if let Some(resolved) = resolved_image {
            let object = format!("/api/v1/images/{}", resolved.image_id);
            let allowed = self
                .enforcer
                .enforce(user_email, &object, Action::Use)
                .await
                .map_err(|err| OrchestratorError::internal("enforcer check failed").with_source(err))?;
            if !allowed {
                return Err(OrchestratorError::forbidden("not permitted to use this image")
                    .with_context("image_id", resolved.image_id.clone()));
            }
        }

        for raw_name in &req.secrets {
            let name = raw_name.trim();
            if name.is_empty() {
                continue;
            }
            let object = format!("/api/v1/secrets/{name}");
            let allowed = self
                .enforcer
                .enforce(user_email, &object, Action::Use)
                .await
                .map_err(|err| OrchestratorError::internal("enforcer check failed").with_source(err))?;
            if !allowed {
                return Err(OrchestratorError::forbidden("not permitted to use this secret")
                    .with_context("secret_name", name.to_string()));
            }
        }

        Ok(())
    }

    /// Fetch the current record for `execution_id`.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for an empty id, `NotFound` if absent,
    /// `InternalError` if the stored record is missing `command` or
    /// `image_id`.
    pub async fn get_execution_status(&self, execution_id: &str) -> Result<Execution> {
        if execution_id.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("execution_id must not be empty"));
        }
        let execution = self
            .execution_repo
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| {
                OrchestratorError::not_found(format!("execution not found: {execution_id}"))
                    .with_context("execution_id", execution_id.to_string())
            })?;

        let mut missing = Vec::new();
        if execution.command.trim().is_empty() {
            missing.push("command");
        }
        if execution.image_id.trim().is_empty() {
            missing.push("image_id");
        }
        if !missing.is_empty() {
            return Err(OrchestratorError::internal(format!(
                "execution record is missing required fields: {}",
                missing.join(", ")
            ))
            .with_context("execution_id", execution_id.to_string()));
        }

        Ok(execution)
    }

    /// Idempotently request termination of an execution.
    ///
    /// Returns `Ok(None)` if the execution is already terminal — the caller
    /// should treat this as a no-op success (204 No Content at the HTTP
    /// boundary), not as an error.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for an empty id, `NotFound` if absent,
    /// `InternalError` if the provider kill call fails, `DatabaseError` if
    /// the updated record cannot be persisted.
    pub async fn kill_execution(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
    ) -> Result<Option<Execution>> {
        if execution_id.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("execution_id must not be empty"));
        }
        let mut execution = self
            .execution_repo
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| {
                OrchestratorError::not_found(format!("execution not found: {execution_id}"))
            })?;

        if !can_transition(execution.status, ExecutionStatus::Terminating) {
            return Ok(None);
        }

        self.task_manager
            .kill_task(ctx, execution_id)
            .await
            .map_err(|err| OrchestratorError::internal("provider kill failed").with_source(err))?;

        execution.status = ExecutionStatus::Terminating;
        execution.completed_at = None;
        execution.modified_by_request_id = Some(ctx.request_id().to_string());

        self.execution_repo
            .update_execution(execution.clone())
            .await
            .map_err(|err| {
                OrchestratorError::database_error("failed to persist terminating status").with_source(err)
            })?;

        Ok(Some(execution))
    }

    /// Fetch logs for a terminal execution, or a fresh streaming URL for a
    /// non-terminal one.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for an empty id, `NotFound` if absent, or whatever
    /// the log manager returns for a terminal fetch.
    pub async fn get_logs_by_execution_id(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
        user_email: Option<&str>,
        client_ip: Option<&str>,
    ) -> Result<LogsResponse> {
        if execution_id.trim().is_empty() {
            return Err(OrchestratorError::invalid_request("execution_id must not be empty"));
        }
        let execution = self
            .execution_repo
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| {
                OrchestratorError::not_found(format!("execution not found: {execution_id}"))
            })?;

        if execution.status.is_terminal() {
            let events = self.log_manager.fetch_logs_by_execution_id(ctx, execution_id).await?;
            return Ok(LogsResponse {
                events: Some(events),
                websocket_url: String::new(),
            });
        }

        let websocket_url = match self
            .websocket_manager
            .generate_websocket_url(ctx, execution_id, user_email, client_ip)
            .await
        {
            Ok(url) => url,
            Err(err) => {
                warn!(execution_id, error = %err, "streaming URL mint failed for log fetch, continuing without one");
                String::new()
            }
        };

        Ok(LogsResponse {
            events: None,
            websocket_url,
        })
    }

    /// List executions, newest first, optionally filtered to `statuses`.
    /// `limit == 0` falls back to [`crate::OrchestratorSettings::default_execution_list_limit`].
    ///
    /// # Errors
    ///
    /// Whatever the execution repository surfaces.
    pub async fn list_executions(&self, limit: usize, statuses: &[ExecutionStatus]) -> Result<Vec<Execution>> {
        let effective_limit = if limit == 0 {
            self.settings.default_execution_list_limit
        } else {
            limit
        };
        self.execution_repo.list_executions(effective_limit, statuses).await
    }
}
