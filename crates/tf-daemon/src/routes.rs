//! Route table and handlers: one handler per orchestrator operation.
//! Request/response shapes here are a thin Axum-facing wrapper around the
//! types `tf-orchestrator` already defines — this module adds no business
//! logic of its own.

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tf_orchestrator::{
    CreateSecretRequest, CreateUserRequest, RegisterImageRequest, ResolvedImage, RunCommandRequest,
};
use tf_provider::RequestContext;
use tf_status::ExecutionStatus;
use uuid::Uuid;

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/executions", post(run_command).get(list_executions))
        .route("/api/v1/executions/{id}", get(get_execution_status))
        .route("/api/v1/executions/{id}/kill", post(kill_execution))
        .route("/api/v1/executions/{id}/logs", get(get_logs))
        .route("/api/v1/trace/{request_id}", get(fetch_trace))
        .route("/api/v1/secrets", post(create_secret).get(list_secrets))
        .route(
            "/api/v1/secrets/{name}",
            get(get_secret).patch(update_secret).delete(delete_secret),
        )
        .route("/api/v1/images", post(register_image).get(list_images))
        .route("/api/v1/images/{id}", get(get_image).delete(remove_image))
        .route("/api/v1/users", post(create_user))
        .route("/api/v1/users/claim", post(claim_api_key))
        .route("/api/v1/users/{email}/revoke", post(revoke_user))
        .with_state(state)
}

fn new_ctx() -> RequestContext {
    RequestContext::new(Uuid::new_v4().to_string())
}

fn client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let reconciler = tf_health::HealthReconciler::new(
        state.orchestrator.execution_repo().clone(),
        state.orchestrator.health_manager().clone(),
    );
    match reconciler.reconcile().await {
        Ok(report) => {
            let status = if report.is_healthy() { "ok" } else { "degraded" };
            Json(json!({
                "status": status,
                "checked_at": report.checked_at,
                "drifts": report.drifts.len(),
            }))
            .into_response()
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

// -- Executions --------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RunCommandBody {
    #[serde(flatten)]
    req: RunCommandRequest,
    resolved_image_id: Option<String>,
}

async fn run_command(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    headers: axum::http::HeaderMap,
    Json(body): Json<RunCommandBody>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = new_ctx();
    let resolved_image = body.resolved_image_id.map(|image_id| ResolvedImage { image_id });

    state
        .orchestrator
        .validate_execution_resource_access(&user.email, &body.req, resolved_image.as_ref())
        .await?;

    let response = state
        .orchestrator
        .run_command(&ctx, &user.email, client_ip(&headers).as_deref(), body.req, resolved_image)
        .await?;

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ListExecutionsQuery {
    limit: Option<usize>,
    status: Option<String>,
}

async fn list_executions(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(_user): AuthenticatedUser,
    Query(q): Query<ListExecutionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let statuses: Vec<ExecutionStatus> = q
        .status
        .as_deref()
        .map(parse_statuses)
        .transpose()?
        .unwrap_or_default();
    let executions = state
        .orchestrator
        .list_executions(q.limit.unwrap_or(0), &statuses)
        .await?;
    Ok(Json(executions))
}

fn parse_statuses(raw: &str) -> Result<Vec<ExecutionStatus>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s {
            "starting" => Ok(ExecutionStatus::Starting),
            "running" => Ok(ExecutionStatus::Running),
            "succeeded" => Ok(ExecutionStatus::Succeeded),
            "failed" => Ok(ExecutionStatus::Failed),
            "stopped" => Ok(ExecutionStatus::Stopped),
            "terminating" => Ok(ExecutionStatus::Terminating),
            other => Err(tf_error::OrchestratorError::invalid_request(format!("unknown status: {other}")).into()),
        })
        .collect()
}

async fn get_execution_status(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(_user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let execution = state.orchestrator.get_execution_status(&id).await?;
    Ok(Json(execution))
}

async fn kill_execution(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(_user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = new_ctx();
    match state.orchestrator.kill_execution(&ctx, &id).await? {
        Some(execution) => Ok((StatusCode::OK, Json(Some(execution)))),
        None => Ok((StatusCode::NO_CONTENT, Json(None))),
    }
}

async fn get_logs(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
    headers: axum::http::HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = new_ctx();
    let response = state
        .orchestrator
        .get_logs_by_execution_id(&ctx, &id, Some(&user.email), client_ip(&headers).as_deref())
        .await?;
    Ok(Json(response))
}

async fn fetch_trace(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(_user): AuthenticatedUser,
    Path(request_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = new_ctx();
    let result = state.orchestrator.fetch_trace(&ctx, &request_id).await?;
    Ok(Json(result))
}

// -- Secrets -------------------------------------------------------------

async fn create_secret(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(req): Json<CreateSecretRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = new_ctx();
    let secret = state.orchestrator.create_secret(ctx.request_id(), &user.email, req).await?;
    Ok(Json(secret))
}

#[derive(Debug, Deserialize)]
struct SecretQuery {
    #[serde(default)]
    include_value: bool,
}

async fn list_secrets(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(_user): AuthenticatedUser,
    Query(q): Query<SecretQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let secrets = state.orchestrator.list_secrets(q.include_value).await?;
    Ok(Json(secrets))
}

async fn get_secret(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(_user): AuthenticatedUser,
    Path(name): Path<String>,
    Query(q): Query<SecretQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let secret = state.orchestrator.get_secret(&name, q.include_value).await?;
    Ok(Json(secret))
}

#[derive(Debug, Deserialize)]
struct UpdateSecretBody {
    key_name: String,
    description: String,
    value: String,
}

async fn update_secret(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(_user): AuthenticatedUser,
    Path(name): Path<String>,
    Json(body): Json<UpdateSecretBody>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = new_ctx();
    let secret = state
        .orchestrator
        .update_secret(ctx.request_id(), &name, body.key_name, body.description, body.value)
        .await?;
    Ok(Json(secret))
}

async fn delete_secret(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(_user): AuthenticatedUser,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.orchestrator.delete_secret(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Images ----------------------------------------------------------------

async fn register_image(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(req): Json<RegisterImageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = new_ctx();
    let image = state.orchestrator.register_image(&ctx, &user.email, req).await?;
    Ok(Json(image))
}

async fn list_images(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(_user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = new_ctx();
    let images = state.orchestrator.list_images(&ctx).await?;
    Ok(Json(images))
}

async fn get_image(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(_user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = new_ctx();
    let image = state.orchestrator.get_image(&ctx, &id).await?;
    Ok(Json(image))
}

async fn remove_image(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(_user): AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = new_ctx();
    state.orchestrator.remove_image(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Users -------------------------------------------------------------
//
// The RBAC rule table grants every action on `/api/*/users/*` to `admin`
// alone, so user-management routes enforce that directly rather than
// through `Orchestrator::validate_execution_resource_access` (which only
// covers images and secrets).

async fn require_users_access(
    state: &AppState,
    subject: &str,
    action: tf_rbac::Action,
) -> Result<(), ApiError> {
    let allowed = state
        .orchestrator
        .enforcer()
        .enforce(subject, "/api/v1/users", action)
        .await
        .map_err(|err| tf_error::OrchestratorError::internal("enforcer check failed").with_source(err))?;
    if allowed {
        Ok(())
    } else {
        Err(tf_error::OrchestratorError::forbidden("not permitted to manage users").into())
    }
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_users_access(&state, &admin.email, tf_rbac::Action::Create).await?;
    let ctx = new_ctx();
    let response = state.orchestrator.create_user(ctx.request_id(), req).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ClaimBody {
    claim_token: String,
}

async fn claim_api_key(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<ClaimBody>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state
        .orchestrator
        .claim_api_key(&body.claim_token, client_ip(&headers))
        .await?;
    Ok(Json(response))
}

async fn revoke_user(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(email): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_users_access(&state, &admin.email, tf_rbac::Action::Delete).await?;
    state.orchestrator.revoke_user(&email).await?;
    Ok(StatusCode::NO_CONTENT)
}
