//! API-key authentication extractor.
//!
//! Every route except `/health` requires a `Authorization: Bearer
//! <api-key>` header. The key is resolved through
//! [`tf_orchestrator::Orchestrator::authenticate`] — this crate never
//! looks at a user record directly.

use crate::{ApiError, AppState};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;
use tf_error::OrchestratorError;
use tf_repo::User;

/// The authenticated caller for a request, extracted once per handler.
pub struct AuthenticatedUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| OrchestratorError::new(tf_error::ErrorCode::InvalidApiKey, "missing Authorization header"))?;

        let api_key = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| OrchestratorError::new(tf_error::ErrorCode::InvalidApiKey, "expected a Bearer token"))?;

        let user = state.orchestrator.authenticate(api_key).await?;
        Ok(AuthenticatedUser(user))
    }
}
