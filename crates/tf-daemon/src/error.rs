//! Maps [`tf_error::OrchestratorError`] onto an HTTP response using each
//! error kind's advisory status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tf_error::OrchestratorError;

/// A thin HTTP wrapper around [`OrchestratorError`]. Holds nothing the
/// orchestrator didn't already compute — `status_hint()` is the only
/// HTTP-specific decision made here.
#[derive(Debug)]
pub struct ApiError(pub OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.code.status_hint()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": {
                "code": self.0.code.as_str(),
                "message": self.0.message,
                "context": self.0.context,
            }
        }));
        (status, body).into_response()
    }
}
