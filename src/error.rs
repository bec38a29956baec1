use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

use crate::pipeline::PipelineError;
use crate::quota::{AuthError, QuotaError};

/// Error type returned by every handler; owns the status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("bad request: {0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::BadRequest(format!("malformed multipart body: {}", e.body_text()))
    }
}

fn body(error: impl Into<Value>) -> Value {
    json!({ "ok": false, "error": error.into() })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, body(message)),
            ApiError::Auth(e) => (StatusCode::BAD_REQUEST, body(e.to_string())),
            ApiError::Pipeline(e) => match e {
                PipelineError::InvalidInput(message) => (StatusCode::BAD_REQUEST, body(message)),
                PipelineError::Document(e) => (StatusCode::BAD_REQUEST, body(e.to_string())),
                PipelineError::Quota(QuotaError::NotWhitelisted) => (StatusCode::FORBIDDEN, body("not_whitelisted")),
                PipelineError::Quota(QuotaError::NoCredits) => (StatusCode::FORBIDDEN, body("no_credits")),
                PipelineError::Quota(QuotaError::UserNotFound(_)) => (StatusCode::NOT_FOUND, body("user_not_found")),
                PipelineError::Quota(QuotaError::Unavailable(message)) => {
                    error!("❌ Quota check failed: {}", message);
                    (StatusCode::INTERNAL_SERVER_ERROR, json!({ "ok": false, "status": "failed", "error": message }))
                }
                PipelineError::NoEditsRemaining(_) => (StatusCode::FORBIDDEN, body("no_edits_remaining")),
                e @ PipelineError::NotFound { .. } => (StatusCode::NOT_FOUND, body(e.to_string())),
                PipelineError::CoolingDown(decision) => {
                    let seconds = decision.remaining_secs();
                    (
                        StatusCode::TOO_MANY_REQUESTS,
                        json!({
                            "ok": false,
                            "error": format!("Please wait {seconds} more second(s) before editing again"),
                            "retry_after_secs": seconds,
                        }),
                    )
                }
                PipelineError::ValidationFailed { generation_id, report, attempts } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({
                        "ok": false,
                        "generation_id": generation_id,
                        "status": "validation_failed",
                        "errors": report.errors,
                        "warnings": report.warnings,
                        "attempts": attempts,
                    }),
                ),
                e @ PipelineError::MissingConfig(_) => {
                    error!("❌ {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, json!({ "ok": false, "status": "failed", "error": e.to_string() }))
                }
                PipelineError::Failed { generation_id, message } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "ok": false, "generation_id": generation_id, "status": "failed", "error": message }),
                ),
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cooldown::CooldownDecision;
    use crate::validation::ValidationReport;
    use std::time::Duration;
    use uuid::Uuid;

    async fn error_to_response(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn quota_rejections_use_stable_codes() {
        let (status, json) = error_to_response(PipelineError::Quota(QuotaError::NoCredits).into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "no_credits");

        let (status, json) = error_to_response(PipelineError::NoEditsRemaining(Uuid::nil()).into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "no_edits_remaining");
    }

    #[tokio::test]
    async fn validation_exhaustion_is_422_not_500() {
        let id = Uuid::new_v4();
        let err = PipelineError::ValidationFailed {
            generation_id: id,
            report: ValidationReport {
                valid: false,
                errors: vec!["length exceeded: cta.headline (31>30)".into()],
                warnings: vec![],
            },
            attempts: 2,
        };
        let (status, json) = error_to_response(err.into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["status"], "validation_failed");
        assert_eq!(json["attempts"], 2);
        assert_eq!(json["generation_id"], id.to_string());
    }

    #[tokio::test]
    async fn cooldown_carries_remaining_seconds() {
        let decision = CooldownDecision { allowed: false, remaining: Duration::from_millis(4_200) };
        let (status, json) = error_to_response(PipelineError::CoolingDown(decision).into()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["retry_after_secs"], 5);
        assert_eq!(json["error"], "Please wait 5 more second(s) before editing again");
    }

    #[tokio::test]
    async fn missing_configuration_is_named() {
        let (status, json) = error_to_response(PipelineError::MissingConfig("RENDER_SERVER_URL").into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "missing configuration: RENDER_SERVER_URL");
    }
}
