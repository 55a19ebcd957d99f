use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::api::middleware::AppError;
use crate::api::routes::AppState;
use crate::models::TriageRequest;
use crate::services::TriageService;

/// POST /api/v1/chat/ai-triage
///
/// Failures after the form is accepted keep the `code`/`msg` envelope the
/// triage client reads, instead of the generic error body.
pub async fn ai_triage(
    State(state): State<AppState>,
    Json(payload): Json<TriageRequest>,
) -> Result<Response, AppError> {
    let form = payload
        .data
        .ok_or_else(|| AppError::Validation("form data is required".to_string()))?;

    match TriageService::new(state.llm.as_ref()).assess(&form).await {
        Ok(result) => Ok(Json(serde_json::json!({
            "code": 1,
            "data": result
        }))
        .into_response()),
        Err(e) => {
            tracing::error!("AI triage failed: {}", e);
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "code": 2,
                    "error": "AI triage failed",
                    "msg": e.reason()
                })),
            )
                .into_response())
        }
    }
}
