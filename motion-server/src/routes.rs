//! API route handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::metrics;
use crate::pipeline::EditRequest;
use crate::validation::{
    validate_animation_data, validate_animation_id, validate_prompt, ValidationError,
};
use crate::AppState;

/// Service banner for `GET /api/`.
pub const API_BANNER: &str = "MotionEdit API";

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        metrics::record_validation_failure(self.field());
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// API root.
pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": API_BANNER }))
}

/// Edit an animation with a natural-language prompt.
#[tracing::instrument(name = "edit_animation", skip_all)]
pub async fn edit_animation(
    State(state): State<AppState>,
    payload: Result<Json<EditRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejected edit body");
            metrics::record_validation_failure("body");
            return (rejection.status(), Json(json!({ "error": rejection.body_text() })))
                .into_response();
        }
    };

    if let Err(err) = check(&request) {
        tracing::debug!(error = %err, "invalid edit request");
        return err.into_response();
    }

    let subject_id = request.subject_id.as_deref().filter(|id| !id.is_empty());
    let result = state
        .pipeline
        .edit(&request.document, &request.prompt, subject_id)
        .await;
    Json(result).into_response()
}

fn check(request: &EditRequest) -> Result<(), ValidationError> {
    validate_prompt(&request.prompt)?;
    if let Some(id) = &request.subject_id {
        validate_animation_id(id)?;
    }
    validate_animation_data(request.document.as_value())
}
