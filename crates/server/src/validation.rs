// Request body validation.
//
// `ValidatedJson<T>` turns axum's plain-text JSON rejections into the
// structured error body every other failure uses.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::{AppError, ErrorCode};

/// Global REST request body limit in bytes (1 MiB). Upload and restore
/// routes raise it to the configured upload limit.
pub const MAX_REST_BODY_BYTES: usize = 1024 * 1024;

/// A JSON body extractor that answers `VALIDATION_FAILED` on bad input.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidatedJson(value)),
            Err(rejection) => Err(rejection_error(&rejection).into_response()),
        }
    }
}

fn rejection_error(rejection: &JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::from_code(ErrorCode::PayloadTooLarge);
    }

    let (message, kind) = match rejection {
        JsonRejection::JsonDataError(e) => (format!("invalid JSON payload: {e}"), "data_error"),
        JsonRejection::JsonSyntaxError(e) => (format!("malformed JSON: {e}"), "syntax_error"),
        JsonRejection::MissingJsonContentType(_) => {
            ("expected Content-Type: application/json".to_string(), "missing_content_type")
        }
        other => (format!("request body error: {other}"), "body_error"),
    };
    AppError::new(ErrorCode::ValidationFailed, message).with_detail("kind", json!(kind))
}
