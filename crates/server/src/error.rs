use std::future::Future;

use axum::{
    http::{header::HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

tokio::task_local! {
    static REQUEST_ID: String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationFailed,
    NotFound,
    PayloadTooLarge,
    UpstreamFailed,
    UpstreamUnavailable,
    InternalError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::NotFound => "NOT_FOUND",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::UpstreamFailed => "UPSTREAM_FAILED",
            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub const fn status(self) -> StatusCode {
        match self {
            Self::ValidationFailed => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UpstreamFailed => StatusCode::BAD_GATEWAY,
            Self::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ValidationFailed => "request validation failed",
            Self::NotFound => "requested resource not found",
            Self::PayloadTooLarge => "payload exceeds maximum allowed size",
            Self::UpstreamFailed => "upstream service returned an error",
            Self::UpstreamUnavailable => "upstream service is unreachable",
            Self::InternalError => "internal server error",
        }
    }
}

/// Structured error response: `{"error": <message>, "code": ..., "request_id": ...}`.
///
/// `error` is always a plain string so clients can surface it directly.
#[derive(Debug, Clone)]
pub struct AppError {
    code: ErrorCode,
    status: StatusCode,
    message: String,
    details: Map<String, Value>,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status: code.status(),
            message: message.into(),
            details: Map::new(),
            request_id: None,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Keep the upstream's own status code instead of the registry default.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Extra top-level fields merged into the body.
    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_owned(), value);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = self.request_id.or_else(current_request_id);

        let mut body = self.details;
        body.insert("error".into(), json!(self.message));
        body.insert("code".into(), json!(self.code.as_str()));
        body.insert("request_id".into(), json!(request_id.clone()));

        let mut response = (self.status, Json(Value::Object(body))).into_response();

        if let Some(request_id) = request_id {
            attach_request_id_header(&mut response, &request_id);
        }

        response
    }
}

pub async fn with_request_id_scope<F>(request_id: String, future: F) -> F::Output
where
    F: Future,
{
    REQUEST_ID.scope(request_id, future).await
}

pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(Clone::clone).ok()
}

pub fn request_id_from_headers_or_generate(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub fn attach_request_id_header(response: &mut Response, request_id: &str) {
    if let Ok(header) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header);
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::to_bytes, http::StatusCode, response::IntoResponse};
    use serde_json::{json, Value};

    use super::{with_request_id_scope, AppError, ErrorCode};

    async fn body_json(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("error response body should be readable");
        serde_json::from_slice(&body).expect("error response body should be valid json")
    }

    #[tokio::test]
    async fn app_error_uses_scoped_request_id() {
        let response = with_request_id_scope("req-scoped-123".to_owned(), async {
            AppError::from_code(ErrorCode::InternalError).into_response()
        })
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()["x-request-id"], "req-scoped-123");
        let parsed = body_json(response).await;

        assert_eq!(parsed["error"], "internal server error");
        assert_eq!(parsed["code"], "INTERNAL_ERROR");
        assert_eq!(parsed["request_id"], "req-scoped-123");
    }

    #[tokio::test]
    async fn error_field_is_a_plain_string() {
        let response = AppError::new(ErrorCode::ValidationFailed, "File type not allowed")
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let parsed = body_json(response).await;
        assert_eq!(parsed["error"], "File type not allowed");
        assert_eq!(parsed["request_id"], Value::Null);
    }

    #[tokio::test]
    async fn upstream_status_and_details_are_preserved() {
        let response = AppError::new(ErrorCode::UpstreamFailed, "object_not_found")
            .with_status(StatusCode::NOT_FOUND)
            .with_detail("upstream_status", json!(404))
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let parsed = body_json(response).await;
        assert_eq!(parsed["upstream_status"], 404);
        assert_eq!(parsed["code"], "UPSTREAM_FAILED");
    }

    #[tokio::test]
    async fn explicit_request_id_overrides_scope() {
        let response = with_request_id_scope("req-scoped-123".to_owned(), async {
            AppError::from_code(ErrorCode::NotFound)
                .with_request_id("req-explicit-456")
                .into_response()
        })
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let parsed = body_json(response).await;
        assert_eq!(parsed["request_id"], "req-explicit-456");
    }
}
