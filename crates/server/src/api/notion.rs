// Notion proxy routes. Forwarded bodies pass through untouched.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{ApiError, AppState};
use crate::{proxy::IdentifierTarget, validation::ValidatedJson};

#[derive(Debug, Deserialize)]
pub struct SaveTextRequest {
    #[serde(default)]
    config: Option<IdentifierTarget>,
    #[serde(default)]
    text: String,
}

pub async fn get_database(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.notion.get_database(&id).await?))
}

pub async fn update_database(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<Value>,
) -> Result<Json<Value>, ApiError> {
    let updated = state.notion.update_database(&id, body).await?;
    info!(database_id = %id, "updated notion database");
    Ok(Json(updated))
}

/// An empty body queries without filters.
pub async fn query_database(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let query = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(
            serde_json::from_slice(&body)
                .map_err(|error| ApiError::bad_request(format!("malformed JSON: {error}")))?,
        )
    };
    Ok(Json(state.notion.query_database(&id, query).await?))
}

pub async fn create_page(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<Value>,
) -> Result<Json<Value>, ApiError> {
    let page = state.notion.create_page(body).await?;
    let page_id = page.get("id").and_then(Value::as_str).unwrap_or_default();
    info!(page_id, "created notion page");
    Ok(Json(page))
}

pub async fn update_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<Value>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.notion.update_page(&id, body).await?))
}

pub async fn save_text_with_identifier(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SaveTextRequest>,
) -> Result<Json<Value>, ApiError> {
    let Some(target) = request.config else {
        return Err(ApiError::bad_request("Missing config or text"));
    };
    if request.text.trim().is_empty() {
        return Err(ApiError::bad_request("Missing config or text"));
    }
    let saved = state.notion.save_text_with_identifier(&target, &request.text).await?;
    Ok(Json(json!({
        "success": true,
        "identifier": saved.identifier,
        "page_id": saved.page_id,
    })))
}

/// Always answers 200; `success` tells whether the credentials work.
pub async fn test_connection(State(state): State<AppState>) -> Json<Value> {
    match state.notion.test_connection().await {
        Ok(user_count) => Json(json!({
            "success": true,
            "message": "Connection successful",
            "user_count": user_count,
        })),
        Err(error) => {
            warn!(%error, "notion connection test failed");
            Json(json!({ "success": false, "message": error.to_string() }))
        }
    }
}
