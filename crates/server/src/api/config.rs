// Preferences routes: read, merge, export, import, reset.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::Response,
    Json,
};
use chrono::Local;
use notypdf_common::types::ConfigRecord;
use serde_json::{json, Value};

use super::{blocking, file_response, success_message, ApiError, AppState};
use crate::validation::ValidatedJson;

/// Multipart field carrying an uploaded backup.
const BACKUP_FIELD: &str = "file";

pub async fn get_config(State(state): State<AppState>) -> Result<Json<ConfigRecord>, ApiError> {
    let store = state.config.clone();
    let record = blocking(move || Ok(store.load()?)).await?;
    Ok(Json(record))
}

pub async fn save_config(
    State(state): State<AppState>,
    ValidatedJson(partial): ValidatedJson<Value>,
) -> Result<Json<Value>, ApiError> {
    let store = state.config.clone();
    let record = blocking(move || Ok(store.save(&partial)?)).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Configuration saved successfully",
        "config": record,
    })))
}

pub async fn backup_config(State(state): State<AppState>) -> Result<Response, ApiError> {
    let store = state.config.clone();
    let document = blocking(move || Ok(store.backup()?)).await?;
    let name = format!("notypdf-config-backup-{}.json", Local::now().format("%Y-%m-%d"));
    Ok(file_response(document.into_bytes(), "application/json", "attachment", &name))
}

/// Accepts the backup either as the JSON request body or as a multipart
/// `file` upload.
pub async fn restore_config(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    let raw = if is_multipart {
        let mut multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        let mut document = None;
        while let Some(field) = multipart.next_field().await? {
            if field.name() == Some(BACKUP_FIELD) {
                document = Some(field.bytes().await?);
                break;
            }
        }
        document.ok_or_else(|| ApiError::bad_request("No backup file provided"))?
    } else {
        Bytes::from_request(request, &state)
            .await
            .map_err(|rejection| match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => {
                    ApiError::PayloadTooLarge(rejection.body_text())
                }
                _ => ApiError::bad_request(rejection.body_text()),
            })?
    };

    let backup: Value = serde_json::from_slice(&raw)
        .map_err(|error| ApiError::bad_request(format!("Backup is not valid JSON: {error}")))?;

    let store = state.config.clone();
    blocking(move || Ok(store.restore(&backup)?)).await?;
    Ok(success_message("Configuration restored successfully"))
}

pub async fn clear_config(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let store = state.config.clone();
    blocking(move || Ok(store.clear()?)).await?;
    Ok(success_message("Configuration cleared successfully"))
}
