// Translation routes.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::{ApiError, AppState};
use crate::{proxy::Provider, validation::ValidatedJson};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    #[serde(default)]
    text: String,
    #[serde(default)]
    provider: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    target_language: String,
}

#[derive(Debug, Deserialize)]
pub struct TestRequest {
    #[serde(default)]
    provider: String,
    #[serde(default)]
    model: String,
}

pub async fn translate(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<TranslateRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.text.trim().is_empty() {
        return Err(ApiError::bad_request("Text is required"));
    }
    let provider: Provider = request.provider.parse()?;

    let translated = state
        .translation
        .translate(provider, &request.model, &request.target_language, &request.text)
        .await?;

    Ok(Json(json!({ "success": true, "translated_text": translated })))
}

/// Probe a provider. Always answers 200 once the request itself is valid.
pub async fn test_provider(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<TestRequest>,
) -> Result<Json<Value>, ApiError> {
    let provider: Provider = request.provider.parse()?;

    let body = match state.translation.test_connection(provider, &request.model).await {
        Ok(()) => json!({
            "success": true,
            "message": format!("{} API connection successful!", provider.display_name()),
        }),
        Err(error) => {
            warn!(provider = %provider, %error, "translation provider test failed");
            json!({
                "success": false,
                "message": format!("{} API test failed: {error}", provider.display_name()),
            })
        }
    };
    Ok(Json(body))
}
