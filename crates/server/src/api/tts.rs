// Speech routes, forwarded to the local TTS server.

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use super::{ApiError, AppState};
use crate::{
    proxy::{tts::DEFAULT_AUDIO_TYPE, SpeakRequest},
    validation::ValidatedJson,
};

pub async fn voices(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.tts.voices().await?))
}

pub async fn speak(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SpeakRequest>,
) -> Result<Response, ApiError> {
    let audio = state.tts.speak(&request).await?;
    let content_type = HeaderValue::from_str(&audio.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_AUDIO_TYPE));
    Ok(([(CONTENT_TYPE, content_type)], audio.bytes).into_response())
}
