// Forwarder for a Kokoro-compatible speech server.

use reqwest::{header::CONTENT_TYPE, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{check_response, endpoint, ProxyError};

const SERVICE: &str = "TTS server";
pub const DEFAULT_AUDIO_TYPE: &str = "audio/wav";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeakRequest {
    pub text: String,
    pub voice: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_speed() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct TtsClient {
    http: Client,
    base_url: String,
}

impl TtsClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    /// Voice catalogue as reported by the speech server (`{"voices": [...]}`).
    pub async fn voices(&self) -> Result<Value, ProxyError> {
        let response = self
            .http
            .get(endpoint(&self.base_url, "voices")?)
            .send()
            .await
            .map_err(ProxyError::network(SERVICE))?;
        let response = check_response(SERVICE, response).await?;
        response.json().await.map_err(|error| ProxyError::UnexpectedResponse {
            service: SERVICE,
            message: error.to_string(),
        })
    }

    /// Synthesize speech. The server answers either audio bytes or a JSON
    /// `{"error": ...}` object with a 200 status; the latter is an error here.
    pub async fn speak(&self, request: &SpeakRequest) -> Result<SpeechAudio, ProxyError> {
        if request.text.trim().is_empty() {
            return Err(ProxyError::InvalidRequest("Text is required".into()));
        }
        if request.voice.trim().is_empty() {
            return Err(ProxyError::InvalidRequest("Voice is required".into()));
        }

        let response = self
            .http
            .post(endpoint(&self.base_url, "speak")?)
            .json(request)
            .send()
            .await
            .map_err(ProxyError::network(SERVICE))?;
        let response = check_response(SERVICE, response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_AUDIO_TYPE)
            .to_owned();
        let bytes = response.bytes().await.map_err(ProxyError::network(SERVICE))?.to_vec();

        if content_type.starts_with("application/json") {
            let message = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_owned))
                .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());
            return Err(ProxyError::UnexpectedResponse { service: SERVICE, message });
        }

        info!(voice = %request.voice, bytes = bytes.len(), "synthesized speech");
        Ok(SpeechAudio { content_type, bytes })
    }
}
