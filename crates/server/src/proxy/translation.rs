// Translation dispatcher over OpenAI-compatible chat completions and Gemini.

use std::{fmt, str::FromStr};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use super::{check_response, endpoint, ProxyError};
use crate::config::{ProviderEndpoint, ServerConfig};

const SYSTEM_PROMPT: &str = "You are a translation assistant. Always format your translations as \
markdown to preserve structure, paragraph breaks, and titles.";
const MAX_TOKENS: u32 = 2048;
const TEMPERATURE: f32 = 0.2;

/// Text sent by the connection test.
const PROBE_TEXT: &str = "Hello";
const PROBE_LANGUAGE: &str = "Spanish";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    OpenRouter,
    DeepSeek,
    Gemini,
}

impl Provider {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
            Self::DeepSeek => "deepseek",
            Self::Gemini => "gemini",
        }
    }

    /// Name used in user-facing messages.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::OpenRouter => "OpenRouter",
            Self::DeepSeek => "DeepSeek",
            Self::Gemini => "Gemini",
        }
    }

    pub const fn key_variable(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ProxyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "openrouter" => Ok(Self::OpenRouter),
            "deepseek" => Ok(Self::DeepSeek),
            "gemini" => Ok(Self::Gemini),
            other => Err(ProxyError::InvalidRequest(format!("Unsupported provider: {other}"))),
        }
    }
}

#[derive(Clone)]
pub struct TranslationService {
    http: Client,
    openai: ProviderEndpoint,
    openrouter: ProviderEndpoint,
    deepseek: ProviderEndpoint,
    gemini: ProviderEndpoint,
}

impl TranslationService {
    pub fn new(http: Client, config: &ServerConfig) -> Self {
        Self {
            http,
            openai: config.openai.clone(),
            openrouter: config.openrouter.clone(),
            deepseek: config.deepseek.clone(),
            gemini: config.gemini.clone(),
        }
    }

    fn endpoint_for(&self, provider: Provider) -> &ProviderEndpoint {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::OpenRouter => &self.openrouter,
            Provider::DeepSeek => &self.deepseek,
            Provider::Gemini => &self.gemini,
        }
    }

    /// Translate `text` into `target_language`, returning Markdown.
    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn translate(
        &self,
        provider: Provider,
        model: &str,
        target_language: &str,
        text: &str,
    ) -> Result<String, ProxyError> {
        if model.trim().is_empty() {
            return Err(ProxyError::InvalidRequest("Model is required".into()));
        }
        if target_language.trim().is_empty() {
            return Err(ProxyError::InvalidRequest("Target language is required".into()));
        }

        let target = self.endpoint_for(provider);
        let api_key = target.api_key.as_deref().ok_or_else(|| {
            ProxyError::NotConfigured(format!("No API key configured for {provider}"))
        })?;
        let prompt = translation_prompt(target_language, text);

        let translated = match provider {
            Provider::Gemini => self.gemini_generate(&target.base_url, api_key, model, &prompt).await?,
            _ => {
                self.chat_completion(provider, &target.base_url, api_key, model, &prompt)
                    .await?
            }
        };

        info!(provider = %provider, model, chars = translated.len(), "translation completed");
        Ok(translated)
    }

    /// Round-trip a short request to confirm credentials and model.
    pub async fn test_connection(&self, provider: Provider, model: &str) -> Result<(), ProxyError> {
        self.translate(provider, model, PROBE_LANGUAGE, PROBE_TEXT).await.map(|_| ())
    }

    async fn chat_completion(
        &self,
        provider: Provider,
        base_url: &str,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String, ProxyError> {
        let service = provider.display_name();
        let request = ChatRequest {
            model,
            messages: [
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: prompt },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .http
            .post(endpoint(base_url, "chat/completions")?)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(ProxyError::network(service))?;
        let response = check_response(service, response).await?;
        let parsed: ChatResponse = response.json().await.map_err(|error| {
            ProxyError::UnexpectedResponse { service, message: error.to_string() }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_owned())
            .ok_or_else(|| ProxyError::UnexpectedResponse {
                service,
                message: "response contained no message content".into(),
            })
    }

    async fn gemini_generate(
        &self,
        base_url: &str,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String, ProxyError> {
        let service = Provider::Gemini.display_name();
        let mut url = endpoint(base_url, &format!("models/{model}:generateContent"))?;
        url.query_pairs_mut().append_pair("key", api_key);

        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": TEMPERATURE, "maxOutputTokens": MAX_TOKENS },
            "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
        });

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(ProxyError::network(service))?;
        let response = check_response(service, response).await?;
        let parsed: GeminiResponse = response.json().await.map_err(|error| {
            ProxyError::UnexpectedResponse { service, message: error.to_string() }
        })?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
            .map(|text| text.trim().to_owned())
            .ok_or_else(|| ProxyError::UnexpectedResponse {
                service,
                message: "response contained no candidate text".into(),
            })
    }
}

fn translation_prompt(target_language: &str, text: &str) -> String {
    format!(
        "Translate the following text to {target_language}. Format the translation as markdown, \
         preserving paragraph breaks, titles, and other formatting. Return only the translated \
         text formatted as markdown.\n\n{text}"
    )
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}
