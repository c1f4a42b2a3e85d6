// Thin clients for the remote services the server fronts: Notion, the
// translation providers and the local speech server.

pub mod identifier;
pub mod notion;
pub mod translation;
pub mod tts;

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tracing::warn;

pub use notion::{IdentifierTarget, NotionClient, SavedText};
pub use translation::{Provider, TranslationService};
pub use tts::{SpeakRequest, SpeechAudio, TtsClient};

#[derive(Debug, Error)]
pub enum ProxyError {
    /// The service has no credentials configured.
    #[error("{0}")]
    NotConfigured(String),

    /// Rejected before anything was sent upstream.
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{service} is unreachable: {source}")]
    Network {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success reply; `body` is the upstream text, unmodified.
    #[error("{service} API error: {status} - {body}")]
    Upstream { service: &'static str, status: StatusCode, body: String },

    #[error("unexpected response from {service}: {message}")]
    UnexpectedResponse { service: &'static str, message: String },
}

impl ProxyError {
    pub(crate) fn network(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Self::Network { service, source }
    }
}

/// Shared client with the configured upstream timeout.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

/// Pass successful responses through; turn anything else into
/// [`ProxyError::Upstream`] carrying the raw body.
pub(crate) async fn check_response(
    service: &'static str,
    response: Response,
) -> Result<Response, ProxyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(error) => {
            warn!(service, status = %status, %error, "failed to read upstream error body");
            String::new()
        }
    };
    warn!(service, status = %status, body = %body, "upstream returned an error");
    Err(ProxyError::Upstream { service, status, body })
}

/// Join `path` onto `base`, keeping any path prefix `base` already carries.
pub(crate) fn endpoint(base: &str, path: &str) -> Result<url::Url, ProxyError> {
    let mut base = base.trim_end_matches('/').to_owned();
    base.push('/');
    let base = url::Url::parse(&base)
        .map_err(|error| ProxyError::InvalidRequest(format!("invalid base URL {base}: {error}")))?;
    base.join(path.trim_start_matches('/'))
        .map_err(|error| ProxyError::InvalidRequest(format!("invalid path {path}: {error}")))
}

#[cfg(test)]
mod tests {
    use super::endpoint;

    #[test]
    fn endpoint_keeps_base_prefix() {
        assert_eq!(
            endpoint("https://api.openai.com/v1", "chat/completions").expect("valid").as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            endpoint("http://localhost:8880/", "/voices").expect("valid").as_str(),
            "http://localhost:8880/voices"
        );
        assert!(endpoint("not a url", "x").is_err());
    }
}
