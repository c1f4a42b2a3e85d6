// Server configuration.
//
// Centralizes environment variable parsing with defaults for local
// development. Upstream API keys are read here too so that the proxy clients
// never touch the process environment themselves.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Default upload limit for multipart routes (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

const DEFAULT_NOTION_BASE_URL: &str = "https://api.notion.com";
const DEFAULT_TTS_URL: &str = "http://localhost:8880";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Credentials and endpoint for one translation provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub api_key: Option<String>,
    pub base_url: String,
}

/// Core server configuration.
///
/// Constructed via [`ServerConfig::from_env`] which reads environment
/// variables and falls back to development defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (host:port).
    pub listen_addr: SocketAddr,
    /// Directory holding `config.json`.
    pub data_dir: PathBuf,
    /// Workspace root; the archive lives in its `archive` subdirectory.
    pub workspace_dir: PathBuf,
    /// Comma-separated CORS origins (or `"*"` for any).
    pub cors_origins: Option<String>,
    /// Log filter directive (e.g. `info`, `notypdf_server=debug`).
    pub log_filter: String,
    pub log_format: LogFormat,
    /// Body limit for upload and restore routes.
    pub max_upload_bytes: usize,
    /// Timeout applied to every upstream HTTP call.
    pub upstream_timeout: Duration,
    pub notion_api_key: Option<String>,
    pub notion_base_url: String,
    /// Base URL of the Kokoro-compatible speech server.
    pub tts_base_url: String,
    pub openai: ProviderEndpoint,
    pub openrouter: ProviderEndpoint,
    pub deepseek: ProviderEndpoint,
    pub gemini: ProviderEndpoint,
}

impl ServerConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `NOTYPDF_HOST` | `0.0.0.0` |
    /// | `NOTYPDF_PORT` | `5000` |
    /// | `NOTYPDF_DATA_DIR` | `data` |
    /// | `NOTYPDF_WORKSPACE_DIR` | `{data_dir}/documents` |
    /// | `NOTYPDF_CORS_ORIGINS` | *(none; local dev origins)* |
    /// | `NOTYPDF_LOG_FILTER` | `info` |
    /// | `NOTYPDF_LOG_FORMAT` | `text` (`json` for structured output) |
    /// | `NOTYPDF_MAX_UPLOAD_BYTES` | 50 MiB |
    /// | `NOTYPDF_UPSTREAM_TIMEOUT_SECS` | `30` |
    /// | `NOTYPDF_TTS_URL` | `http://localhost:8880` |
    /// | `NOTION_API_KEY` / `NOTION_BASE_URL` | *(none)* / `https://api.notion.com` |
    /// | `OPENAI_API_KEY` / `OPENAI_BASE_URL` | *(none)* / OpenAI v1 |
    /// | `OPENROUTER_API_KEY` / `OPENROUTER_BASE_URL` | *(none)* / OpenRouter v1 |
    /// | `DEEPSEEK_API_KEY` / `DEEPSEEK_BASE_URL` | *(none)* / DeepSeek |
    /// | `GEMINI_API_KEY` / `GEMINI_BASE_URL` | *(none)* / Gemini v1beta |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    pub fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let host = env("NOTYPDF_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env("NOTYPDF_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(5000);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        let data_dir = PathBuf::from(env("NOTYPDF_DATA_DIR").unwrap_or_else(|_| "data".into()));
        let workspace_dir = env("NOTYPDF_WORKSPACE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("documents"));

        let cors_origins = env("NOTYPDF_CORS_ORIGINS").ok();
        let log_filter = env("NOTYPDF_LOG_FILTER").unwrap_or_else(|_| "info".into());
        let log_format = match env("NOTYPDF_LOG_FORMAT").ok().as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let max_upload_bytes = env("NOTYPDF_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let upstream_timeout = Duration::from_secs(
            env("NOTYPDF_UPSTREAM_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(30),
        );

        let provider = |key_var: &str, url_var: &str, default_url: &str| ProviderEndpoint {
            api_key: non_empty(env(key_var).ok()),
            base_url: env(url_var).unwrap_or_else(|_| default_url.into()),
        };

        Self {
            listen_addr,
            data_dir,
            workspace_dir,
            cors_origins,
            log_filter,
            log_format,
            max_upload_bytes,
            upstream_timeout,
            notion_api_key: non_empty(env("NOTION_API_KEY").ok()),
            notion_base_url: env("NOTION_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_NOTION_BASE_URL.into()),
            tts_base_url: env("NOTYPDF_TTS_URL").unwrap_or_else(|_| DEFAULT_TTS_URL.into()),
            openai: provider("OPENAI_API_KEY", "OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            openrouter: provider(
                "OPENROUTER_API_KEY",
                "OPENROUTER_BASE_URL",
                DEFAULT_OPENROUTER_BASE_URL,
            ),
            deepseek: provider("DEEPSEEK_API_KEY", "DEEPSEEK_BASE_URL", DEFAULT_DEEPSEEK_BASE_URL),
            gemini: provider("GEMINI_API_KEY", "GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
        }
    }

    /// Path of the persisted preferences document.
    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
