pub mod archive;
pub mod config;
pub mod files;
pub mod notion;
pub mod translate;
pub mod tts;

use std::{path::Path, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::task::JoinError;
use tracing::error;

use crate::{
    config::ServerConfig,
    error::{AppError, ErrorCode},
    proxy::{build_http_client, NotionClient, ProxyError, TranslationService, TtsClient},
    store::{
        BulkOutcome, ConfigStore, ConfigStoreError, PdfConverter, PdfExtractConverter, StoreError,
        WorkspaceStore,
    },
};

/// Everything a handler can reach. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub workspace: Arc<WorkspaceStore>,
    pub config: Arc<ConfigStore>,
    pub notion: NotionClient,
    pub translation: TranslationService,
    pub tts: TtsClient,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        Self::from_config_with_converter(config, Arc::new(PdfExtractConverter))
    }

    /// Same as [`AppState::from_config`] with an explicit PDF converter.
    pub fn from_config_with_converter(
        config: &ServerConfig,
        converter: Arc<dyn PdfConverter>,
    ) -> anyhow::Result<Self> {
        let workspace = WorkspaceStore::open(&config.workspace_dir, converter)
            .with_context(|| format!("failed to open workspace at {}", config.workspace_dir.display()))?;
        let http = build_http_client(config.upstream_timeout)
            .context("failed to build upstream HTTP client")?;

        Ok(Self {
            workspace: Arc::new(workspace),
            config: Arc::new(ConfigStore::new(config.config_file())),
            notion: NotionClient::new(
                http.clone(),
                config.notion_base_url.clone(),
                config.notion_api_key.clone(),
            ),
            translation: TranslationService::new(http.clone(), config),
            tts: TtsClient::new(http, config.tts_base_url.clone()),
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/api/files", get(files::list_files))
        .route("/api/files/test", get(files::diagnostics))
        .route("/api/files/create-folder", post(files::create_folder))
        .route("/api/files/upload", post(files::upload).layer(upload_limit))
        .route("/api/files/upload/multiple", post(files::upload_multiple).layer(upload_limit))
        .route("/api/files/move", post(files::move_files))
        .route("/api/files/download/all", get(files::download_all))
        .route("/api/files/clear", delete(files::clear_all))
        .route("/api/files/{name}", get(files::download).delete(files::delete_file))
        .route("/api/files/{name}/markdown", get(files::markdown))
        .route("/api/files/archived", get(archive::list_archived))
        .route("/api/files/archived/clear", delete(archive::clear_archived))
        .route(
            "/api/files/archived/{name}",
            get(archive::download_archived).delete(archive::delete_archived),
        )
        .route("/api/files/archive/{name}", post(archive::archive_file))
        .route("/api/files/unarchive/{name}", post(archive::unarchive_file))
        .route("/api/config", get(config::get_config).post(config::save_config))
        .route("/api/config/backup", get(config::backup_config))
        .route("/api/config/restore", post(config::restore_config).layer(upload_limit))
        .route("/api/config/clear", delete(config::clear_config))
        .route(
            "/api/notion/databases/{id}",
            get(notion::get_database).patch(notion::update_database),
        )
        .route("/api/notion/databases/{id}/query", post(notion::query_database))
        .route("/api/notion/pages", post(notion::create_page))
        .route("/api/notion/pages/{id}", patch(notion::update_page))
        .route("/api/notion/test-connection", get(notion::test_connection))
        .route("/api/notion/save-text-with-identifier", post(notion::save_text_with_identifier))
        .route("/api/translate", post(translate::translate))
        .route("/api/translate/test", post(translate::test_provider))
        .route("/api/tts/voices", get(tts::voices))
        .route("/api/tts/speak", post(tts::speak))
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    PayloadTooLarge(String),
    /// Failure whose message is safe and useful to show the client.
    Failed(String),
    Upstream { status: StatusCode, message: String },
    UpstreamUnavailable(String),
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                AppError::new(ErrorCode::ValidationFailed, message).into_response()
            }
            Self::NotFound(message) => AppError::new(ErrorCode::NotFound, message).into_response(),
            Self::PayloadTooLarge(message) => {
                AppError::new(ErrorCode::PayloadTooLarge, message).into_response()
            }
            Self::Failed(message) => {
                error!(error = %message, "request failed");
                AppError::new(ErrorCode::InternalError, message).into_response()
            }
            Self::Upstream { status, message } => AppError::new(ErrorCode::UpstreamFailed, message)
                .with_status(status)
                .with_detail("upstream_status", json!(status.as_u16()))
                .into_response(),
            Self::UpstreamUnavailable(message) => {
                AppError::new(ErrorCode::UpstreamUnavailable, message).into_response()
            }
            Self::Internal(error) => {
                error!(error = ?error, "internal error");
                AppError::from_code(ErrorCode::InternalError).into_response()
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Invalid(message) => Self::BadRequest(message),
            StoreError::NotFound(message) => Self::NotFound(message),
            other @ (StoreError::Conversion { .. } | StoreError::Io { .. } | StoreError::Bundle(_)) => {
                Self::Failed(other.to_string())
            }
        }
    }
}

impl From<ConfigStoreError> for ApiError {
    fn from(error: ConfigStoreError) -> Self {
        match error {
            ConfigStoreError::Store(inner) => inner.into(),
            ConfigStoreError::Parse(_) => Self::Failed(error.to_string()),
            ConfigStoreError::InvalidStructure(_)
            | ConfigStoreError::NotAnObject
            | ConfigStoreError::InvalidField { .. } => Self::BadRequest(error.to_string()),
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(error: ProxyError) -> Self {
        match error {
            ProxyError::NotConfigured(message) | ProxyError::InvalidRequest(message) => {
                Self::BadRequest(message)
            }
            ProxyError::Network { .. } => Self::UpstreamUnavailable(error.to_string()),
            ProxyError::Upstream { status, .. } => {
                Self::Upstream { status, message: error.to_string() }
            }
            ProxyError::UnexpectedResponse { .. } => {
                Self::Upstream { status: StatusCode::BAD_GATEWAY, message: error.to_string() }
            }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(error.body_text())
        } else {
            Self::BadRequest(error.body_text())
        }
    }
}

impl From<JoinError> for ApiError {
    fn from(error: JoinError) -> Self {
        Self::Internal(anyhow::Error::new(error).context("blocking task failed"))
    }
}

/// Run filesystem work off the async executor.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// HTTP status for a finished bulk delete or move.
pub(crate) fn bulk_status(outcome: BulkOutcome) -> StatusCode {
    match outcome {
        BulkOutcome::Empty | BulkOutcome::AllSucceeded => StatusCode::OK,
        BulkOutcome::Partial => StatusCode::MULTI_STATUS,
        BulkOutcome::AllFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn success_message(message: impl Into<String>) -> Json<Value> {
    Json(json!({ "success": true, "message": message.into() }))
}

/// Content type for a stored document, by extension.
pub(crate) fn content_type_for(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// `Content-Disposition` carrying a UTF-8 filename (RFC 6266 / RFC 5987).
pub(crate) fn content_disposition(disposition: &str, name: &str) -> HeaderValue {
    let fallback: String = name
        .chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
        .collect();
    let value = format!(
        "{disposition}; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(name)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Binary response with a content type and disposition.
pub(crate) fn file_response(
    bytes: Vec<u8>,
    content_type: &str,
    disposition: &str,
    name: &str,
) -> Response {
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    (
        [(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, content_disposition(disposition, name))],
        bytes,
    )
        .into_response()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_outcomes_map_to_statuses() {
        assert_eq!(bulk_status(BulkOutcome::Empty), StatusCode::OK);
        assert_eq!(bulk_status(BulkOutcome::AllSucceeded), StatusCode::OK);
        assert_eq!(bulk_status(BulkOutcome::Partial), StatusCode::MULTI_STATUS);
        assert_eq!(bulk_status(BulkOutcome::AllFailed), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn disposition_encodes_non_ascii_names() {
        let header = content_disposition("inline", "caf\u{e9} menu.pdf");
        let value = header.to_str().expect("header is ascii");
        assert_eq!(value, "inline; filename=\"caf_ menu.pdf\"; filename*=UTF-8''caf%C3%A9%20menu.pdf");

        let header = content_disposition("attachment", "it's (v2)~.pdf");
        let value = header.to_str().expect("header is ascii");
        assert!(value.ends_with("filename*=UTF-8''it%27s%20%28v2%29~.pdf"), "{value}");
    }

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for("a.PDF"), "application/pdf");
        assert_eq!(content_type_for("photo.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }

    #[test]
    fn store_errors_map_onto_client_and_server_failures() {
        assert!(matches!(ApiError::from(StoreError::Invalid("x".into())), ApiError::BadRequest(_)));
        assert!(matches!(ApiError::from(StoreError::NotFound("x".into())), ApiError::NotFound(_)));
        assert!(matches!(
            ApiError::from(StoreError::Conversion { name: "a.pdf".into(), message: "bad".into() }),
            ApiError::Failed(_)
        ));
    }

    #[test]
    fn upstream_errors_keep_provider_status() {
        let error = ApiError::from(ProxyError::Upstream {
            service: "Notion",
            status: reqwest::StatusCode::NOT_FOUND,
            body: "{\"code\":\"object_not_found\"}".into(),
        });
        match error {
            ApiError::Upstream { status, message } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert!(message.contains("object_not_found"));
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
