// Workspace document routes.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use notypdf_common::types::DocumentInfo;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{blocking, bulk_status, content_type_for, file_response, ApiError, AppState};
use crate::{store::BulkReport, validation::ValidatedJson};

/// Multipart field carrying the single-upload file.
const UPLOAD_FIELD: &str = "file";
/// Multipart field carrying each file of a multi-upload.
const MULTI_UPLOAD_FIELD: &str = "files";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    folder: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileListEnvelope {
    pub files: Vec<DocumentInfo>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    #[serde(rename = "folderName", default)]
    folder_name: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    #[serde(default)]
    filenames: Vec<String>,
    #[serde(default)]
    destination: Option<String>,
}

#[derive(Debug, Serialize)]
struct FailedItem<'a> {
    filename: &'a str,
    error: &'a str,
}

pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<FileListEnvelope>, ApiError> {
    let workspace = state.workspace.clone();
    let files = blocking(move || {
        let files = match query.folder.as_deref().filter(|folder| !folder.trim().is_empty()) {
            Some(folder) => workspace.list_folder(folder)?,
            None => workspace.list()?,
        };
        Ok(files)
    })
    .await?;

    Ok(Json(FileListEnvelope { files }))
}

pub async fn diagnostics(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let workspace = state.workspace.clone();
    let report = blocking(move || Ok(workspace.diagnostics())).await?;
    Ok(Json(json!({ "success": report.workspace_exists && report.writable, "diagnostics": report })))
}

pub async fn create_folder(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateFolderRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let workspace = state.workspace.clone();
    let folder = blocking(move || Ok(workspace.create_folder(&payload.folder_name)?)).await?;
    let message = format!("Folder '{}' created successfully", folder.name);

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "folder": folder, "message": message }))))
}

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let name = field.file_name().map(str::to_owned).unwrap_or_default();
        let bytes = field.bytes().await?;
        upload = Some((name, bytes));
        break;
    }

    let (name, bytes) = upload.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }

    let workspace = state.workspace.clone();
    let file = blocking(move || Ok(workspace.upload(&name, &bytes)?)).await?;
    let message = format!("File '{}' uploaded successfully", file.name);

    Ok(Json(json!({ "success": true, "file": file, "message": message })))
}

/// Every submitted file is attempted; the response itemizes the results.
pub async fn upload_multiple(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(MULTI_UPLOAD_FIELD) {
            continue;
        }
        let name = field.file_name().map(str::to_owned).unwrap_or_default();
        let bytes = field.bytes().await?;
        files.push((name, bytes));
    }

    if files.is_empty() {
        return Err(ApiError::bad_request("No files provided"));
    }

    let workspace = state.workspace.clone();
    let report = blocking(move || Ok(workspace.upload_many(&files))).await?;
    let summary = report.summary();

    let results: Vec<Value> = report
        .items()
        .iter()
        .map(|item| match &item.outcome {
            Ok(file) => json!({ "filename": item.id, "success": true, "file": file }),
            Err(error) => json!({ "filename": item.id, "success": false, "error": error }),
        })
        .collect();

    info!(total = summary.total, successful = summary.successful, "multi-file upload finished");
    Ok(Json(json!({
        "success": summary.successful > 0,
        "results": results,
        "summary": summary,
        "message": format!(
            "Uploaded {} of {} files ({} failed)",
            summary.successful, summary.total, summary.failed
        ),
    })))
}

pub async fn download(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let workspace = state.workspace.clone();
    let contents = blocking(move || Ok(workspace.download(&name)?)).await?;
    Ok(file_response(contents.bytes, content_type_for(&contents.name), "inline", &contents.name))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let workspace = state.workspace.clone();
    let message = format!("File '{name}' deleted successfully");
    blocking(move || Ok(workspace.delete(&name)?)).await?;
    Ok(super::success_message(message))
}

pub async fn markdown(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let workspace = state.workspace.clone();
    let filename = name.clone();
    let artifact = blocking(move || Ok(workspace.markdown(&name)?)).await?;

    Ok(Json(json!({
        "filename": filename,
        "markdown": artifact.content,
        "cached": artifact.cached,
    })))
}

pub async fn move_files(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<MoveRequest>,
) -> Result<Response, ApiError> {
    if payload.filenames.is_empty() {
        return Err(ApiError::bad_request("No files specified"));
    }

    let workspace = state.workspace.clone();
    let destination = payload.destination.unwrap_or_default();
    let report = blocking(move || Ok(workspace.move_files(&payload.filenames, &destination)?)).await?;

    let moved: Vec<Value> = report
        .successes()
        .map(|(filename, destination)| json!({ "filename": filename, "destination": destination }))
        .collect();
    let failed = failed_items(&report);
    let summary = report.summary();

    let body = json!({
        "success": summary.failed == 0,
        "moved": moved,
        "failed": failed,
        "moved_count": summary.successful,
        "failed_count": summary.failed,
        "message": format!("Moved {} of {} files", summary.successful, summary.total),
    });
    Ok((bulk_status(report.outcome()), Json(body)).into_response())
}

/// Zip every workspace PDF; the scratch file is gone before the response
/// is sent.
pub async fn download_all(State(state): State<AppState>) -> Result<Response, ApiError> {
    let workspace = state.workspace.clone();
    let bytes = blocking(move || Ok(workspace.bundle_pdfs()?)).await?;
    let name = format!("all_pdfs_{}.zip", Local::now().format("%Y%m%d_%H%M%S"));
    Ok(file_response(bytes, "application/zip", "attachment", &name))
}

pub async fn clear_all(State(state): State<AppState>) -> Result<Response, ApiError> {
    let workspace = state.workspace.clone();
    let report = blocking(move || Ok(workspace.clear_all()?)).await?;
    Ok(clear_response(&report, "files"))
}

/// Shared body for the workspace and archive clear endpoints.
pub(crate) fn clear_response(report: &BulkReport<()>, noun: &str) -> Response {
    let summary = report.summary();
    let deleted: Vec<&str> = report.successes().map(|(filename, _)| filename).collect();
    let message = if summary.total == 0 {
        format!("No {noun} to delete")
    } else {
        format!("Deleted {} of {} {noun}", summary.successful, summary.total)
    };

    let body = json!({
        "success": summary.failed == 0,
        "deleted_count": summary.successful,
        "failed_count": summary.failed,
        "deleted": deleted,
        "failed": failed_items(report),
        "message": message,
    });
    (bulk_status(report.outcome()), Json(body)).into_response()
}

fn failed_items<T>(report: &BulkReport<T>) -> Vec<FailedItem<'_>> {
    report.failures().map(|(filename, error)| FailedItem { filename, error }).collect()
}
