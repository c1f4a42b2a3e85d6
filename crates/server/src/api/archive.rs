// Archive routes: move documents out of and back into the workspace.

use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde_json::{json, Value};

use super::{
    blocking, content_type_for, file_response, files::clear_response, files::FileListEnvelope,
    success_message, ApiError, AppState,
};

pub async fn list_archived(State(state): State<AppState>) -> Result<Json<FileListEnvelope>, ApiError> {
    let workspace = state.workspace.clone();
    let files = blocking(move || Ok(workspace.list_archived()?)).await?;
    Ok(Json(FileListEnvelope { files }))
}

pub async fn download_archived(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let workspace = state.workspace.clone();
    let contents = blocking(move || Ok(workspace.download_archived(&name)?)).await?;
    Ok(file_response(contents.bytes, content_type_for(&contents.name), "inline", &contents.name))
}

pub async fn delete_archived(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let workspace = state.workspace.clone();
    let message = format!("Archived file '{name}' deleted successfully");
    blocking(move || Ok(workspace.delete_archived(&name)?)).await?;
    Ok(success_message(message))
}

pub async fn clear_archived(State(state): State<AppState>) -> Result<Response, ApiError> {
    let workspace = state.workspace.clone();
    let report = blocking(move || Ok(workspace.clear_archived()?)).await?;
    Ok(clear_response(&report, "archived files"))
}

pub async fn archive_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let workspace = state.workspace.clone();
    let requested = name.clone();
    let file = blocking(move || Ok(workspace.archive(&name)?)).await?;

    Ok(Json(json!({
        "success": true,
        "file": file,
        "message": format!("File '{requested}' archived successfully"),
    })))
}

pub async fn unarchive_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let workspace = state.workspace.clone();
    let requested = name.clone();
    let file = blocking(move || Ok(workspace.unarchive(&name)?)).await?;

    Ok(Json(json!({
        "success": true,
        "file": file,
        "message": format!("File '{requested}' restored from archive"),
    })))
}
