use std::{
    io::{Cursor, Read},
    path::Path,
    sync::Arc,
};

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use notypdf_server::{
    build_app,
    store::{markdown::ConversionError, PdfConverter},
    AppState, ServerConfig,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "files-api-boundary";

struct EchoConverter;

impl PdfConverter for EchoConverter {
    fn convert(&self, pdf_path: &Path) -> Result<String, ConversionError> {
        let bytes = std::fs::read(pdf_path).map_err(|error| ConversionError(error.to_string()))?;
        Ok(format!("# extracted\n\n{}\n", String::from_utf8_lossy(&bytes)))
    }
}

struct Harness {
    app: Router,
    dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let data_dir = dir.path().to_string_lossy().into_owned();
        let config = ServerConfig::from_env_fn(|key| match key {
            "NOTYPDF_DATA_DIR" => Ok(data_dir.clone()),
            "NOTYPDF_MAX_UPLOAD_BYTES" => Ok("65536".into()),
            _ => Err(std::env::VarError::NotPresent),
        });
        let state = AppState::from_config_with_converter(&config, Arc::new(EchoConverter))
            .expect("state should build");
        Self { app: build_app(state, &config), dir }
    }

    fn workspace(&self) -> std::path::PathBuf {
        self.dir.path().join("documents")
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response =
            self.app.clone().oneshot(request).await.expect("request should return response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
        (status, body.to_vec())
    }

    async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).expect("body should be json"))
    }

    async fn upload(&self, field: &str, files: &[(&str, &[u8])]) -> (StatusCode, Value) {
        let uri = if field == "files" { "/api/files/upload/multiple" } else { "/api/files/upload" };
        self.send_json(multipart(uri, field, files)).await
    }
}

fn multipart(uri: &str, field: &str, files: &[(&str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (filename, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .expect("multipart request should build")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request should build")
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder().method(Method::DELETE).uri(uri).body(Body::empty()).expect("request should build")
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder().method(Method::POST).uri(uri).body(Body::empty()).expect("request should build")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

fn listed_names(body: &Value) -> Vec<String> {
    body["files"]
        .as_array()
        .expect("files array")
        .iter()
        .map(|file| file["name"].as_str().expect("name").to_owned())
        .collect()
}

#[tokio::test]
async fn upload_list_download_round_trip() {
    let harness = Harness::new();

    let (status, body) = harness.upload("file", &[("notes.txt", b"hello world")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["file"]["name"], "notes.txt");
    assert_eq!(body["file"]["size"], 11);
    assert_eq!(body["file"]["type"], "txt");
    assert!(body["file"]["lastModified"].is_string());

    let (status, listing) = harness.send_json(get("/api/files")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_names(&listing), vec!["notes.txt"]);

    let response = harness.app.clone().oneshot(get("/api/files/notes.txt")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"].to_str().expect("ascii").starts_with("text/plain"));
    assert!(response.headers()["content-disposition"]
        .to_str()
        .expect("ascii")
        .contains("filename*=UTF-8''notes.txt"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
    assert_eq!(bytes.as_ref(), b"hello world");
}

#[tokio::test]
async fn rejected_upload_types_and_missing_files_are_bad_requests() {
    let harness = Harness::new();

    let (status, body) = harness.upload("file", &[("setup.exe", b"MZ")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().expect("error string").contains("File type not allowed"));
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let (status, _) = harness.upload("attachment", &[("a.pdf", b"%PDF")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listing) = harness.send_json(get("/api/files")).await;
    assert!(listed_names(&listing).is_empty());
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let harness = Harness::new();
    let big = vec![b'x'; 70 * 1024];
    let (status, body) = harness.send(multipart("/api/files/upload", "file", &[("big.txt", &big)])).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let parsed: Value = serde_json::from_slice(&body).expect("json error body");
    assert_eq!(parsed["code"], "PAYLOAD_TOO_LARGE");
    assert!(!harness.workspace().join("big.txt").exists());
}

#[tokio::test]
async fn colliding_uploads_keep_both_documents() {
    let harness = Harness::new();
    let (_, first) = harness.upload("file", &[("report.pdf", b"%PDF one")]).await;
    let (_, second) = harness.upload("file", &[("report.pdf", b"%PDF two")]).await;

    assert_eq!(first["file"]["name"], "report.pdf");
    let renamed = second["file"]["name"].as_str().expect("name");
    assert_ne!(renamed, "report.pdf");
    assert!(renamed.starts_with("report_") && renamed.ends_with(".pdf"));

    let (_, listing) = harness.send_json(get("/api/files")).await;
    assert_eq!(listed_names(&listing).len(), 2);
    assert_eq!(std::fs::read(harness.workspace().join("report.pdf")).expect("original"), b"%PDF one");
}

#[tokio::test]
async fn multi_upload_reports_each_file_and_succeeds_overall() {
    let harness = Harness::new();
    let (status, body) = harness
        .upload("files", &[("a.pdf", b"%PDF a"), ("b.exe", b"MZ"), ("c.png", b"\x89PNG")])
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], json!({"total": 3, "successful": 2, "failed": 1}));
    let results = body["results"].as_array().expect("results array");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[1]["filename"], "b.exe");
    assert_eq!(results[1]["success"], false);
    assert!(results[1]["error"].as_str().expect("error").contains("File type not allowed"));
}

#[tokio::test]
async fn multi_upload_reports_parts_without_a_filename() {
    let harness = Harness::new();
    let (status, body) = harness.upload("files", &[("a.txt", b"a"), ("", b"orphan bytes")]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], json!({"total": 2, "successful": 1, "failed": 1}));
    assert_eq!(body["results"][1], json!({"filename": "", "success": false, "error": "No file selected"}));
}

#[tokio::test]
async fn wide_multibyte_names_are_stored_within_the_byte_limit() {
    let harness = Harness::new();
    let name = format!("{}.pdf", "文".repeat(100));
    let (status, body) = harness.upload("file", &[(name.as_str(), b"%PDF wide")]).await;

    assert_eq!(status, StatusCode::OK);
    let stored = body["file"]["name"].as_str().expect("name");
    assert!(stored.len() <= 255 && stored.ends_with(".pdf"), "{stored}");
    assert_eq!(std::fs::read(harness.workspace().join(stored)).expect("stored file"), b"%PDF wide");

    let (status, _) = harness.upload("file", &[(name.as_str(), b"%PDF again")]).await;
    assert_eq!(status, StatusCode::OK);
    let (_, listing) = harness.send_json(get("/api/files")).await;
    assert_eq!(listed_names(&listing).len(), 2);
}

#[tokio::test]
async fn listing_hides_markdown_and_archive() {
    let harness = Harness::new();
    harness.upload("file", &[("paper.pdf", b"%PDF paper")]).await;
    harness.upload("file", &[("old.txt", b"old")]).await;

    let (status, markdown) = harness.send_json(get("/api/files/paper.pdf/markdown")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(markdown["filename"], "paper.pdf");
    assert_eq!(markdown["cached"], false);
    assert!(markdown["markdown"].as_str().expect("markdown").contains("%PDF paper"));
    assert!(harness.workspace().join("paper.md").exists());

    let (status, _) = harness.send_json(post_empty("/api/files/archive/old.txt")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, listing) = harness.send_json(get("/api/files")).await;
    assert_eq!(listed_names(&listing), vec!["paper.pdf"]);

    let (_, cached) = harness.send_json(get("/api/files/paper.pdf/markdown")).await;
    assert_eq!(cached["cached"], true);
}

#[tokio::test]
async fn markdown_rejects_non_pdfs_and_missing_documents() {
    let harness = Harness::new();
    harness.upload("file", &[("notes.txt", b"x")]).await;

    let (status, _) = harness.send_json(get("/api/files/notes.txt/markdown")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = harness.send_json(get("/api/files/ghost.pdf/markdown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().expect("error").contains("ghost.pdf"));
}

#[tokio::test]
async fn delete_cascades_markdown_and_reports_missing() {
    let harness = Harness::new();
    harness.upload("file", &[("X.pdf", b"%PDF x")]).await;
    harness.send_json(get("/api/files/X.pdf/markdown")).await;
    assert!(harness.workspace().join("X.md").exists());

    let (status, body) = harness.send_json(delete("/api/files/X.pdf")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(!harness.workspace().join("X.pdf").exists());
    assert!(!harness.workspace().join("X.md").exists());

    let (status, _) = harness.send_json(delete("/api/files/X.pdf")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = harness.send_json(delete("/api/files/archive")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn traversal_names_never_escape_the_workspace() {
    let harness = Harness::new();
    std::fs::write(harness.dir.path().join("config.json"), "{}").expect("seed file");

    let (status, _) = harness.send(get("/api/files/..%2Fconfig.json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = harness.send(delete("/api/files/..%2Fconfig.json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(harness.dir.path().join("config.json").exists());
}

#[tokio::test]
async fn folders_and_moves() {
    let harness = Harness::new();
    let (status, body) =
        harness.send_json(post_json("/api/files/create-folder", json!({"folderName": "Invoices"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["folder"]["type"], "folder");

    let (status, _) =
        harness.send_json(post_json("/api/files/create-folder", json!({"folderName": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for shadowed in ["clear", "Archived", "download", "test"] {
        let (status, body) =
            harness.send_json(post_json("/api/files/create-folder", json!({"folderName": shadowed}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{shadowed}");
        assert!(body["error"].as_str().expect("error").contains("reserved"));
        assert!(!harness.workspace().join(shadowed).exists());
    }

    harness.upload("file", &[("a.pdf", b"%PDF a")]).await;
    harness.upload("file", &[("b.txt", b"b")]).await;

    let (status, body) = harness
        .send_json(post_json(
            "/api/files/move",
            json!({"filenames": ["a.pdf", "b.txt"], "destination": "Invoices"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["moved_count"], 2);
    assert_eq!(body["moved"][0], json!({"filename": "a.pdf", "destination": "Invoices/a.pdf"}));

    let (_, folder) = harness.send_json(get("/api/files?folder=Invoices")).await;
    assert_eq!(listed_names(&folder), vec!["a.pdf", "b.txt"]);

    let (status, body) = harness
        .send_json(post_json(
            "/api/files/move",
            json!({"filenames": ["Invoices/a.pdf", "ghost.pdf"], "destination": ""}),
        ))
        .await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(body["moved_count"], 1);
    assert_eq!(body["failed"][0]["filename"], "ghost.pdf");

    let (status, _) = harness
        .send_json(post_json("/api/files/move", json!({"filenames": ["b.txt"], "destination": "Nope"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = harness
        .send_json(post_json("/api/files/move", json!({"filenames": [], "destination": "Invoices"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn archive_lifecycle() {
    let harness = Harness::new();
    harness.upload("file", &[("X.pdf", b"%PDF x")]).await;
    harness.upload("file", &[("Y.txt", b"y")]).await;

    let (status, body) = harness.send_json(post_empty("/api/files/archive/X.pdf")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["file"]["name"], "X.pdf");

    let (_, archived) = harness.send_json(get("/api/files/archived")).await;
    assert_eq!(listed_names(&archived), vec!["X.pdf"]);

    let (status, bytes) = harness.send(get("/api/files/archived/X.pdf")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"%PDF x");

    let (status, _) = harness.send_json(post_empty("/api/files/unarchive/X.pdf")).await;
    assert_eq!(status, StatusCode::OK);
    let (_, listing) = harness.send_json(get("/api/files")).await;
    assert_eq!(listed_names(&listing), vec!["X.pdf", "Y.txt"]);

    let (status, _) = harness.send_json(post_empty("/api/files/archive/ghost.pdf")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = harness.send_json(post_empty("/api/files/unarchive/ghost.pdf")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    harness.send_json(post_empty("/api/files/archive/Y.txt")).await;
    let (status, _) = harness.send_json(delete("/api/files/archived/Y.txt")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = harness.send_json(delete("/api/files/archived/Y.txt")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clear_endpoints_report_counts() {
    let harness = Harness::new();
    let (status, body) = harness.send_json(delete("/api/files/clear")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_count"], 0);

    harness.upload("file", &[("a.pdf", b"%PDF")]).await;
    harness.upload("file", &[("b.txt", b"b")]).await;
    harness.upload("file", &[("c.txt", b"c")]).await;
    harness.send_json(post_empty("/api/files/archive/c.txt")).await;

    let (status, body) = harness.send_json(delete("/api/files/clear")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["deleted_count"], 2);
    assert_eq!(body["failed_count"], 0);

    let (_, archived) = harness.send_json(get("/api/files/archived")).await;
    assert_eq!(listed_names(&archived), vec!["c.txt"]);

    let (status, body) = harness.send_json(delete("/api/files/archived/clear")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_count"], 1);
}

#[tokio::test]
async fn clear_with_an_unaddressable_entry_is_multi_status() {
    let harness = Harness::new();
    harness.upload("file", &[("a.pdf", b"%PDF")]).await;
    harness.upload("file", &[("b.txt", b"b")]).await;
    std::fs::write(harness.workspace().join("bad\\name.txt"), "x").expect("unaddressable entry");

    let (status, body) = harness.send_json(delete("/api/files/clear")).await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(body["success"], false);
    assert_eq!(body["deleted_count"], 2);
    assert_eq!(body["failed_count"], 1);
    assert_eq!(body["failed"][0]["filename"], "bad\\name.txt");
    assert!(harness.workspace().join("bad\\name.txt").exists());
}

#[tokio::test]
async fn bundle_zips_root_pdfs_and_leaves_no_scratch_file() {
    let harness = Harness::new();
    let (status, body) = harness.send_json(get("/api/files/download/all")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No PDF files found");

    harness.upload("file", &[("a.pdf", b"%PDF a")]).await;
    harness.upload("file", &[("b.pdf", b"%PDF b")]).await;
    harness.upload("file", &[("c.txt", b"c")]).await;

    let response =
        harness.app.clone().oneshot(get("/api/files/download/all")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/zip");
    let disposition = response.headers()["content-disposition"].to_str().expect("ascii").to_owned();
    assert!(disposition.starts_with("attachment;") && disposition.contains("all_pdfs_"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).expect("valid zip");
    let mut names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    names.sort();
    assert_eq!(names, vec!["a.pdf", "b.pdf"]);

    let mut contents = String::new();
    archive.by_name("b.pdf").expect("entry").read_to_string(&mut contents).expect("read");
    assert_eq!(contents, "%PDF b");

    let leftovers: Vec<_> = std::fs::read_dir(harness.workspace())
        .expect("workspace lists")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".zip") || name.ends_with(".partial"))
        .collect();
    assert!(leftovers.is_empty(), "unexpected scratch files: {leftovers:?}");
}

#[tokio::test]
async fn errors_carry_request_id() {
    let harness = Harness::new();
    let response = harness
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/files/ghost.pdf")
                .header("x-request-id", "req-files-1")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-request-id"], "req-files-1");
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
    let parsed: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(parsed["request_id"], "req-files-1");
    assert_eq!(parsed["error"], "File not found: ghost.pdf");
}
