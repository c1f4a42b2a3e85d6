// Directory-backed document workspace with a segregated archive.
//
// Layout:
//   <root>/<name>               documents and folders
//   <root>/<folder>/<name>      one level of nesting
//   <root>/<stem>.md            derived Markdown next to its PDF
//   <root>/archive/<name>       archived documents (flat)

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Local, Utc};
use notypdf_common::{
    path::{
        file_extension, normalize_relative_name,
        sanitize::{bounded_prefix, MAX_NAME_BYTES, MAX_NAME_CHARS},
        sanitize_filename, split_stem,
    },
    types::{DocumentInfo, FOLDER_TYPE, UNKNOWN_TYPE},
};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use super::{
    bulk::BulkReport,
    markdown::{self, MarkdownArtifact, MarkdownCache, PdfConverter, MARKDOWN_EXTENSION, PARTIAL_SUFFIX},
    StoreError,
};

/// Name of the archive container inside the workspace root.
pub const ARCHIVE_DIR: &str = "archive";

/// Folder names that would be shadowed by a static `/api/files/...` route.
const RESERVED_FOLDER_NAMES: &[&str] = &[
    ARCHIVE_DIR,
    "archived",
    "unarchive",
    "test",
    "create-folder",
    "upload",
    "move",
    "download",
    "clear",
];

/// Extensions accepted by uploads (compared lowercase).
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt", "png", "jpg", "jpeg", "gif"];

const PDF_EXTENSION: &str = "pdf";

/// Workspace names may address `folder/file`.
const WORKSPACE_DEPTH: usize = 2;
/// Archive names are flat.
const ARCHIVE_DEPTH: usize = 1;

/// Attempts at finding a free name before giving up under contention.
const MAX_NAME_ATTEMPTS: usize = 5;

/// Contents of a stored document, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContents {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Health report backing `GET /api/files/test`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WorkspaceDiagnostics {
    pub workspace_dir: String,
    pub workspace_exists: bool,
    pub archive_exists: bool,
    pub writable: bool,
    pub document_count: usize,
    pub archived_count: usize,
}

pub struct WorkspaceStore {
    root: PathBuf,
    archive: PathBuf,
    markdown: MarkdownCache,
}

impl WorkspaceStore {
    /// Open (and create if needed) the workspace rooted at `root`.
    pub fn open(root: impl Into<PathBuf>, converter: Arc<dyn PdfConverter>) -> Result<Self, StoreError> {
        let root = root.into();
        let archive = root.join(ARCHIVE_DIR);
        fs::create_dir_all(&archive)
            .map_err(StoreError::io(format!("failed to create {}", archive.display())))?;
        info!(root = %root.display(), "workspace store opened");
        Ok(Self { root, archive, markdown: MarkdownCache::new(converter) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ── Listing ────────────────────────────────────────────────────────

    /// Entries at the workspace root, sorted by name. Derived Markdown and
    /// the archive container are never listed.
    pub fn list(&self) -> Result<Vec<DocumentInfo>, StoreError> {
        list_dir(&self.root, true)
    }

    /// Entries inside one workspace folder.
    pub fn list_folder(&self, folder: &str) -> Result<Vec<DocumentInfo>, StoreError> {
        let path = self.resolve_folder(folder)?;
        list_dir(&path, false)
    }

    pub fn list_archived(&self) -> Result<Vec<DocumentInfo>, StoreError> {
        self.ensure_archive()?;
        list_dir(&self.archive, false)
    }

    // ── Creation ───────────────────────────────────────────────────────

    pub fn create_folder(&self, requested: &str) -> Result<DocumentInfo, StoreError> {
        let trimmed = requested.trim();
        if trimmed.is_empty() {
            return Err(StoreError::Invalid("Folder name is required".into()));
        }

        let name = sanitize_filename(trimmed);
        if RESERVED_FOLDER_NAMES.iter().any(|reserved| name.eq_ignore_ascii_case(reserved)) {
            return Err(StoreError::Invalid(format!("'{name}' is a reserved folder name")));
        }

        let path = self.root.join(&name);
        match fs::create_dir(&path) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StoreError::Invalid(format!("Folder already exists: {name}")));
            }
            Err(error) => {
                return Err(StoreError::io(format!("failed to create folder {name}"))(error))
            }
        }

        info!(folder = %name, "created folder");
        describe(&path, &name)
    }

    /// Store an uploaded document at the workspace root.
    ///
    /// The sanitized name gets a timestamp suffix if it is already taken; an
    /// existing document is never overwritten.
    pub fn upload(&self, original_name: &str, bytes: &[u8]) -> Result<DocumentInfo, StoreError> {
        let name = sanitize_filename(original_name);
        ensure_allowed_extension(&name)?;

        let (path, stored_name) = write_new_file(&self.root, &name, bytes)?;
        info!(
            original = %original_name,
            stored = %stored_name,
            bytes = bytes.len(),
            "stored uploaded document"
        );
        describe(&path, &stored_name)
    }

    /// Upload every file independently; one rejection never stops the rest.
    /// A part without a filename is reported as a failed item.
    pub fn upload_many<B: AsRef<[u8]>>(&self, files: &[(String, B)]) -> BulkReport<DocumentInfo> {
        let mut report = BulkReport::new();
        for (name, bytes) in files {
            let outcome = if name.trim().is_empty() {
                Err(StoreError::Invalid("No file selected".into()))
            } else {
                self.upload(name, bytes.as_ref())
            };
            report.record(name.clone(), outcome);
        }
        report
    }

    // ── Retrieval ──────────────────────────────────────────────────────

    pub fn download(&self, name: &str) -> Result<FileContents, StoreError> {
        let path = self.resolve_workspace(name)?;
        read_document(&path, name)
    }

    pub fn download_archived(&self, name: &str) -> Result<FileContents, StoreError> {
        let path = self.resolve_archived(name)?;
        read_document(&path, name)
    }

    /// Markdown rendering of a workspace PDF, generated on first access.
    pub fn markdown(&self, name: &str) -> Result<MarkdownArtifact, StoreError> {
        if !is_pdf(name) {
            return Err(StoreError::Invalid(format!(
                "Markdown is only available for PDF files: {name}"
            )));
        }

        let path = self.resolve_workspace(name)?;
        let metadata = existing_metadata(&path, name)?;
        if !metadata.is_file() {
            return Err(StoreError::Invalid(format!("{name} is not a file")));
        }

        self.markdown.get_or_generate(&path)
    }

    // ── Removal ────────────────────────────────────────────────────────

    /// Delete a document or folder from the workspace.
    ///
    /// PDFs take their derived Markdown with them; folders go recursively.
    pub fn delete(&self, name: &str) -> Result<(), StoreError> {
        if name.trim_matches('/').eq_ignore_ascii_case(ARCHIVE_DIR) {
            return Err(StoreError::Invalid("The archive folder cannot be deleted".into()));
        }

        let path = self.resolve_workspace(name)?;
        let metadata = existing_metadata(&path, name)?;

        if metadata.is_dir() {
            fs::remove_dir_all(&path)
                .map_err(StoreError::io(format!("failed to delete folder {name}")))?;
            info!(folder = %name, "deleted folder");
            return Ok(());
        }

        fs::remove_file(&path).map_err(StoreError::io(format!("failed to delete {name}")))?;
        let cascaded = is_pdf(name) && markdown::remove_artifact(&path)?;
        info!(document = %name, removed_markdown = cascaded, "deleted document");
        Ok(())
    }

    pub fn delete_archived(&self, name: &str) -> Result<(), StoreError> {
        let path = self.resolve_archived(name)?;
        let metadata = existing_metadata(&path, name)?;
        if metadata.is_dir() {
            return Err(StoreError::Invalid(format!("{name} is not a file")));
        }

        fs::remove_file(&path)
            .map_err(StoreError::io(format!("failed to delete archived {name}")))?;
        info!(document = %name, "deleted archived document");
        Ok(())
    }

    /// Delete every workspace entry except the archive.
    pub fn clear_all(&self) -> Result<BulkReport<()>, StoreError> {
        let names: Vec<String> = list_dir(&self.root, true)?.into_iter().map(|doc| doc.name).collect();
        let report = BulkReport::run(names, |name| self.delete(name));

        // Markdown whose PDF is already gone would otherwise linger unseen.
        for orphan in markdown_files(&self.root)? {
            if let Err(error) = fs::remove_file(&orphan) {
                warn!(artifact = %orphan.display(), %error, "failed to remove orphaned markdown");
            }
        }

        let summary = report.summary();
        info!(deleted = summary.successful, failed = summary.failed, "cleared workspace");
        Ok(report)
    }

    pub fn clear_archived(&self) -> Result<BulkReport<()>, StoreError> {
        self.ensure_archive()?;
        let names: Vec<String> =
            list_dir(&self.archive, false)?.into_iter().map(|doc| doc.name).collect();
        let report = BulkReport::run(names, |name| self.delete_archived(name));

        let summary = report.summary();
        info!(deleted = summary.successful, failed = summary.failed, "cleared archive");
        Ok(report)
    }

    // ── Relocation ─────────────────────────────────────────────────────

    /// Move documents into `destination` (a folder, or the root when empty).
    ///
    /// The destination must exist. Each item reports its new relative path.
    pub fn move_files(
        &self,
        names: &[String],
        destination: &str,
    ) -> Result<BulkReport<String>, StoreError> {
        if names.is_empty() {
            return Err(StoreError::Invalid("No files specified".into()));
        }

        let destination = destination.trim().trim_matches('/');
        let (target_dir, prefix) = if destination.is_empty() {
            (self.root.clone(), String::new())
        } else {
            let dir = self.resolve_folder(destination)?;
            let folder = dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            (dir, format!("{folder}/"))
        };

        let report = BulkReport::run(names.iter().cloned(), |name| {
            self.move_one(name, &target_dir).map(|stored| format!("{prefix}{stored}"))
        });

        let summary = report.summary();
        info!(
            destination = %destination,
            moved = summary.successful,
            failed = summary.failed,
            "moved documents"
        );
        Ok(report)
    }

    fn move_one(&self, name: &str, target_dir: &Path) -> Result<String, StoreError> {
        let source = self.resolve_workspace(name)?;
        let metadata = existing_metadata(&source, name)?;
        if metadata.is_dir() {
            return Err(StoreError::Invalid(format!("Folders cannot be moved: {name}")));
        }

        let file_name = leaf_name(&source);
        if source.parent() == Some(target_dir) {
            return Ok(file_name);
        }

        let (target, stored_name) = rename_into(&source, target_dir, &file_name)?;
        if is_pdf(&file_name) {
            if let Err(error) = markdown::move_artifact(&source, &target) {
                warn!(document = %name, %error, "failed to carry markdown along with moved PDF");
            }
        }
        debug!(from = %name, to = %target.display(), "moved document");
        Ok(stored_name)
    }

    /// Move a workspace document into the archive.
    ///
    /// Folders cannot be archived. A PDF's cached Markdown is discarded and
    /// regenerated on demand once the PDF is back in the workspace.
    pub fn archive(&self, name: &str) -> Result<DocumentInfo, StoreError> {
        let source = self.resolve_workspace(name)?;
        let metadata = existing_metadata(&source, name)?;
        if metadata.is_dir() {
            return Err(StoreError::Invalid(format!("Folders cannot be archived: {name}")));
        }

        self.ensure_archive()?;
        let file_name = leaf_name(&source);
        let (target, stored_name) = rename_into(&source, &self.archive, &file_name)?;
        if is_pdf(&file_name) {
            markdown::remove_artifact(&source)?;
        }

        info!(document = %name, archived_as = %stored_name, "archived document");
        describe(&target, &stored_name)
    }

    /// Move an archived document back to the workspace root.
    pub fn unarchive(&self, name: &str) -> Result<DocumentInfo, StoreError> {
        let source = self.resolve_archived(name)?;
        let metadata = existing_metadata(&source, name)?;
        if metadata.is_dir() {
            return Err(StoreError::Invalid(format!("{name} is not a file")));
        }

        let file_name = leaf_name(&source);
        let (target, stored_name) = rename_into(&source, &self.root, &file_name)?;

        info!(document = %name, restored_as = %stored_name, "unarchived document");
        describe(&target, &stored_name)
    }

    // ── Bundling ───────────────────────────────────────────────────────

    /// Zip every PDF at the workspace root.
    ///
    /// The archive is assembled in a temporary file that is removed before
    /// this returns, whatever the outcome.
    pub fn bundle_pdfs(&self) -> Result<Vec<u8>, StoreError> {
        let pdfs: Vec<DocumentInfo> = list_dir(&self.root, true)?
            .into_iter()
            .filter(|doc| doc.kind == PDF_EXTENSION)
            .collect();
        if pdfs.is_empty() {
            return Err(StoreError::NotFound("No PDF files found".into()));
        }

        let mut scratch = ScopedTempFile::create()?;
        let file = scratch.file_mut();
        {
            let mut zip = ZipWriter::new(&mut *file);
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            for pdf in &pdfs {
                let mut source = File::open(self.root.join(&pdf.name))
                    .map_err(StoreError::io(format!("failed to open {}", pdf.name)))?;
                zip.start_file(pdf.name.as_str(), options)?;
                io::copy(&mut source, &mut zip)
                    .map_err(StoreError::io(format!("failed to add {} to bundle", pdf.name)))?;
            }
            zip.finish()?;
        }

        let mut bytes = Vec::new();
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_end(&mut bytes))
            .map_err(StoreError::io("failed to read PDF bundle"))?;

        info!(documents = pdfs.len(), bytes = bytes.len(), "bundled PDFs");
        Ok(bytes)
    }

    pub fn diagnostics(&self) -> WorkspaceDiagnostics {
        let writable = tempfile::Builder::new()
            .prefix(".write-check")
            .suffix(PARTIAL_SUFFIX)
            .tempfile_in(&self.root)
            .is_ok();

        WorkspaceDiagnostics {
            workspace_dir: self.root.display().to_string(),
            workspace_exists: self.root.is_dir(),
            archive_exists: self.archive.is_dir(),
            writable,
            document_count: list_dir(&self.root, true).map(|docs| docs.len()).unwrap_or(0),
            archived_count: list_dir(&self.archive, false).map(|docs| docs.len()).unwrap_or(0),
        }
    }

    // ── Name resolution ────────────────────────────────────────────────

    fn resolve_workspace(&self, name: &str) -> Result<PathBuf, StoreError> {
        let components = normalize_name(name, WORKSPACE_DEPTH)?;
        if components.len() > 1 && components[0].eq_ignore_ascii_case(ARCHIVE_DIR) {
            return Err(StoreError::Invalid(
                "Archived documents are only reachable through archive operations".into(),
            ));
        }
        Ok(components.iter().fold(self.root.clone(), |path, part| path.join(part)))
    }

    fn resolve_archived(&self, name: &str) -> Result<PathBuf, StoreError> {
        let components = normalize_name(name, ARCHIVE_DEPTH)?;
        Ok(self.archive.join(&components[0]))
    }

    fn resolve_folder(&self, folder: &str) -> Result<PathBuf, StoreError> {
        let components = normalize_name(folder, 1)?;
        if components[0].eq_ignore_ascii_case(ARCHIVE_DIR) {
            return Err(StoreError::Invalid(format!("'{ARCHIVE_DIR}' is not a workspace folder")));
        }
        let path = self.root.join(&components[0]);
        if !path.is_dir() {
            return Err(StoreError::NotFound(format!("Folder not found: {folder}")));
        }
        Ok(path)
    }

    fn ensure_archive(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.archive)
            .map_err(StoreError::io(format!("failed to create {}", self.archive.display())))
    }
}

/// Temporary file removed on drop; removal failures are logged, not raised.
struct ScopedTempFile {
    file: NamedTempFile,
}

impl ScopedTempFile {
    fn create() -> Result<Self, StoreError> {
        let file = tempfile::Builder::new()
            .prefix("pdf-bundle-")
            .suffix(".zip")
            .tempfile()
            .map_err(StoreError::io("failed to create PDF bundle file"))?;
        Ok(Self { file })
    }

    fn file_mut(&mut self) -> &mut File {
        self.file.as_file_mut()
    }
}

impl Drop for ScopedTempFile {
    fn drop(&mut self) {
        let path = self.file.path();
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed transient bundle"),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => warn!(path = %path.display(), %error, "failed to remove transient bundle"),
        }
    }
}

fn normalize_name(name: &str, max_depth: usize) -> Result<Vec<String>, StoreError> {
    normalize_relative_name(name, max_depth)
        .map_err(|error| StoreError::Invalid(format!("Invalid file name '{name}': {error}")))
}

fn ensure_allowed_extension(name: &str) -> Result<(), StoreError> {
    match file_extension(name) {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(StoreError::Invalid(format!(
            "File type not allowed: {name}. Allowed types: {}",
            ALLOWED_EXTENSIONS.join(", ")
        ))),
    }
}

fn is_pdf(name: &str) -> bool {
    file_extension(name).as_deref() == Some(PDF_EXTENSION)
}

fn is_markdown(name: &str) -> bool {
    file_extension(name).as_deref() == Some(MARKDOWN_EXTENSION)
}

fn leaf_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn existing_metadata(path: &Path, name: &str) -> Result<fs::Metadata, StoreError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => Ok(metadata),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            Err(StoreError::NotFound(format!("File not found: {name}")))
        }
        Err(error) => Err(StoreError::io(format!("failed to inspect {name}"))(error)),
    }
}

fn read_document(path: &Path, name: &str) -> Result<FileContents, StoreError> {
    let metadata = existing_metadata(path, name)?;
    if metadata.is_dir() {
        return Err(StoreError::Invalid(format!("{name} is a folder")));
    }
    let bytes = fs::read(path).map_err(StoreError::io(format!("failed to read {name}")))?;
    Ok(FileContents { name: leaf_name(path), bytes })
}

fn describe(path: &Path, name: &str) -> Result<DocumentInfo, StoreError> {
    let metadata =
        fs::metadata(path).map_err(StoreError::io(format!("failed to inspect {name}")))?;
    Ok(document_info(name, &metadata))
}

fn document_info(name: &str, metadata: &fs::Metadata) -> DocumentInfo {
    let last_modified: DateTime<Utc> =
        metadata.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
    let (size, kind) = if metadata.is_dir() {
        (0, FOLDER_TYPE.to_string())
    } else {
        (metadata.len(), file_extension(name).unwrap_or_else(|| UNKNOWN_TYPE.to_string()))
    };
    DocumentInfo { name: name.to_string(), size, last_modified, kind }
}

fn list_dir(dir: &Path, is_root: bool) -> Result<Vec<DocumentInfo>, StoreError> {
    let entries =
        fs::read_dir(dir).map_err(StoreError::io(format!("failed to list {}", dir.display())))?;

    let mut documents = Vec::new();
    for entry in entries {
        let entry = entry.map_err(StoreError::io(format!("failed to list {}", dir.display())))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(error) => {
                warn!(entry = %name, %error, "skipping unreadable entry");
                continue;
            }
        };

        if metadata.is_dir() {
            if is_root && name == ARCHIVE_DIR {
                continue;
            }
        } else if is_markdown(&name) || name.ends_with(PARTIAL_SUFFIX) {
            continue;
        }

        documents.push(document_info(&name, &metadata));
    }

    documents.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(documents)
}

fn markdown_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let entries =
        fs::read_dir(dir).map_err(StoreError::io(format!("failed to list {}", dir.display())))?;
    Ok(entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case(MARKDOWN_EXTENSION)))
        .collect())
}

/// `stem_YYYYMMDD_HHMMSS.ext`, plus `_N` when the stamped name is taken too.
fn timestamped_name(name: &str, stamp: &str, attempt: usize) -> String {
    let (stem, extension) = split_stem(name);
    let suffix = if attempt <= 1 { format!("_{stamp}") } else { format!("_{stamp}_{attempt}") };
    let extension = extension.map(|ext| format!(".{ext}")).unwrap_or_default();

    let stem = bounded_prefix(
        stem,
        MAX_NAME_CHARS.saturating_sub(suffix.chars().count() + extension.chars().count()),
        MAX_NAME_BYTES.saturating_sub(suffix.len() + extension.len()),
    );
    format!("{stem}{suffix}{extension}")
}

/// First free name in `dir` for `name`, following the collision policy.
fn free_name(dir: &Path, name: &str) -> String {
    if fs::symlink_metadata(dir.join(name)).is_err() {
        return name.to_string();
    }

    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    (1..)
        .map(|attempt| timestamped_name(name, &stamp, attempt))
        .find(|candidate| fs::symlink_metadata(dir.join(candidate)).is_err())
        .unwrap_or_else(|| name.to_string())
}

/// Create a brand-new file in `dir`; never truncates an existing one.
fn write_new_file(dir: &Path, name: &str, bytes: &[u8]) -> Result<(PathBuf, String), StoreError> {
    for _ in 0..MAX_NAME_ATTEMPTS {
        let candidate = free_name(dir, name);
        let path = dir.join(&candidate);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(error) => return Err(StoreError::io(format!("failed to create {candidate}"))(error)),
        };

        if let Err(error) = file.write_all(bytes).and_then(|()| file.sync_all()) {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %cleanup, "failed to remove partial upload");
            }
            return Err(StoreError::io(format!("failed to write {candidate}"))(error));
        }
        return Ok((path, candidate));
    }

    Err(StoreError::Io {
        context: format!("could not find a free name for {name}"),
        source: io::Error::from(io::ErrorKind::AlreadyExists),
    })
}

/// Move `source` into `dir` under a free name derived from `name`.
///
/// Linking fails instead of replacing a name taken since `free_name` looked,
/// so a concurrent writer's file is never clobbered.
fn rename_into(source: &Path, dir: &Path, name: &str) -> Result<(PathBuf, String), StoreError> {
    for _ in 0..MAX_NAME_ATTEMPTS {
        let stored_name = free_name(dir, name);
        let target = dir.join(&stored_name);
        match fs::hard_link(source, &target) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(error) => {
                return Err(StoreError::io(format!("failed to move {name} to {}", dir.display()))(error))
            }
        }

        if let Err(error) = fs::remove_file(source) {
            if let Err(cleanup) = fs::remove_file(&target) {
                warn!(path = %target.display(), error = %cleanup, "failed to undo link after a failed move");
            }
            return Err(StoreError::io(format!("failed to move {name} to {}", dir.display()))(error));
        }
        return Ok((target, stored_name));
    }

    Err(StoreError::Io {
        context: format!("could not find a free name for {name}"),
        source: io::Error::from(io::ErrorKind::AlreadyExists),
    })
}
