// Derived Markdown artifacts for PDF documents.
//
// `<dir>/<stem>.md` sits next to `<dir>/<stem>.pdf`. It is generated on first
// request and reused until the PDF is deleted, moved or archived.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use thiserror::Error;
use tracing::{debug, info};

use super::StoreError;

pub const MARKDOWN_EXTENSION: &str = "md";

/// Suffix of in-flight temporary files; never a user-visible document.
pub const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ConversionError(pub String);

/// Renders a PDF on disk into Markdown text.
pub trait PdfConverter: Send + Sync {
    fn convert(&self, pdf_path: &Path) -> Result<String, ConversionError>;
}

/// Text extraction via `pdf-extract`, laid out as Markdown.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractConverter;

impl PdfConverter for PdfExtractConverter {
    fn convert(&self, pdf_path: &Path) -> Result<String, ConversionError> {
        let text = pdf_extract::extract_text(pdf_path)
            .map_err(|error| ConversionError(error.to_string()))?;
        let title = pdf_path.file_stem().map(|stem| stem.to_string_lossy()).unwrap_or_default();
        Ok(render_markdown(&title, &text))
    }
}

/// Lay out extracted text: a title heading, one block per page separated by
/// horizontal rules, paragraphs separated by a single blank line.
pub fn render_markdown(title: &str, text: &str) -> String {
    let pages: Vec<String> =
        text.split('\u{000C}').map(normalize_page).filter(|page| !page.is_empty()).collect();

    let mut out = format!("# {title}\n");
    for (index, page) in pages.iter().enumerate() {
        if index > 0 {
            out.push_str("\n---\n");
        }
        out.push('\n');
        out.push_str(page);
        out.push('\n');
    }
    out
}

fn normalize_page(page: &str) -> String {
    let mut paragraphs: Vec<Vec<&str>> = vec![Vec::new()];
    for line in page.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            if paragraphs.last().is_some_and(|paragraph| !paragraph.is_empty()) {
                paragraphs.push(Vec::new());
            }
        } else if let Some(paragraph) = paragraphs.last_mut() {
            paragraph.push(line);
        }
    }

    paragraphs
        .into_iter()
        .filter(|paragraph| !paragraph.is_empty())
        .map(|paragraph| paragraph.join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Location of the artifact derived from `pdf_path`.
pub fn artifact_path(pdf_path: &Path) -> PathBuf {
    pdf_path.with_extension(MARKDOWN_EXTENSION)
}

/// Remove the artifact for `pdf_path`. Returns whether one existed.
pub fn remove_artifact(pdf_path: &Path) -> Result<bool, StoreError> {
    let target = artifact_path(pdf_path);
    match fs::remove_file(&target) {
        Ok(()) => {
            debug!(artifact = %target.display(), "removed derived markdown");
            Ok(true)
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(StoreError::io(format!("failed to remove {}", target.display()))(error)),
    }
}

/// Carry the artifact along when its PDF moves. Returns whether one existed.
pub fn move_artifact(from_pdf: &Path, to_pdf: &Path) -> Result<bool, StoreError> {
    let source = artifact_path(from_pdf);
    let target = artifact_path(to_pdf);
    match fs::rename(&source, &target) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(StoreError::io(format!("failed to move {}", source.display()))(error)),
    }
}

/// Write `contents` to `target` via a temporary sibling and a rename, so a
/// reader never observes a half-written file.
pub(crate) fn write_atomically(target: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".")
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(parent)
        .map_err(StoreError::io(format!("failed to stage {}", target.display())))?;
    temp.write_all(contents)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(StoreError::io(format!("failed to write {}", target.display())))?;
    temp.persist(target)
        .map_err(|error| StoreError::io(format!("failed to persist {}", target.display()))(error.error))?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownArtifact {
    pub content: String,
    /// `true` when served from disk without invoking the converter.
    pub cached: bool,
}

/// Generate-once cache of PDF renderings.
#[derive(Clone)]
pub struct MarkdownCache {
    converter: Arc<dyn PdfConverter>,
}

impl MarkdownCache {
    pub fn new(converter: Arc<dyn PdfConverter>) -> Self {
        Self { converter }
    }

    /// Return the cached rendering of `pdf_path`, generating it if absent.
    ///
    /// The caller has already checked that `pdf_path` is an existing PDF. A
    /// failed conversion leaves nothing behind.
    pub fn get_or_generate(&self, pdf_path: &Path) -> Result<MarkdownArtifact, StoreError> {
        let target = artifact_path(pdf_path);
        match fs::read_to_string(&target) {
            Ok(content) => return Ok(MarkdownArtifact { content, cached: true }),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => {
                return Err(StoreError::io(format!("failed to read {}", target.display()))(error))
            }
        }

        let name = pdf_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let content = self
            .converter
            .convert(pdf_path)
            .map_err(|error| StoreError::Conversion { name: name.clone(), message: error.0 })?;

        write_atomically(&target, content.as_bytes())?;
        info!(document = %name, bytes = content.len(), "generated markdown rendering");

        Ok(MarkdownArtifact { content, cached: false })
    }
}
