// Local persistence: the document workspace, its archive, derived Markdown
// artifacts and the preferences document.

pub mod bulk;
pub mod config;
pub mod markdown;
pub mod workspace;

use std::io;

use thiserror::Error;

pub use bulk::{BulkOutcome, BulkReport};
pub use config::{ConfigStore, ConfigStoreError};
pub use markdown::{MarkdownArtifact, PdfConverter, PdfExtractConverter};
pub use workspace::{FileContents, WorkspaceDiagnostics, WorkspaceStore};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Client-caused: bad name, disallowed extension, wrong kind of entry.
    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("PDF conversion failed for {name}: {message}")]
    Conversion { name: String, message: String },

    #[error("failed to build PDF bundle: {0}")]
    Bundle(#[from] zip::result::ZipError),
}

impl StoreError {
    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }
}

