// Wire types shared between the server and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `type` reported for folder entries.
pub const FOLDER_TYPE: &str = "folder";

/// `type` reported for files without an extension.
pub const UNKNOWN_TYPE: &str = "unknown";

/// A document or folder entry as reported by listings and uploads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    /// Lowercase extension, `folder`, or `unknown`.
    #[serde(rename = "type")]
    pub kind: String,
}

impl DocumentInfo {
    pub fn is_folder(&self) -> bool {
        self.kind == FOLDER_TYPE
    }
}

/// Aggregate counts for a bulk operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BulkSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Persisted user preferences.
///
/// Every structural key defaults to empty when absent, so a record read from
/// a partially formed document always carries all four.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRecord {
    #[serde(default)]
    pub saved_database_ids: Vec<Value>,
    #[serde(default)]
    pub column_mappings: Map<String, Value>,
    #[serde(default)]
    pub tag_mappings: Map<String, Value>,
    #[serde(default)]
    pub bookmarks: Map<String, Value>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl ConfigRecord {
    /// Keys a full backup must carry to be restorable.
    pub const STRUCTURAL_KEYS: [&'static str; 4] =
        ["savedDatabaseIds", "columnMappings", "tagMappings", "bookmarks"];
}
