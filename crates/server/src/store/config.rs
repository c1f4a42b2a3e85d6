// Preferences document persisted as a single JSON file.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::Utc;
use notypdf_common::types::ConfigRecord;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use super::markdown::write_atomically;
use super::StoreError;

#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("Invalid configuration format: missing {0}")]
    InvalidStructure(String),

    #[error("Configuration must be a JSON object")]
    NotAnObject,

    #[error("Invalid value for {key}: {source}")]
    InvalidField {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("stored configuration is corrupt: {0}")]
    Parse(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct ConfigStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current record; missing keys default to empty. The file is created
    /// with defaults on first access.
    pub fn load(&self) -> Result<ConfigRecord, ConfigStoreError> {
        let _guard = self.guard();
        self.read_or_init()
    }

    /// Merge the structural keys present in `partial` over the stored record.
    pub fn save(&self, partial: &Value) -> Result<ConfigRecord, ConfigStoreError> {
        let updates = partial.as_object().ok_or(ConfigStoreError::NotAnObject)?;

        let _guard = self.guard();
        let mut record = self.read_or_init()?;
        apply_updates(&mut record, updates)?;
        record.last_updated = Some(Utc::now());
        self.write(&record)?;

        let keys: Vec<&str> = ConfigRecord::STRUCTURAL_KEYS
            .into_iter()
            .filter(|key| updates.contains_key(*key))
            .collect();
        info!(keys = ?keys, "saved configuration");
        Ok(record)
    }

    /// Replace the record wholesale with a previously exported backup.
    ///
    /// All four structural keys must be present; otherwise nothing changes.
    pub fn restore(&self, full: &Value) -> Result<ConfigRecord, ConfigStoreError> {
        let object = full.as_object().ok_or(ConfigStoreError::NotAnObject)?;
        let missing: Vec<&str> = ConfigRecord::STRUCTURAL_KEYS
            .into_iter()
            .filter(|key| !object.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(ConfigStoreError::InvalidStructure(missing.join(", ")));
        }

        let mut record = ConfigRecord::default();
        apply_updates(&mut record, object)?;
        record.last_updated = Some(Utc::now());

        let _guard = self.guard();
        self.write(&record)?;
        info!(
            saved_database_ids = record.saved_database_ids.len(),
            column_mappings = record.column_mappings.len(),
            "restored configuration from backup"
        );
        Ok(record)
    }

    /// Reset to the empty default record.
    pub fn clear(&self) -> Result<ConfigRecord, ConfigStoreError> {
        let record = ConfigRecord { last_updated: Some(Utc::now()), ..ConfigRecord::default() };
        let _guard = self.guard();
        self.write(&record)?;
        info!("cleared configuration");
        Ok(record)
    }

    /// Pretty-printed document suitable for download and later restore.
    pub fn backup(&self) -> Result<String, ConfigStoreError> {
        let record = self.load()?;
        serde_json::to_string_pretty(&record).map_err(ConfigStoreError::Parse)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_or_init(&self) -> Result<ConfigRecord, ConfigStoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(ConfigStoreError::Parse),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                let record = ConfigRecord { last_updated: Some(Utc::now()), ..ConfigRecord::default() };
                if let Err(error) = self.write(&record) {
                    warn!(path = %self.path.display(), %error, "failed to create default configuration");
                }
                Ok(record)
            }
            Err(error) => Err(StoreError::io(format!("failed to read {}", self.path.display()))(error).into()),
        }
    }

    fn write(&self, record: &ConfigRecord) -> Result<(), ConfigStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(StoreError::io(format!("failed to create {}", parent.display())))?;
        }
        let bytes = serde_json::to_vec_pretty(record).map_err(ConfigStoreError::Parse)?;
        write_atomically(&self.path, &bytes)?;
        Ok(())
    }
}

fn apply_updates(record: &mut ConfigRecord, updates: &Map<String, Value>) -> Result<(), ConfigStoreError> {
    fn field<T: serde::de::DeserializeOwned>(key: &str, value: &Value) -> Result<T, ConfigStoreError> {
        serde_json::from_value(value.clone())
            .map_err(|source| ConfigStoreError::InvalidField { key: key.to_owned(), source })
    }

    if let Some(value) = updates.get("savedDatabaseIds") {
        record.saved_database_ids = field("savedDatabaseIds", value)?;
    }
    if let Some(value) = updates.get("columnMappings") {
        record.column_mappings = field("columnMappings", value)?;
    }
    if let Some(value) = updates.get("tagMappings") {
        record.tag_mappings = field("tagMappings", value)?;
    }
    if let Some(value) = updates.get("bookmarks") {
        record.bookmarks = field("bookmarks", value)?;
    }
    Ok(())
}
