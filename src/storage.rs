use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use log::{debug, error, info, trace, warn};
use serde_json::Value;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::{Namespace, NotesError, Result};

/// Durable key-to-record storage split into independent namespaces.
///
/// Writes survive process restarts. They do not survive someone deleting the
/// data directory behind the application's back.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Writes `record` at `key`, replacing whatever was there.
    async fn put(&self, namespace: Namespace, key: &str, record: Value) -> Result<()>;

    /// Reads the record at `key`, `None` when absent.
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>>;

    /// Removes the record at `key`. Deleting an absent key succeeds.
    async fn delete(&self, namespace: Namespace, key: &str) -> Result<()>;

    /// Every record in the namespace, in no particular order.
    async fn list_all(&self, namespace: Namespace) -> Result<Vec<Value>>;
}

/// Rejects keys that would escape or collide inside a namespace directory
pub fn validate_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key.starts_with('.')
        || key.contains(['/', '\\', '\0'])
        || key.chars().any(char::is_control);
    if bad {
        return Err(NotesError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Stores each record as a pretty-printed JSON file:
/// `root/<namespace>/<key>.json`.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!("Using file store at {}", root.display());
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: Namespace) -> PathBuf {
        self.root.join(namespace.as_str())
    }

    fn record_path(&self, namespace: Namespace, key: &str) -> PathBuf {
        self.namespace_dir(namespace).join(format!("{}.json", key))
    }

    fn read_record(path: &Path) -> Result<Value> {
        trace!("Reading record from {}", path.display());
        let raw = fs::read_to_string(path).map_err(|e| {
            error!("Failed to read {}: {}", path.display(), e);
            NotesError::storage(format!("failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[async_trait]
impl Gateway for FileStore {
    async fn put(&self, namespace: Namespace, key: &str, record: Value) -> Result<()> {
        validate_key(key)?;
        let file_path = self.record_path(namespace, key);
        debug!("Writing {}/{} to {}", namespace, key, file_path.display());

        let dir = self.namespace_dir(namespace);
        if !dir.is_dir() {
            debug!("Creating namespace directory: {}", dir.display());
            fs::create_dir_all(&dir).map_err(|e| {
                error!("Failed to create directory {}: {}", dir.display(), e);
                NotesError::storage(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }

        // Write next to the target and rename so a crash never leaves half a record
        let mut temp_file = NamedTempFile::new_in(&dir).map_err(|e| {
            error!("Failed to create temporary file: {}", e);
            NotesError::from(e)
        })?;

        let json = serde_json::to_string_pretty(&record)?;
        temp_file.write_all(json.as_bytes())?;
        temp_file.flush()?;

        temp_file.persist(&file_path).map_err(|e| {
            error!("Failed to persist file {}: {}", file_path.display(), e.error);
            NotesError::from(e.error)
        })?;

        trace!("Record {}/{} written", namespace, key);
        Ok(())
    }

    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        let path = self.record_path(namespace, key);
        if !path.exists() {
            trace!("No record at {}", path.display());
            return Ok(None);
        }
        Self::read_record(&path).map(Some)
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.record_path(namespace, key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!("Nothing to delete at {}", path.display());
                Ok(())
            }
            Err(e) => {
                error!("Failed to delete {}: {}", path.display(), e);
                Err(e.into())
            }
        }
    }

    async fn list_all(&self, namespace: Namespace) -> Result<Vec<Value>> {
        let dir = self.namespace_dir(namespace);
        if !dir.exists() {
            debug!("Namespace directory {} does not exist yet", dir.display());
            return Ok(Vec::new());
        }

        // Surface an unreadable namespace instead of pretending it is empty
        fs::read_dir(&dir).map_err(|e| {
            error!("Cannot read namespace directory {}: {}", dir.display(), e);
            NotesError::storage(format!("cannot read {}: {}", dir.display(), e))
        })?;

        let mut records = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            match Self::read_record(path) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        debug!("Listed {} records in {}", records.len(), namespace);
        Ok(records)
    }
}

/// Keeps records in process memory only. Useful for throwaway sessions and
/// tests; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(Namespace, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_records<T>(
        &self,
        f: impl FnOnce(&mut HashMap<(Namespace, String), Value>) -> T,
    ) -> Result<T> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| NotesError::storage("memory store lock poisoned"))?;
        Ok(f(&mut records))
    }
}

#[async_trait]
impl Gateway for MemoryStore {
    async fn put(&self, namespace: Namespace, key: &str, record: Value) -> Result<()> {
        validate_key(key)?;
        self.with_records(|records| {
            records.insert((namespace, key.to_string()), record);
        })
    }

    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        self.with_records(|records| records.get(&(namespace, key.to_string())).cloned())
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<()> {
        validate_key(key)?;
        self.with_records(|records| {
            records.remove(&(namespace, key.to_string()));
        })
    }

    async fn list_all(&self, namespace: Namespace) -> Result<Vec<Value>> {
        self.with_records(|records| {
            records
                .iter()
                .filter(|((ns, _), _)| *ns == namespace)
                .map(|(_, record)| record.clone())
                .collect()
        })
    }
}
