//! Local fallback store: the whole collection in one JSON snapshot file.
//!
//! Every insert rewrites the snapshot (temp file + rename), which is O(n) per
//! write and fine for collections of a few hundred documents. Rows read from
//! disk are written back exactly as they were found, including rows that
//! could not be turned into a [`Document`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::document::{Document, NewDocument};
use crate::error::{Result, StoreError};
use crate::store::DocumentStore;

#[derive(Default)]
struct Snapshot {
    /// Stored rows in file order, as read.
    rows: Vec<Value>,
    loaded: bool,
}

/// Single-file snapshot store.
pub struct LocalStore {
    /// Path of the snapshot file.
    path: PathBuf,

    /// Rows mirrored from the snapshot.
    snapshot: Mutex<Snapshot>,
}

impl LocalStore {
    /// Create a store backed by `path`. The file is read on [`load`](DocumentStore::load).
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            snapshot: Mutex::new(Snapshot::default()),
        }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_snapshot(&self) -> Result<Vec<Value>> {
        let exists = fs::try_exists(&self.path)
            .await
            .map_err(|e| StoreError::ReadSnapshot(format!("{}: {e}", self.path.display())))?;
        if !exists {
            debug!("No snapshot at {}; starting empty", self.path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| StoreError::ReadSnapshot(format!("{}: {e}", self.path.display())))?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    async fn write_snapshot(&self, rows: &[Value]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::WriteSnapshot(format!("{}: {e}", parent.display())))?;
        }

        let content = serde_json::to_string_pretty(rows)?;

        // Write atomically using a temp file
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| StoreError::WriteSnapshot(format!("{}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| StoreError::WriteSnapshot(format!("{}: {e}", self.path.display())))?;

        debug!("Saved {} rows to {}", rows.len(), self.path.display());
        Ok(())
    }
}

/// Next sequential id: the row count, or one past the highest numeric id
/// when the file holds gaps.
fn next_id(rows: &[Value]) -> String {
    let after_max = rows
        .iter()
        .filter_map(|row| match row.get("id")? {
            Value::Number(id) => id.as_u64(),
            Value::String(id) => id.parse::<u64>().ok(),
            _ => None,
        })
        .max()
        .map_or(0, |max| max.saturating_add(1));
    (rows.len() as u64).max(after_max).to_string()
}

#[async_trait]
impl DocumentStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn load(&self) -> Result<Vec<Document>> {
        let rows = self.read_snapshot().await?;
        let documents: Vec<Document> = rows.iter().filter_map(Document::from_row).collect();
        info!(
            "Loaded {} of {} rows from {}",
            documents.len(),
            rows.len(),
            self.path.display()
        );

        let mut snapshot = self.snapshot.lock().await;
        snapshot.rows = rows;
        snapshot.loaded = true;
        Ok(documents)
    }

    async fn insert(&self, document: NewDocument) -> Result<Document> {
        let mut snapshot = self.snapshot.lock().await;

        // Never overwrite a snapshot we have not read.
        if !snapshot.loaded {
            snapshot.rows = self.read_snapshot().await?;
            snapshot.loaded = true;
        }

        let document = document.with_id(next_id(&snapshot.rows));
        snapshot.rows.push(serde_json::to_value(&document)?);

        if let Err(e) = self.write_snapshot(&snapshot.rows).await {
            snapshot.rows.pop();
            return Err(e);
        }

        info!("Added document {} to local snapshot", document.id);
        Ok(document)
    }
}
