//! Append-only JSON lines journal standing in for a catalog service.
//!
//! Every created record and video becomes one line. The journal is never
//! read back by the importer; it exists so a real run leaves an auditable
//! trail that a downstream loader can replay.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stowage_model::{
    BundleManifest, DriverId, EntityId, FileOrigin, FileRecordSet, RecordId,
};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{CatalogError, VideoCreationError};
use crate::ports::{Catalog, VideoService};

/// One line of the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum JournalEntry {
    FileRecord {
        id: RecordId,
        name: String,
        source_driver: DriverId,
        origin: FileOrigin,
        at: DateTime<Utc>,
    },
    Video {
        id: EntityId,
        manifest: BundleManifest,
        files: FileRecordSet,
        at: DateTime<Utc>,
    },
}

#[derive(Debug)]
pub struct JournalCatalog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JournalCatalog {
    /// Open `path` for appending, creating it when missing.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, entry: &JournalEntry) -> Result<(), CatalogError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Catalog for JournalCatalog {
    async fn create_file_record(
        &self,
        name: &str,
        source_driver: DriverId,
        origin: FileOrigin,
    ) -> Result<RecordId, CatalogError> {
        let id = RecordId::new();
        self.append(&JournalEntry::FileRecord {
            id,
            name: name.to_string(),
            source_driver,
            origin,
            at: Utc::now(),
        })
        .await?;
        debug!(record = %id, name, "journaled file record");
        Ok(id)
    }
}

#[async_trait]
impl VideoService for JournalCatalog {
    async fn create_video(
        &self,
        manifest: &BundleManifest,
        files: &FileRecordSet,
    ) -> Result<EntityId, VideoCreationError> {
        let id = EntityId::new();
        self.append(&JournalEntry::Video {
            id,
            manifest: manifest.clone(),
            files: files.clone(),
            at: Utc::now(),
        })
        .await?;
        debug!(video = %id, bundle = %manifest.hash, "journaled video");
        Ok(id)
    }
}
