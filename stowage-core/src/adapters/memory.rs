//! In-process store and catalog.
//!
//! `MemoryStore` is immutable once built, which makes it a convenient stand-in
//! for a remote listing. `MemoryCatalog` keeps every record and video it was
//! asked to create, which backs dry runs and assertions in tests.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use stowage_model::{
    BundleManifest, DriverId, EntityId, FileDescriptor, FileOrigin,
    FileRecordSet, RecordId, RemoteFileId,
};
use tokio::sync::Mutex;

use crate::error::{CatalogError, StoreError, VideoCreationError};
use crate::ports::{Catalog, FileQuery, RemoteStore, VideoService};

#[derive(Debug, Clone)]
struct StoredEntry {
    descriptor: FileDescriptor,
    content: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Vec<StoredEntry>,
    failing_listings: HashSet<RemoteFileId>,
    failing_downloads: HashSet<RemoteFileId>,
    fail_name_search: bool,
}

impl MemoryStore {
    pub fn builder() -> MemoryStoreBuilder {
        MemoryStoreBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, id: &RemoteFileId) -> Option<&StoredEntry> {
        self.entries.iter().find(|entry| &entry.descriptor.id == id)
    }

    fn is_descendant(&self, entry: &FileDescriptor, ancestor: &RemoteFileId) -> bool {
        let mut seen = HashSet::new();
        let mut frontier: Vec<&RemoteFileId> = entry.parent_ids.iter().collect();
        while let Some(parent) = frontier.pop() {
            if parent == ancestor {
                return true;
            }
            if !seen.insert(parent) {
                continue;
            }
            if let Some(stored) = self.entry(parent) {
                frontier.extend(stored.descriptor.parent_ids.iter());
            }
        }
        false
    }

    fn depth(&self, entry: &FileDescriptor) -> usize {
        let mut depth = 0;
        let mut current = entry.primary_parent();
        let mut seen = HashSet::new();
        while let Some(parent) = current {
            if !seen.insert(parent) {
                break;
            }
            depth += 1;
            current = self
                .entry(parent)
                .and_then(|stored| stored.descriptor.primary_parent());
        }
        depth
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    /// Without a parent, a non-recursive search covers top-level entries and
    /// the direct children of top-level folders.
    async fn list_files(
        &self,
        query: &FileQuery,
    ) -> Result<Vec<FileDescriptor>, StoreError> {
        match &query.parent {
            Some(parent) if self.failing_listings.contains(parent) => {
                return Err(StoreError::Transport(format!(
                    "listing {parent} failed"
                )));
            }
            None if self.fail_name_search => {
                return Err(StoreError::Transport(format!(
                    "search {query} failed"
                )));
            }
            _ => {}
        }

        let matches = self
            .entries
            .iter()
            .map(|entry| &entry.descriptor)
            .filter(|descriptor| query.matches_name(&descriptor.name))
            .filter(|descriptor| match (&query.parent, query.recursive) {
                (Some(parent), false) => descriptor.parent_ids.contains(parent),
                (Some(parent), true) => self.is_descendant(descriptor, parent),
                (None, false) => self.depth(descriptor) <= 1,
                (None, true) => true,
            })
            .cloned()
            .collect();
        Ok(matches)
    }

    async fn download(&self, file: &RemoteFileId) -> Result<Vec<u8>, StoreError> {
        if self.failing_downloads.contains(file) {
            return Err(StoreError::Transport(format!("download {file} failed")));
        }
        self.entry(file)
            .map(|entry| entry.content.clone())
            .ok_or_else(|| StoreError::NotFound(file.clone()))
    }
}

/// Builds a [`MemoryStore`]. Entries are listed in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStoreBuilder {
    store: MemoryStore,
}

impl MemoryStoreBuilder {
    pub fn folder(
        self,
        id: impl Into<RemoteFileId>,
        name: impl Into<String>,
        parent: Option<&str>,
    ) -> Self {
        self.entry(id, name, parent.map(RemoteFileId::from), 0, Vec::new())
    }

    pub fn file(
        self,
        id: impl Into<RemoteFileId>,
        name: impl Into<String>,
        parent: &str,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        let content = content.into();
        let size = content.len() as u64;
        self.entry(id, name, Some(parent.into()), size, content)
    }

    /// A file whose reported size is `size_bytes` but whose content is empty.
    pub fn sized_file(
        self,
        id: impl Into<RemoteFileId>,
        name: impl Into<String>,
        parent: &str,
        size_bytes: u64,
    ) -> Self {
        self.entry(id, name, Some(parent.into()), size_bytes, Vec::new())
    }

    /// A file that is not filed under any container.
    pub fn orphan_file(
        self,
        id: impl Into<RemoteFileId>,
        name: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        let content = content.into();
        let size = content.len() as u64;
        self.entry(id, name, None, size, content)
    }

    pub fn fail_listing(mut self, parent: impl Into<RemoteFileId>) -> Self {
        self.store.failing_listings.insert(parent.into());
        self
    }

    pub fn fail_download(mut self, file: impl Into<RemoteFileId>) -> Self {
        self.store.failing_downloads.insert(file.into());
        self
    }

    /// Fail every listing that is not scoped to a parent.
    pub fn fail_name_search(mut self) -> Self {
        self.store.fail_name_search = true;
        self
    }

    pub fn build(self) -> MemoryStore {
        self.store
    }

    fn entry(
        mut self,
        id: impl Into<RemoteFileId>,
        name: impl Into<String>,
        parent: Option<RemoteFileId>,
        size_bytes: u64,
        content: Vec<u8>,
    ) -> Self {
        self.store.entries.push(StoredEntry {
            descriptor: FileDescriptor::new(id, name, parent, size_bytes),
            content,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: RecordId,
    pub name: String,
    pub source_driver: DriverId,
    pub origin: FileOrigin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredVideo {
    pub id: EntityId,
    pub manifest: BundleManifest,
    pub files: FileRecordSet,
}

/// Catalog and video service that keep everything in memory.
#[derive(Default)]
pub struct MemoryCatalog {
    records: Mutex<Vec<StoredRecord>>,
    videos: Mutex<Vec<StoredVideo>>,
    rejected_prefixes: Vec<String>,
}

impl fmt::Debug for MemoryCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let records = self
            .records
            .try_lock()
            .map(|guard| guard.len().to_string())
            .unwrap_or_else(|_| "<locked>".into());
        f.debug_struct("MemoryCatalog")
            .field("records", &records)
            .field("rejected_prefixes", &self.rejected_prefixes)
            .finish_non_exhaustive()
    }
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every record whose name starts with `prefix`.
    pub fn reject_names_starting_with(mut self, prefix: impl Into<String>) -> Self {
        self.rejected_prefixes.push(prefix.into());
        self
    }

    pub async fn records(&self) -> Vec<StoredRecord> {
        self.records.lock().await.clone()
    }

    pub async fn videos(&self) -> Vec<StoredVideo> {
        self.videos.lock().await.clone()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn create_file_record(
        &self,
        name: &str,
        source_driver: DriverId,
        origin: FileOrigin,
    ) -> Result<RecordId, CatalogError> {
        if self
            .rejected_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
        {
            return Err(CatalogError::Rejected {
                name: name.to_string(),
                reason: "name is blocked".into(),
            });
        }

        let id = RecordId::new();
        self.records.lock().await.push(StoredRecord {
            id,
            name: name.to_string(),
            source_driver,
            origin,
        });
        Ok(id)
    }
}

#[async_trait]
impl VideoService for MemoryCatalog {
    async fn create_video(
        &self,
        manifest: &BundleManifest,
        files: &FileRecordSet,
    ) -> Result<EntityId, VideoCreationError> {
        let id = EntityId::new();
        self.videos.lock().await.push(StoredVideo {
            id,
            manifest: manifest.clone(),
            files: files.clone(),
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::builder()
            .folder("A", "a", None)
            .file("A-info", "info.json", "A", b"{}".to_vec())
            .folder("A-deep", "nested", Some("A"))
            .file("A-deep-info", "info.json", "A-deep", b"{}".to_vec())
            .orphan_file("root-info", "info.json", b"{}".to_vec())
            .build()
    }

    fn ids(files: Vec<FileDescriptor>) -> Vec<String> {
        files.into_iter().map(|f| f.id.0).collect()
    }

    #[tokio::test]
    async fn shallow_name_search_stops_below_top_level_folders() {
        let store = store();
        let shallow = store
            .list_files(&FileQuery::named("info.json"))
            .await
            .expect("list");
        assert_eq!(ids(shallow), ["A-info", "root-info"]);

        let full = store
            .list_files(&FileQuery::named("info.json").recursive(true))
            .await
            .expect("list");
        assert_eq!(ids(full), ["A-info", "A-deep-info", "root-info"]);
    }

    #[tokio::test]
    async fn parent_scoped_listing_respects_recursion() {
        let store = store();
        let direct = store
            .list_files(&FileQuery::children_of("A".into()))
            .await
            .expect("list");
        assert_eq!(ids(direct), ["A-info", "A-deep"]);

        let nested = store
            .list_files(&FileQuery::children_of("A".into()).recursive(true))
            .await
            .expect("list");
        assert_eq!(ids(nested), ["A-info", "A-deep", "A-deep-info"]);
    }

    #[tokio::test]
    async fn download_reports_missing_and_injected_failures() {
        let store = MemoryStore::builder()
            .orphan_file("x", "info.json", b"data".to_vec())
            .fail_download("x")
            .build();
        assert!(matches!(
            store.download(&"x".into()).await,
            Err(StoreError::Transport(_))
        ));
        assert!(matches!(
            store.download(&"missing".into()).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
