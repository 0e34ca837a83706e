//! Boundaries the import pipeline talks to.
//!
//! The remote store, the catalog, and the video service are owned by other
//! parts of the system. The pipeline only needs the capabilities below, and
//! every implementation must be safe to call from many bundle tasks at once.

use std::any::type_name_of_val;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use stowage_model::{
    BundleManifest, DriverId, EntityId, FileDescriptor, FileOrigin,
    FileRecordSet, RecordId, RemoteFileId,
};

use crate::error::{CatalogError, StoreError, VideoCreationError};

/// Listing request understood by every [`RemoteStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileQuery {
    /// Exact file name to match. `None` matches every entry.
    pub name: Option<String>,
    /// Restrict the listing to this container. `None` means the whole store.
    pub parent: Option<RemoteFileId>,
    /// Descend below direct children.
    pub recursive: bool,
}

impl FileQuery {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn children_of(parent: RemoteFileId) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name.as_deref().is_none_or(|wanted| wanted == name)
    }
}

/// Renders the query in Drive search syntax, e.g.
/// `name='info.json' and 'P1' in parents`.
impl fmt::Display for FileQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut clauses = Vec::with_capacity(2);
        if let Some(name) = &self.name {
            clauses.push(format!("name='{}'", name.replace('\'', "\\'")));
        }
        if let Some(parent) = &self.parent {
            clauses.push(format!("'{parent}' in parents"));
        }
        if clauses.is_empty() {
            f.write_str("*")?;
        } else {
            f.write_str(&clauses.join(" and "))?;
        }
        if self.recursive {
            f.write_str(" (recursive)")?;
        }
        Ok(())
    }
}

/// Operations a store handle actually supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapabilities {
    pub list: bool,
    pub download: bool,
}

impl StoreCapabilities {
    pub const FULL: StoreCapabilities = StoreCapabilities {
        list: true,
        download: true,
    };

    /// Name of the first capability the importer needs but the store lacks.
    pub fn missing_for_import(&self) -> Option<&'static str> {
        if !self.list {
            Some("list_files")
        } else if !self.download {
            Some("download")
        } else {
            None
        }
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Entries matching `query`, in the store's own listing order.
    async fn list_files(
        &self,
        query: &FileQuery,
    ) -> Result<Vec<FileDescriptor>, StoreError>;

    async fn download(&self, file: &RemoteFileId)
    -> Result<Vec<u8>, StoreError>;

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::FULL
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn create_file_record(
        &self,
        name: &str,
        source_driver: DriverId,
        origin: FileOrigin,
    ) -> Result<RecordId, CatalogError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoService: Send + Sync {
    async fn create_video(
        &self,
        manifest: &BundleManifest,
        files: &FileRecordSet,
    ) -> Result<EntityId, VideoCreationError>;
}

/// A configured store driver: the id records are attributed to plus the
/// client handle used to reach it.
#[derive(Clone)]
pub struct ImportDriver {
    pub id: DriverId,
    pub store: Arc<dyn RemoteStore>,
}

impl ImportDriver {
    pub fn new(id: DriverId, store: Arc<dyn RemoteStore>) -> Self {
        Self { id, store }
    }
}

impl fmt::Debug for ImportDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportDriver")
            .field("id", &self.id)
            .field("store", &type_name_of_val(self.store.as_ref()))
            .field("capabilities", &self.store.capabilities())
            .finish()
    }
}
