use serde::{Deserialize, Serialize};

use crate::ids::RemoteFileId;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// A file or folder as reported by the remote store listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub id: RemoteFileId,
    pub name: String,
    /// Containers holding this entry, in the order the store reports them.
    #[serde(default)]
    pub parent_ids: Vec<RemoteFileId>,
    #[serde(default)]
    pub size_bytes: u64,
}

impl FileDescriptor {
    pub fn new(
        id: impl Into<RemoteFileId>,
        name: impl Into<String>,
        parent: Option<RemoteFileId>,
        size_bytes: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_ids: parent.into_iter().collect(),
            size_bytes,
        }
    }

    /// The container this entry is filed under. Stores that allow multiple
    /// parents report the canonical one first.
    pub fn primary_parent(&self) -> Option<&RemoteFileId> {
        self.parent_ids.first()
    }

    pub fn size_mib(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MIB
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name == name
    }
}
