use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{RecordId, RemoteFileId};

/// Where a catalog record's bytes live in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOrigin {
    pub origin_file_id: RemoteFileId,
}

impl FileOrigin {
    pub fn new(origin_file_id: RemoteFileId) -> Self {
        Self { origin_file_id }
    }
}

/// Catalog records created for one complete bundle.
///
/// `index_ids` is keyed by the index file's position in the store listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecordSet {
    pub meta_id: RecordId,
    pub asset_id: RecordId,
    pub index_ids: BTreeMap<usize, RecordId>,
}

impl FileRecordSet {
    /// Manifest and primary asset records plus one per index file.
    pub fn record_count(&self) -> usize {
        2 + self.index_ids.len()
    }

    /// Every record id in registration order.
    pub fn iter(&self) -> impl Iterator<Item = RecordId> + '_ {
        [self.meta_id, self.asset_id]
            .into_iter()
            .chain(self.index_ids.values().copied())
    }
}
