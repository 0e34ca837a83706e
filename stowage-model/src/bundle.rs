use std::fmt;

use serde::{Deserialize, Serialize};

use crate::files::FileDescriptor;
use crate::ids::RemoteFileId;

/// Classification of a bundle container for the current scan.
///
/// Never persisted; the next scan recomputes it from fresh listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleState {
    Incomplete(IncompleteReason),
    Complete(CompleteBundle),
}

impl BundleState {
    pub fn is_complete(&self) -> bool {
        matches!(self, BundleState::Complete(_))
    }
}

/// Files that make up a bundle that has finished uploading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteBundle {
    pub primary_asset_id: RemoteFileId,
    /// Children of the index container, in listing order.
    pub index_files: Vec<FileDescriptor>,
}

/// Why a bundle is still considered mid-upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IncompleteReason {
    MissingIndexContainer,
    IndexCountMismatch { found: usize, expected: usize },
    MissingPrimaryAsset,
}

impl fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncompleteReason::MissingIndexContainer => {
                f.write_str("index container not present")
            }
            IncompleteReason::IndexCountMismatch { found, expected } => {
                write!(f, "index container holds {found}/{expected} files")
            }
            IncompleteReason::MissingPrimaryAsset => {
                f.write_str("primary asset missing or below size threshold")
            }
        }
    }
}
