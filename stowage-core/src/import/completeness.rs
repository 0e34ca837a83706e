use std::fmt;
use std::sync::Arc;

use stowage_model::{
    BundleManifest, BundleState, CompleteBundle, FileDescriptor,
    IncompleteReason, RemoteFileId,
};
use tracing::{debug, info};

use crate::config::BundleLayout;
use crate::error::{ImportError, Result};
use crate::ports::{FileQuery, RemoteStore};

/// Decides whether a bundle container has finished uploading.
///
/// Remote listings lag behind a long running upload, so the decision is
/// purely structural: the producer writes a fixed number of index fragments
/// and one large primary asset, and the bundle counts as finished only when
/// both are visible.
#[derive(Clone)]
pub struct CompletenessEvaluator {
    store: Arc<dyn RemoteStore>,
    layout: BundleLayout,
}

impl fmt::Debug for CompletenessEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletenessEvaluator")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl CompletenessEvaluator {
    pub fn new(store: Arc<dyn RemoteStore>, layout: BundleLayout) -> Self {
        Self { store, layout }
    }

    pub fn layout(&self) -> &BundleLayout {
        &self.layout
    }

    pub async fn evaluate(
        &self,
        manifest: &BundleManifest,
        container: &RemoteFileId,
    ) -> Result<BundleState> {
        let entries = self.list_children(container).await?;
        debug!(
            bundle = %manifest.hash,
            container = %container,
            entries = entries.len(),
            "listed bundle container"
        );

        let primary_asset = self.find_primary_asset(container, &entries)?;
        debug!(bundle = %manifest.hash, primary_asset = ?primary_asset, "primary asset");

        let index_container = self.find_index_container(container, &entries)?;
        debug!(
            bundle = %manifest.hash,
            index_container = ?index_container.map(|entry| &entry.id),
            "index container"
        );

        let index_files = match index_container {
            Some(entry) => Some(self.list_children(&entry.id).await?),
            None => None,
        };

        let state = completeness_rule(
            primary_asset,
            index_files,
            self.layout.expected_index_count,
        );
        if let BundleState::Incomplete(reason) = &state {
            info!(
                bundle = %manifest.hash,
                container = %container,
                %reason,
                "bundle has not finished uploading yet"
            );
        }
        Ok(state)
    }

    async fn list_children(
        &self,
        container: &RemoteFileId,
    ) -> Result<Vec<FileDescriptor>> {
        self.store
            .list_files(&FileQuery::children_of(container.clone()))
            .await
            .map_err(|err| ImportError::transport(container, err))
    }

    fn find_primary_asset(
        &self,
        container: &RemoteFileId,
        entries: &[FileDescriptor],
    ) -> Result<Option<RemoteFileId>> {
        let mut candidates = entries.iter().filter(|entry| {
            entry.is_named(&self.layout.primary_asset_name)
                && entry.size_bytes > self.layout.primary_asset_min_bytes
        });
        let first = candidates.next();
        if candidates.next().is_some() {
            return Err(ImportError::MalformedBundle {
                container: container.clone(),
                reason: format!(
                    "more than one '{}' above {} bytes",
                    self.layout.primary_asset_name,
                    self.layout.primary_asset_min_bytes
                ),
            });
        }
        Ok(first.map(|entry| entry.id.clone()))
    }

    fn find_index_container<'a>(
        &self,
        container: &RemoteFileId,
        entries: &'a [FileDescriptor],
    ) -> Result<Option<&'a FileDescriptor>> {
        let mut matches = entries
            .iter()
            .filter(|entry| entry.is_named(&self.layout.index_container_name));
        let first = matches.next();
        if matches.next().is_some() {
            return Err(ImportError::MalformedBundle {
                container: container.clone(),
                reason: format!(
                    "more than one '{}' entry",
                    self.layout.index_container_name
                ),
            });
        }
        Ok(first)
    }
}

/// The completeness rule itself, separated from the listings that feed it.
///
/// Missing index container wins over a count mismatch, which wins over a
/// missing primary asset.
pub fn completeness_rule(
    primary_asset: Option<RemoteFileId>,
    index_files: Option<Vec<FileDescriptor>>,
    expected_index_count: usize,
) -> BundleState {
    let Some(index_files) = index_files else {
        return BundleState::Incomplete(IncompleteReason::MissingIndexContainer);
    };
    if index_files.len() != expected_index_count {
        return BundleState::Incomplete(IncompleteReason::IndexCountMismatch {
            found: index_files.len(),
            expected: expected_index_count,
        });
    }
    match primary_asset {
        Some(primary_asset_id) => BundleState::Complete(CompleteBundle {
            primary_asset_id,
            index_files,
        }),
        None => BundleState::Incomplete(IncompleteReason::MissingPrimaryAsset),
    }
}
