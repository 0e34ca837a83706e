use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use stowage_model::{
    BundleManifest, CompleteBundle, DriverId, FileOrigin, FileRecordSet,
    RecordId, RemoteFileId,
};
use tracing::{debug, info};

use crate::error::{CatalogError, ImportError, Result};
use crate::ports::Catalog;

const MANIFEST_SUFFIX: &str = "json";
const PRIMARY_ASSET_SUFFIX: &str = "video";
const INDEX_SUFFIX: &str = "storyboard";

/// Creates the catalog records that back a finished bundle.
#[derive(Clone)]
pub struct RecordRegistrar {
    catalog: Arc<dyn Catalog>,
    driver: DriverId,
}

impl fmt::Debug for RecordRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordRegistrar")
            .field("driver", &self.driver)
            .finish_non_exhaustive()
    }
}

impl RecordRegistrar {
    pub fn new(catalog: Arc<dyn Catalog>, driver: DriverId) -> Self {
        Self { catalog, driver }
    }

    /// Register the manifest, the primary asset, and every index file, in
    /// that order.
    ///
    /// Stops at the first catalog failure. Records created before the
    /// failure stay in the catalog; the error reports how many there were.
    pub async fn register(
        &self,
        manifest: &BundleManifest,
        manifest_file: &RemoteFileId,
        bundle: &CompleteBundle,
    ) -> Result<FileRecordSet> {
        info!(
            bundle = %manifest.hash,
            records = bundle.index_files.len() + 2,
            "creating file records"
        );
        let mut created = 0usize;

        let meta_id = self
            .create(
                manifest,
                record_name(manifest, MANIFEST_SUFFIX),
                manifest_file,
                &mut created,
            )
            .await?;
        let asset_id = self
            .create(
                manifest,
                record_name(manifest, PRIMARY_ASSET_SUFFIX),
                &bundle.primary_asset_id,
                &mut created,
            )
            .await?;

        let mut index_ids = BTreeMap::new();
        for (ordinal, file) in bundle.index_files.iter().enumerate() {
            let id = self
                .create(
                    manifest,
                    index_record_name(manifest, ordinal),
                    &file.id,
                    &mut created,
                )
                .await?;
            index_ids.insert(ordinal, id);
        }

        let records = FileRecordSet {
            meta_id,
            asset_id,
            index_ids,
        };
        debug!(bundle = %manifest.hash, ?records, "file records created");
        Ok(records)
    }

    async fn create(
        &self,
        manifest: &BundleManifest,
        name: String,
        origin: &RemoteFileId,
        created: &mut usize,
    ) -> Result<RecordId> {
        let id = self
            .catalog
            .create_file_record(
                &name,
                self.driver,
                FileOrigin::new(origin.clone()),
            )
            .await
            .map_err(|source: CatalogError| ImportError::Registration {
                bundle: manifest.hash.clone(),
                created: *created,
                source,
            })?;
        *created += 1;
        Ok(id)
    }
}

pub fn record_name(manifest: &BundleManifest, suffix: &str) -> String {
    format!("{}{}", manifest.record_prefix(), suffix)
}

pub fn index_record_name(manifest: &BundleManifest, ordinal: usize) -> String {
    format!("{}{}{}", manifest.record_prefix(), INDEX_SUFFIX, ordinal)
}
