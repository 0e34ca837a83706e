use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Concurrent bundle tasks per importer.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Children an index container holds once the producer finished uploading.
///
/// Treated as a property of the producer's batch size; override it through
/// [`BundleLayout::expected_index_count`] if the producer changes.
pub const DEFAULT_EXPECTED_INDEX_COUNT: usize = 50;

/// A primary asset at or below this size is still being written.
pub const DEFAULT_PRIMARY_ASSET_MIN_BYTES: u64 = 100 * 1024 * 1024;

pub const DEFAULT_MANIFEST_NAME: &str = "info.json";
pub const DEFAULT_PRIMARY_ASSET_NAME: &str = "video.mp4";
pub const DEFAULT_INDEX_CONTAINER_NAME: &str = "storyboard";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("expected_index_count must be at least 1")]
    ZeroIndexCount,
    #[error("layout field '{0}' must not be blank")]
    BlankName(&'static str),
}

/// Importer tuning.
///
/// All fields carry defaults so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    /// Maximum bundle tasks running at once. Raising it increases pressure on
    /// both the remote store and the catalog.
    pub concurrency: usize,
    /// Names and thresholds that describe a finished bundle.
    pub layout: BundleLayout,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            layout: BundleLayout::default(),
        }
    }
}

impl ImporterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        self.layout.validate()
    }
}

/// The structural convention the producer follows when uploading a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleLayout {
    /// File name of the bundle manifest.
    pub manifest_name: String,
    /// File name of the primary media asset inside the bundle container.
    pub primary_asset_name: String,
    /// The primary asset only counts once it is strictly larger than this.
    pub primary_asset_min_bytes: u64,
    /// Name of the folder holding index fragments.
    pub index_container_name: String,
    /// Fragment count that marks the index container as fully written.
    pub expected_index_count: usize,
}

impl Default for BundleLayout {
    fn default() -> Self {
        Self {
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            primary_asset_name: DEFAULT_PRIMARY_ASSET_NAME.to_string(),
            primary_asset_min_bytes: DEFAULT_PRIMARY_ASSET_MIN_BYTES,
            index_container_name: DEFAULT_INDEX_CONTAINER_NAME.to_string(),
            expected_index_count: DEFAULT_EXPECTED_INDEX_COUNT,
        }
    }
}

impl BundleLayout {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.expected_index_count == 0 {
            return Err(ConfigError::ZeroIndexCount);
        }
        for (field, value) in [
            ("manifest_name", &self.manifest_name),
            ("primary_asset_name", &self.primary_asset_name),
            ("index_container_name", &self.index_container_name),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::BlankName(field));
            }
        }
        Ok(())
    }
}
