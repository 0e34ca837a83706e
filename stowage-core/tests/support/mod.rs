#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use stowage_core::adapters::memory::{MemoryCatalog, MemoryStore, MemoryStoreBuilder};
use stowage_core::config::ImporterConfig;
use stowage_core::error::{StoreError, VideoCreationError};
use stowage_core::import::BundleImporter;
use stowage_core::ports::{FileQuery, ImportDriver, RemoteStore, VideoService};
use stowage_model::{
    BundleManifest, DriverId, EntityId, FileDescriptor, FileRecordSet, RemoteFileId,
};

pub const MIB: u64 = 1024 * 1024;
pub const DRIVER: DriverId = DriverId(11);

/// Shape of one bundle folder placed at the top level of a store.
pub struct BundleFixture<'a> {
    pub folder: &'a str,
    pub hash: &'a str,
    pub javid: &'a str,
    pub asset_bytes: Option<u64>,
    pub index_files: Option<usize>,
}

impl<'a> BundleFixture<'a> {
    /// A bundle with every file uploaded.
    pub fn complete(folder: &'a str, hash: &'a str, javid: &'a str) -> Self {
        Self {
            folder,
            hash,
            javid,
            asset_bytes: Some(150 * MIB),
            index_files: Some(50),
        }
    }

    pub fn with_index_files(mut self, count: Option<usize>) -> Self {
        self.index_files = count;
        self
    }

    pub fn manifest_id(&self) -> RemoteFileId {
        RemoteFileId::new(format!("{}/info.json", self.folder))
    }

    pub fn add_to(&self, builder: MemoryStoreBuilder) -> MemoryStoreBuilder {
        let manifest =
            format!(r#"{{"hash":"{}","JAVID":"{}"}}"#, self.hash, self.javid);
        self.add_with_manifest(builder, manifest)
    }

    pub fn add_with_manifest(
        &self,
        builder: MemoryStoreBuilder,
        manifest: impl Into<Vec<u8>>,
    ) -> MemoryStoreBuilder {
        let folder = self.folder;
        let mut builder = builder
            .folder(folder, folder, None)
            .file(self.manifest_id(), "info.json", folder, manifest);
        if let Some(bytes) = self.asset_bytes {
            builder =
                builder.sized_file(format!("{folder}/video.mp4"), "video.mp4", folder, bytes);
        }
        if let Some(count) = self.index_files {
            let index = format!("{folder}/storyboard");
            builder = builder.folder(index.as_str(), "storyboard", Some(folder));
            for n in 0..count {
                builder = builder.sized_file(
                    format!("{index}/{n:03}.jpg"),
                    format!("{n:03}.jpg"),
                    &index,
                    4096,
                );
            }
        }
        builder
    }
}

pub fn importer(
    store: Arc<dyn RemoteStore>,
    catalog: Arc<MemoryCatalog>,
    config: ImporterConfig,
) -> BundleImporter {
    importer_with_videos(store, catalog.clone(), catalog, config)
}

pub fn importer_with_videos(
    store: Arc<dyn RemoteStore>,
    catalog: Arc<MemoryCatalog>,
    videos: Arc<dyn VideoService>,
    config: ImporterConfig,
) -> BundleImporter {
    BundleImporter::new(ImportDriver::new(DRIVER, store), catalog, videos, config)
        .expect("valid importer")
}

pub fn store_of(bundles: &[BundleFixture<'_>]) -> MemoryStore {
    bundles
        .iter()
        .fold(MemoryStore::builder(), |builder, bundle| bundle.add_to(builder))
        .build()
}

/// Counts bundle tasks in flight. A task enters when its manifest is
/// downloaded and leaves once its video is created.
#[derive(Default)]
pub struct TaskGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl TaskGauge {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Store half of the gauge: slow manifest downloads open a task.
pub struct GaugedStore {
    inner: MemoryStore,
    gauge: Arc<TaskGauge>,
    delay: Duration,
}

impl GaugedStore {
    pub fn new(inner: MemoryStore, gauge: Arc<TaskGauge>, delay: Duration) -> Self {
        Self {
            inner,
            gauge,
            delay,
        }
    }
}

#[async_trait]
impl RemoteStore for GaugedStore {
    async fn list_files(
        &self,
        query: &FileQuery,
    ) -> Result<Vec<FileDescriptor>, StoreError> {
        self.inner.list_files(query).await
    }

    async fn download(&self, file: &RemoteFileId) -> Result<Vec<u8>, StoreError> {
        self.gauge.enter();
        tokio::time::sleep(self.delay).await;
        self.inner.download(file).await
    }
}

/// Video half of the gauge: slow video creation closes the task.
pub struct GaugedVideos {
    inner: Arc<MemoryCatalog>,
    gauge: Arc<TaskGauge>,
    delay: Duration,
}

impl GaugedVideos {
    pub fn new(inner: Arc<MemoryCatalog>, gauge: Arc<TaskGauge>, delay: Duration) -> Self {
        Self {
            inner,
            gauge,
            delay,
        }
    }
}

#[async_trait]
impl VideoService for GaugedVideos {
    async fn create_video(
        &self,
        manifest: &BundleManifest,
        files: &FileRecordSet,
    ) -> Result<EntityId, VideoCreationError> {
        tokio::time::sleep(self.delay).await;
        let created = self.inner.create_video(manifest, files).await;
        self.gauge.leave();
        created
    }
}

/// Panics while creating the video of the bundle with hash `poisoned`.
pub struct PanickingVideos {
    pub inner: Arc<MemoryCatalog>,
    pub poisoned: &'static str,
}

#[async_trait]
impl VideoService for PanickingVideos {
    async fn create_video(
        &self,
        manifest: &BundleManifest,
        files: &FileRecordSet,
    ) -> Result<EntityId, VideoCreationError> {
        if manifest.hash == self.poisoned {
            panic!("video service crashed on {}", manifest.hash);
        }
        self.inner.create_video(manifest, files).await
    }
}
