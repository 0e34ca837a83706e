use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use stowage_model::{BundleState, DriverId, FileDescriptor, RemoteFileId};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::config::ImporterConfig;
use crate::error::{ImportError, Result};
use crate::ports::{Catalog, FileQuery, ImportDriver, RemoteStore, VideoService};

use super::completeness::CompletenessEvaluator;
use super::manifest::decode;
use super::registrar::RecordRegistrar;
use super::report::{BundleOutcome, BundleSettlement, ImportReport};

/// How far manifest discovery reaches into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Incremental pass over the store's top level.
    Shallow,
    /// Walk the whole store.
    Full,
}

impl ScanMode {
    pub fn from_full(full: bool) -> Self {
        if full { ScanMode::Full } else { ScanMode::Shallow }
    }

    pub fn is_recursive(self) -> bool {
        matches!(self, ScanMode::Full)
    }
}

/// Everything a bundle task needs. Shared read-only between tasks.
struct ImportContext {
    store: Arc<dyn RemoteStore>,
    evaluator: CompletenessEvaluator,
    registrar: RecordRegistrar,
    videos: Arc<dyn VideoService>,
}

/// Scans one store driver for finished bundles and imports them.
///
/// Each instance owns its worker pool: `run` discovers every manifest in a
/// single listing, then runs at most `concurrency` bundle tasks at a time and
/// returns once all of them settled. A failing bundle never affects its
/// siblings.
pub struct BundleImporter {
    driver: DriverId,
    context: Arc<ImportContext>,
    manifest_name: String,
    concurrency: usize,
    permits: Arc<Semaphore>,
    span: Span,
}

impl fmt::Debug for BundleImporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleImporter")
            .field("driver", &self.driver)
            .field("manifest_name", &self.manifest_name)
            .field("concurrency", &self.concurrency)
            .field("permits_available", &self.permits.available_permits())
            .finish()
    }
}

impl BundleImporter {
    /// Build an importer for `driver`.
    ///
    /// Fails before any work is scheduled when the store handle cannot list
    /// or download, or when the configuration is unusable.
    pub fn new(
        driver: ImportDriver,
        catalog: Arc<dyn Catalog>,
        videos: Arc<dyn VideoService>,
        config: ImporterConfig,
    ) -> Result<Self> {
        if let Some(missing) = driver.store.capabilities().missing_for_import()
        {
            return Err(ImportError::InvalidDriver {
                driver: driver.id,
                reason: format!("store handle does not support {missing}"),
            });
        }
        config.validate()?;

        let span = info_span!("importer", driver = %driver.id);
        span.in_scope(|| {
            info!(concurrency = config.concurrency, "got store driver instance")
        });

        let ImporterConfig {
            concurrency,
            layout,
        } = config;
        let manifest_name = layout.manifest_name.clone();
        let context = ImportContext {
            evaluator: CompletenessEvaluator::new(
                Arc::clone(&driver.store),
                layout,
            ),
            registrar: RecordRegistrar::new(catalog, driver.id),
            store: driver.store,
            videos,
        };

        Ok(Self {
            driver: driver.id,
            context: Arc::new(context),
            manifest_name,
            concurrency,
            permits: Arc::new(Semaphore::new(concurrency)),
            span,
        })
    }

    pub fn driver(&self) -> DriverId {
        self.driver
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// `full` selects a recursive scan of the whole store.
    pub async fn run_full(&self, full: bool) -> Result<ImportReport> {
        self.run(ScanMode::from_full(full)).await
    }

    /// Discover manifests and settle one task per manifest.
    ///
    /// Only the discovery listing can fail the batch; per-bundle failures
    /// are recorded in the returned report.
    pub async fn run(&self, mode: ScanMode) -> Result<ImportReport> {
        self.run_batch(mode).instrument(self.span.clone()).await
    }

    async fn run_batch(&self, mode: ScanMode) -> Result<ImportReport> {
        let started_at = Utc::now();
        info!(?mode, "starting import");

        let query =
            FileQuery::named(&self.manifest_name).recursive(mode.is_recursive());
        let manifests = self.context.store.list_files(&query).await.map_err(
            |source| ImportError::Discovery {
                query: query.to_string(),
                source,
            },
        )?;
        let discovered = manifests.len();
        info!(discovered, "got manifest file list");

        let mut tasks = JoinSet::new();
        let mut in_flight = HashMap::with_capacity(discovered);
        for manifest_file in manifests {
            // Taken before spawning so discovery never runs ahead of the pool.
            let permit =
                Arc::clone(&self.permits).acquire_owned().await.map_err(
                    |_| ImportError::Internal("worker pool closed".into()),
                )?;
            let context = Arc::clone(&self.context);
            let manifest_id = manifest_file.id.clone();
            let span =
                info_span!(parent: &self.span, "bundle", manifest = %manifest_id);

            let handle = tasks.spawn(
                async move {
                    let settlement = context.settle(manifest_file).await;
                    drop(permit);
                    settlement
                }
                .instrument(span),
            );
            in_flight.insert(handle.id(), manifest_id);
        }

        let mut settlements = Vec::with_capacity(discovered);
        while let Some(joined) = tasks.join_next_with_id().await {
            let settlement = match joined {
                Ok((task_id, settlement)) => {
                    in_flight.remove(&task_id);
                    settlement
                }
                Err(join_err) => {
                    let file = in_flight
                        .remove(&join_err.id())
                        .unwrap_or_else(|| RemoteFileId::new("<unknown>"));
                    error!(manifest = %file, error = %join_err, "bundle task aborted");
                    BundleSettlement {
                        container: None,
                        bundle_hash: None,
                        outcome: BundleOutcome::Failed(
                            ImportError::TaskAborted {
                                file: file.clone(),
                                reason: join_err.to_string(),
                            },
                        ),
                        manifest_file: file,
                    }
                }
            };
            settlements.push(settlement);
        }

        let report = ImportReport {
            mode,
            discovered,
            settlements,
            started_at,
            finished_at: Utc::now(),
        };
        let summary = report.summary();
        info!(
            discovered = summary.discovered,
            imported = summary.imported,
            skipped = summary.skipped,
            failed = summary.failed,
            "all bundle tasks settled"
        );
        Ok(report)
    }
}

impl ImportContext {
    async fn settle(&self, manifest_file: FileDescriptor) -> BundleSettlement {
        let mut bundle_hash = None;
        let outcome = match self.import(&manifest_file, &mut bundle_hash).await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                let bundle = bundle_hash.as_deref().unwrap_or("-");
                if matches!(err, ImportError::MalformedBundle { .. }) {
                    warn!(
                        manifest = %manifest_file.id,
                        bundle,
                        error = %err,
                        "bundle is malformed"
                    );
                } else {
                    error!(
                        manifest = %manifest_file.id,
                        bundle,
                        kind = err.kind(),
                        error = %err,
                        "bundle import failed"
                    );
                }
                BundleOutcome::Failed(err)
            }
        };

        BundleSettlement {
            container: manifest_file.primary_parent().cloned(),
            manifest_file: manifest_file.id,
            bundle_hash,
            outcome,
        }
    }

    /// download -> decode -> evaluate -> register -> create video
    async fn import(
        &self,
        manifest_file: &FileDescriptor,
        bundle_hash: &mut Option<String>,
    ) -> Result<BundleOutcome> {
        debug!("handling manifest file");
        let bytes = self
            .store
            .download(&manifest_file.id)
            .await
            .map_err(|err| ImportError::transport(&manifest_file.id, err))?;
        debug!(
            bytes = bytes.len(),
            preview = %manifest_preview(&bytes),
            "downloaded manifest"
        );

        let manifest = decode(&bytes).map_err(|source| ImportError::Decode {
            file: manifest_file.id.clone(),
            source,
        })?;
        *bundle_hash = Some(manifest.hash.clone());

        let container = manifest_file.primary_parent().ok_or_else(|| {
            ImportError::MalformedBundle {
                container: manifest_file.id.clone(),
                reason: "manifest has no parent container".into(),
            }
        })?;
        debug!(bundle = %manifest.hash, container = %container, "bundle container");

        let bundle = match self.evaluator.evaluate(&manifest, container).await?
        {
            BundleState::Incomplete(reason) => {
                return Ok(BundleOutcome::Skipped(reason));
            }
            BundleState::Complete(bundle) => bundle,
        };
        info!(bundle = %manifest.hash, "check pass");

        let records = self
            .registrar
            .register(&manifest, &manifest_file.id, &bundle)
            .await?;

        let video = self
            .videos
            .create_video(&manifest, &records)
            .await
            .map_err(|source| ImportError::VideoCreation {
                bundle: manifest.hash.clone(),
                source,
            })?;
        info!(
            bundle = %manifest.hash,
            %video,
            records = records.record_count(),
            "bundle imported"
        );

        Ok(BundleOutcome::Imported {
            video,
            records: records.record_count(),
        })
    }
}

/// Longest manifest prefix written to debug logs.
const MANIFEST_PREVIEW_BYTES: usize = 256;

fn manifest_preview(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(&bytes[..bytes.len().min(MANIFEST_PREVIEW_BYTES)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryCatalog, MemoryStore};
    use crate::error::{StoreError, VideoCreationError};
    use crate::ports::{MockVideoService, StoreCapabilities};
    use async_trait::async_trait;
    use stowage_model::{EntityId, FileDescriptor, IncompleteReason};

    const MIB: u64 = 1024 * 1024;

    struct ListOnlyStore;

    #[async_trait]
    impl RemoteStore for ListOnlyStore {
        async fn list_files(
            &self,
            _query: &FileQuery,
        ) -> std::result::Result<Vec<FileDescriptor>, StoreError> {
            Ok(Vec::new())
        }

        async fn download(
            &self,
            _file: &RemoteFileId,
        ) -> std::result::Result<Vec<u8>, StoreError> {
            Err(StoreError::Unsupported("download"))
        }

        fn capabilities(&self) -> StoreCapabilities {
            StoreCapabilities {
                list: true,
                download: false,
            }
        }
    }

    fn complete_store(index_count: usize) -> MemoryStore {
        let mut builder = MemoryStore::builder()
            .folder("P1", "ABC-123", None)
            .file("M1", "info.json", "P1", br#"{"hash":"h1","JAVID":"K"}"#)
            .sized_file("V1", "video.mp4", "P1", 150 * MIB)
            .folder("SB", "storyboard", Some("P1"));
        for n in 0..index_count {
            builder = builder.sized_file(
                format!("sb-{n}"),
                format!("{n}.jpg"),
                "SB",
                2048,
            );
        }
        builder.build()
    }

    fn importer(
        store: MemoryStore,
        catalog: Arc<MemoryCatalog>,
        videos: Arc<dyn VideoService>,
    ) -> BundleImporter {
        BundleImporter::new(
            ImportDriver::new(DriverId(3), Arc::new(store)),
            catalog,
            videos,
            ImporterConfig::default(),
        )
        .expect("valid importer")
    }

    #[test]
    fn store_without_download_is_an_invalid_driver() {
        let catalog = Arc::new(MemoryCatalog::new());
        let err = BundleImporter::new(
            ImportDriver::new(DriverId(9), Arc::new(ListOnlyStore)),
            catalog.clone(),
            catalog,
            ImporterConfig::default(),
        )
        .expect_err("download capability missing");

        match err {
            ImportError::InvalidDriver { driver, reason } => {
                assert_eq!(driver, DriverId(9));
                assert!(reason.contains("download"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unusable_config_fails_construction() {
        let catalog = Arc::new(MemoryCatalog::new());
        let err = BundleImporter::new(
            ImportDriver::new(DriverId(1), Arc::new(MemoryStore::default())),
            catalog.clone(),
            catalog,
            ImporterConfig {
                concurrency: 0,
                ..ImporterConfig::default()
            },
        )
        .expect_err("zero concurrency");
        assert!(matches!(err, ImportError::Config(_)));
    }

    #[tokio::test]
    async fn complete_bundle_creates_exactly_one_video() {
        let catalog = Arc::new(MemoryCatalog::new());
        let mut videos = MockVideoService::new();
        videos
            .expect_create_video()
            .withf(|manifest, files| {
                manifest.hash == "h1" && files.record_count() == 52
            })
            .times(1)
            .returning(|_, _| Ok(EntityId::new()));

        let report = importer(complete_store(50), catalog.clone(), Arc::new(videos))
            .run(ScanMode::Full)
            .await
            .expect("run");

        assert_eq!(report.summary().imported, 1);
        assert_eq!(catalog.records().await.len(), 52);
    }

    #[tokio::test]
    async fn incomplete_bundle_never_reaches_catalog_or_video_service() {
        let catalog = Arc::new(MemoryCatalog::new());
        let mut videos = MockVideoService::new();
        videos.expect_create_video().times(0);
        let importer = importer(complete_store(49), catalog.clone(), Arc::new(videos));

        for _ in 0..2 {
            let report = importer.run(ScanMode::Shallow).await.expect("run");
            let settlement = report
                .settlement_for(&"M1".into())
                .expect("manifest settled");
            assert!(matches!(
                settlement.outcome,
                BundleOutcome::Skipped(IncompleteReason::IndexCountMismatch {
                    found: 49,
                    expected: 50
                })
            ));
        }
        assert!(catalog.records().await.is_empty());
    }

    #[tokio::test]
    async fn video_rejection_is_a_task_failure() {
        let catalog = Arc::new(MemoryCatalog::new());
        let mut videos = MockVideoService::new();
        videos
            .expect_create_video()
            .returning(|_, _| Err(VideoCreationError::Rejected("duplicate".into())));

        let report = importer(complete_store(50), catalog.clone(), Arc::new(videos))
            .run(ScanMode::Full)
            .await
            .expect("run");

        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].bundle_hash.as_deref(), Some("h1"));
        assert_eq!(failed[0].container, Some(RemoteFileId::from("P1")));
        assert!(matches!(
            failed[0].error(),
            Some(ImportError::VideoCreation { .. })
        ));
        // Records are not rolled back.
        assert_eq!(catalog.records().await.len(), 52);
    }

    #[tokio::test]
    async fn discovery_failure_fails_the_batch() {
        let store = MemoryStore::builder().fail_name_search().build();
        let catalog = Arc::new(MemoryCatalog::new());
        let err = importer(store, catalog.clone(), catalog)
            .run(ScanMode::Full)
            .await
            .expect_err("discovery fails");
        assert!(matches!(err, ImportError::Discovery { .. }));
    }

    #[tokio::test]
    async fn orphan_manifest_is_malformed() {
        let store = MemoryStore::builder()
            .orphan_file("M1", "info.json", br#"{"hash":"h","JAVID":"K"}"#)
            .build();
        let catalog = Arc::new(MemoryCatalog::new());
        let report = importer(store, catalog.clone(), catalog)
            .run(ScanMode::Full)
            .await
            .expect("run");
        assert!(matches!(
            report.settlements[0].error(),
            Some(ImportError::MalformedBundle { .. })
        ));
        assert_eq!(report.settlements[0].container, None);
    }

    #[test]
    fn scan_mode_maps_flag() {
        assert_eq!(ScanMode::from_full(true), ScanMode::Full);
        assert_eq!(ScanMode::from_full(false), ScanMode::Shallow);
        assert!(ScanMode::Full.is_recursive());
        assert!(!ScanMode::Shallow.is_recursive());
    }

    #[test]
    fn manifest_preview_is_truncated() {
        let large = vec![b'a'; 1000];
        assert_eq!(manifest_preview(&large).len(), MANIFEST_PREVIEW_BYTES);

        let small = br#"{"hash":"h1","JAVID":"K"}"#;
        assert_eq!(manifest_preview(small), r#"{"hash":"h1","JAVID":"K"}"#);
    }
}
