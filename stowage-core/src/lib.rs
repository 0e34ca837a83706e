//! # Stowage Core
//!
//! Detects bundles that finished uploading to a remote store and registers
//! them with a catalog.
//!
//! A bundle is a container holding a JSON manifest (`info.json`), a primary
//! video asset and an index container of preview frames. Uploads arrive file by
//! file, so every scan re-evaluates each bundle it discovers and only imports
//! the ones whose files are all present.
//!
//! ## Architecture
//!
//! - [`ports`]: the store, catalog and video service boundaries
//! - [`import`]: manifest discovery, completeness checks, record registration
//!   and the bounded worker pool that drives them
//! - [`adapters`]: local folder, in-memory and journal implementations of the
//!   ports
//! - [`config`]: importer tuning and bundle layout
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use stowage_core::adapters::{LocalFolderStore, MemoryCatalog};
//! use stowage_core::config::ImporterConfig;
//! use stowage_core::import::{BundleImporter, ScanMode};
//! use stowage_core::ports::ImportDriver;
//! use stowage_model::DriverId;
//!
//! async fn scan() -> stowage_core::Result<()> {
//!     let store = Arc::new(LocalFolderStore::new("/srv/drive"));
//!     let catalog = Arc::new(MemoryCatalog::new());
//!     let importer = BundleImporter::new(
//!         ImportDriver::new(DriverId(1), store),
//!         catalog.clone(),
//!         catalog,
//!         ImporterConfig::default(),
//!     )?;
//!     let report = importer.run(ScanMode::Shallow).await?;
//!     println!("{} bundles imported", report.summary().imported);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Store, catalog and video service implementations
pub mod adapters;

/// Importer configuration and bundle layout
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Bundle discovery, completeness evaluation and registration
pub mod import;

/// Boundaries the importer talks to
pub mod ports;

pub use config::{BundleLayout, ImporterConfig};
pub use error::{ImportError, Result};
pub use import::{BundleImporter, ImportReport, ScanMode};
pub use ports::{Catalog, ImportDriver, RemoteStore, VideoService};
