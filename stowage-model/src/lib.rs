//! Core data model definitions shared across Stowage crates.
#![allow(missing_docs)]

pub mod bundle;
pub mod files;
pub mod ids;
pub mod manifest;
pub mod records;

pub use bundle::{BundleState, CompleteBundle, IncompleteReason};
pub use files::FileDescriptor;
pub use ids::{DriverId, EntityId, RecordId, RemoteFileId};
pub use manifest::BundleManifest;
pub use records::{FileOrigin, FileRecordSet};
