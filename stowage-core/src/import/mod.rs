//! Bundle reconciliation: discover manifests, decide which bundles finished
//! uploading, and register each finished bundle with the catalog.

pub mod completeness;
pub mod manifest;
pub mod pipeline;
pub mod registrar;
pub mod report;

pub use completeness::CompletenessEvaluator;
pub use manifest::decode;
pub use pipeline::{BundleImporter, ScanMode};
pub use registrar::RecordRegistrar;
pub use report::{BundleOutcome, BundleSettlement, ImportReport, ImportSummary};
