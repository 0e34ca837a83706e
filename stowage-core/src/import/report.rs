use chrono::{DateTime, Utc};
use serde::Serialize;
use stowage_model::{EntityId, IncompleteReason, RemoteFileId};

use crate::error::ImportError;

use super::pipeline::ScanMode;

/// Terminal state of one bundle task.
#[derive(Debug)]
pub enum BundleOutcome {
    Imported { video: EntityId, records: usize },
    Skipped(IncompleteReason),
    Failed(ImportError),
}

impl BundleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            BundleOutcome::Imported { .. } => "imported",
            BundleOutcome::Skipped(_) => "skipped",
            BundleOutcome::Failed(_) => "failed",
        }
    }
}

/// One settled bundle task, with enough context to investigate it by hand.
#[derive(Debug)]
pub struct BundleSettlement {
    pub manifest_file: RemoteFileId,
    pub container: Option<RemoteFileId>,
    /// Known once the manifest decoded.
    pub bundle_hash: Option<String>,
    pub outcome: BundleOutcome,
}

impl BundleSettlement {
    pub fn error(&self) -> Option<&ImportError> {
        match &self.outcome {
            BundleOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Settlement of every task submitted by one `run`.
#[derive(Debug)]
pub struct ImportReport {
    pub mode: ScanMode,
    pub discovered: usize,
    /// In completion order.
    pub settlements: Vec<BundleSettlement>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ImportReport {
    pub fn imported(&self) -> impl Iterator<Item = &BundleSettlement> {
        self.settlements
            .iter()
            .filter(|s| matches!(s.outcome, BundleOutcome::Imported { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &BundleSettlement> {
        self.settlements
            .iter()
            .filter(|s| matches!(s.outcome, BundleOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> impl Iterator<Item = &BundleSettlement> {
        self.settlements
            .iter()
            .filter(|s| matches!(s.outcome, BundleOutcome::Failed(_)))
    }

    pub fn is_clean(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn settlement_for(
        &self,
        manifest_file: &RemoteFileId,
    ) -> Option<&BundleSettlement> {
        self.settlements
            .iter()
            .find(|s| &s.manifest_file == manifest_file)
    }

    pub fn summary(&self) -> ImportSummary {
        ImportSummary {
            mode: self.mode,
            discovered: self.discovered,
            imported: self.imported().count(),
            skipped: self.skipped().count(),
            failed: self.failed().count(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub mode: ScanMode,
    pub discovered: usize,
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
