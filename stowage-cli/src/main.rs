//! `stowage`: scan a synced drive folder once and import every bundle that
//! finished uploading.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use stowage_core::adapters::{JournalCatalog, LocalFolderStore, MemoryCatalog};
use stowage_core::import::{BundleImporter, ImportReport, ImportSummary, ScanMode};
use stowage_core::ports::{Catalog, ImportDriver, VideoService};
use stowage_model::DriverId;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ConfigLoader, ImporterConfigSource};

/// Exit status when the batch ran but at least one bundle failed.
const EXIT_BUNDLE_FAILURES: u8 = 2;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "stowage")]
#[command(
    about = "Import fully uploaded bundles from a remote drive into the catalog"
)]
struct Cli {
    /// Folder holding the synced remote drive
    #[arg(long, env = "STOWAGE_ROOT")]
    root: PathBuf,

    /// Walk the whole drive instead of its top level
    #[arg(long)]
    full: bool,

    /// Importer config file (TOML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Append created records and videos to this JSON lines journal
    #[arg(long, required_unless_present = "dry_run")]
    journal: Option<PathBuf>,

    /// Keep created records in memory only
    #[arg(long, conflicts_with = "journal")]
    dry_run: bool,

    /// Driver id stamped on every created record
    #[arg(long, default_value_t = 1, env = "STOWAGE_DRIVER_ID")]
    driver_id: i64,

    /// Maximum bundles handled at once (overrides config)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct FailureRow<'a> {
    manifest: &'a str,
    bundle: Option<&'a str>,
    kind: &'static str,
    error: String,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    summary: ImportSummary,
    failures: Vec<FailureRow<'a>>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(report) if report.is_clean() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(EXIT_BUNDLE_FAILURES),
        Err(err) => {
            error!(error = %format!("{err:#}"), "import run failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stowage_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ImportReport> {
    let (mut config, source) = ConfigLoader::from_env(cli.config.clone())
        .load()
        .context("failed to load importer configuration")?;
    log_config_source(&source);
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }

    let store = LocalFolderStore::open(&cli.root)
        .await
        .with_context(|| format!("cannot open drive root {}", cli.root.display()))?;
    let driver = ImportDriver::new(DriverId(cli.driver_id), Arc::new(store));

    let (catalog, videos): (Arc<dyn Catalog>, Arc<dyn VideoService>) =
        match &cli.journal {
            Some(path) if !cli.dry_run => {
                let journal = Arc::new(
                    JournalCatalog::open(path).await.with_context(|| {
                        format!("cannot open journal {}", path.display())
                    })?,
                );
                info!(journal = %path.display(), "journaling catalog writes");
                (journal.clone(), journal)
            }
            _ => {
                info!("dry run, catalog writes stay in memory");
                let memory = Arc::new(MemoryCatalog::new());
                (memory.clone(), memory)
            }
        };

    let importer = BundleImporter::new(driver, catalog, videos, config)
        .context("failed to build importer")?;
    let report = importer
        .run(ScanMode::from_full(cli.full))
        .await
        .context("manifest discovery failed")?;

    print_report(&report, cli.json)?;
    Ok(report)
}

fn log_config_source(source: &ImporterConfigSource) {
    match source {
        ImporterConfigSource::Default => info!("using default importer config"),
        ImporterConfigSource::Flag(path) => {
            info!(path = %path.display(), "importer config loaded from --config")
        }
        ImporterConfigSource::EnvPath(path) => {
            info!(path = %path.display(), "importer config loaded from env path")
        }
        ImporterConfigSource::EnvInline => {
            info!("importer config loaded from inline environment json")
        }
        ImporterConfigSource::File(path) => {
            info!(path = %path.display(), "importer config loaded from file")
        }
    }
}

fn failure_rows(report: &ImportReport) -> Vec<FailureRow<'_>> {
    report
        .failed()
        .filter_map(|settlement| {
            settlement.error().map(|err| FailureRow {
                manifest: settlement.manifest_file.as_str(),
                bundle: settlement.bundle_hash.as_deref(),
                kind: err.kind(),
                error: err.to_string(),
            })
        })
        .collect()
}

fn print_report(report: &ImportReport, json: bool) -> anyhow::Result<()> {
    let summary = report.summary();
    let failures = failure_rows(report);

    if json {
        let rendered = serde_json::to_string_pretty(&JsonReport { summary, failures })
            .context("failed to render report")?;
        println!("{rendered}");
        return Ok(());
    }

    println!(
        "{} manifests: {} imported, {} skipped, {} failed ({} ms)",
        summary.discovered,
        summary.imported,
        summary.skipped,
        summary.failed,
        (summary.finished_at - summary.started_at).num_milliseconds()
    );
    for row in failures {
        println!(
            "  {} [{}] {}: {}",
            row.manifest,
            row.bundle.unwrap_or("-"),
            row.kind,
            row.error
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn parses_a_journaled_full_scan() {
        let cli = Cli::try_parse_from([
            "stowage",
            "--root",
            "/srv/drive",
            "--full",
            "--journal",
            "catalog.jsonl",
            "--driver-id",
            "4",
            "--concurrency",
            "2",
        ])
        .expect("valid args");

        assert_eq!(cli.root, PathBuf::from("/srv/drive"));
        assert!(cli.full);
        assert_eq!(cli.journal, Some(PathBuf::from("catalog.jsonl")));
        assert_eq!(cli.driver_id, 4);
        assert_eq!(cli.concurrency, Some(2));
        assert!(!cli.dry_run);
    }

    #[test]
    fn dry_run_needs_no_journal() {
        let cli = Cli::try_parse_from(["stowage", "--root", ".", "--dry-run"])
            .expect("valid args");
        assert!(cli.dry_run);
        assert_eq!(cli.journal, None);
        assert!(!cli.full);
    }

    #[test]
    fn journal_and_dry_run_conflict() {
        let err = Cli::try_parse_from([
            "stowage",
            "--root",
            ".",
            "--dry-run",
            "--journal",
            "x.jsonl",
        ])
        .expect_err("conflicting flags");
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn a_catalog_target_is_required() {
        let err = Cli::try_parse_from(["stowage", "--root", "."])
            .expect_err("missing journal");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }
}
