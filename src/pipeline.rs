//! Fetch → Dedupe → Load → Merge → Cleanup.
//!
//! Every stage is a plain function over explicit inputs; `run` chains them and prints
//! the progress lines.
use anyhow::{Context, Result};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::{MigrateConfig, MigrationTarget};
use crate::database_ops::postgres::{self, LoadOutcome, StagingSql};
use crate::dedupe::{write_unique_rows, DedupeReport};
use crate::source::{FetchError, SourceRecord, SurrealClient};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub report: DedupeReport,
    pub staged: u64,
    pub inserted: u64,
}

/// Query SurrealDB for every record of the target type.
pub async fn fetch(cfg: &MigrateConfig) -> Result<Vec<SourceRecord>, FetchError> {
    let client = SurrealClient::new(&cfg.surreal)?;
    client.select_all(&cfg.target.record_type).await
}

/// Dedupe into a fresh temp CSV file. The file is deleted when the handle drops.
pub fn dedupe(
    records: &[SourceRecord],
    target: &MigrationTarget,
) -> Result<(NamedTempFile, DedupeReport)> {
    let mut buffer = tempfile::Builder::new()
        .prefix(&format!("{}_", target.record_type))
        .suffix(".csv")
        .tempfile()
        .context("create temp csv buffer")?;
    let report = write_unique_rows(records, &target.record_type, buffer.as_file_mut())?;
    Ok((buffer, report))
}

/// Connect, load staging and merge in one transaction, then close the session.
pub async fn load_and_merge(cfg: &MigrateConfig, buffer: &Path) -> Result<LoadOutcome> {
    let (mut client, conn_task) = postgres::connect(&cfg.pg).await?;
    let sql = StagingSql::new(&cfg.target);
    let outcome = postgres::load_and_merge(&mut client, &sql, buffer).await;

    drop(client);
    if let Err(e) = conn_task.await {
        warn!(error = %e, "postgres connection task did not shut down cleanly");
    }
    outcome
}

/// Delete the temp buffer, surfacing any I/O error.
pub fn cleanup(buffer: NamedTempFile) -> Result<()> {
    let path = buffer.path().to_path_buf();
    buffer
        .close()
        .with_context(|| format!("remove temp file {}", path.display()))?;
    debug!(path = %path.display(), "temp buffer removed");
    Ok(())
}

/// Text to print for a failed source query, if `err` is one.
pub fn source_failure_message(err: &anyhow::Error) -> Option<String> {
    match err.downcast_ref::<FetchError>()? {
        FetchError::Status { body, .. } => Some(body.clone()),
        other => Some(other.to_string()),
    }
}

pub async fn run(cfg: &MigrateConfig) -> Result<MigrationSummary> {
    let records = fetch(cfg).await?;
    println!("Fetched {} records from SurrealDB", records.len());

    let (buffer, report) = dedupe(&records, &cfg.target)?;
    drop(records);
    println!(
        "Prepared {} unique records, {} duplicates found",
        report.unique, report.duplicates
    );
    println!("Data written to temp file: {}", buffer.path().display());

    let outcome = load_and_merge(cfg, buffer.path()).await?;
    println!("Imported into PostgreSQL");

    cleanup(buffer)?;

    let summary = MigrationSummary {
        report,
        staged: outcome.staged,
        inserted: outcome.inserted,
    };
    info!(
        fetched = summary.report.fetched,
        unique = summary.report.unique,
        duplicates = summary.report.duplicates,
        staged = summary.staged,
        inserted = summary.inserted,
        "migration complete"
    );
    Ok(summary)
}
