//! Staging-table bulk load and conflict-ignoring merge into the destination table.
//!
//! - Staging is created `LIKE` the destination, truncated, then filled via
//!   `COPY ... FROM STDIN` (CSV) streamed from the on-disk buffer.
//! - The merge inserts distinct staging rows and skips ids already present.
//! - Both steps share one transaction; it is committed only if both succeed and
//!   rolled back explicitly otherwise.

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::SinkExt;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, CopyInSink, NoTls, Transaction};
use tracing::{error, info, warn};

use crate::config::{MigrationTarget, PgConfig};

const COPY_CHUNK_BYTES: usize = 64 * 1024;

/// Open a plaintext connection and spawn its driver task.
///
/// Drop the client and await the handle to close the session.
pub async fn connect(cfg: &PgConfig) -> Result<(Client, JoinHandle<()>)> {
    let (client, conn) = cfg
        .to_client_config()
        .connect(NoTls)
        .await
        .with_context(|| {
            format!(
                "connect postgres at {}:{}/{} as {}",
                cfg.host, cfg.port, cfg.database, cfg.user
            )
        })?;
    let handle = tokio::spawn(async move {
        if let Err(e) = conn.await {
            error!(error = %e, "postgres connection error");
        }
    });
    info!(host = %cfg.host, port = cfg.port, db = %cfg.database, "connected to postgres");
    Ok((client, handle))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQL for one destination/staging table pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingSql {
    table: String,
    staging: String,
}

impl StagingSql {
    pub fn new(target: &MigrationTarget) -> Self {
        Self {
            table: quote_ident(&target.table),
            staging: quote_ident(&target.staging),
        }
    }

    pub fn creates(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {s} (LIKE {t} INCLUDING ALL)",
            s = self.staging,
            t = self.table
        )
    }

    pub fn truncates(&self) -> String {
        format!("TRUNCATE {s}", s = self.staging)
    }

    pub fn copy(&self) -> String {
        format!("COPY {s} (id, data) FROM STDIN WITH (FORMAT csv)", s = self.staging)
    }

    pub fn merges(&self) -> String {
        format!(
            "INSERT INTO {t} (id, data) \
             SELECT DISTINCT id, data FROM {s} \
             ON CONFLICT (id) DO NOTHING",
            t = self.table,
            s = self.staging
        )
    }
}

/// Rows written by one load + merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    pub staged: u64,
    pub inserted: u64,
}

/// Ensure and truncate staging, then stream `buffer` into it with COPY.
///
/// The file handle and the COPY sink live only for the duration of this call.
pub async fn load_staging(tx: &Transaction<'_>, sql: &StagingSql, buffer: &Path) -> Result<u64> {
    tx.batch_execute(&format!("{};\n{};", sql.creates(), sql.truncates()))
        .await
        .context("prepare staging table")?;

    let mut file = tokio::fs::File::open(buffer)
        .await
        .with_context(|| format!("open csv buffer {}", buffer.display()))?;

    let copy_stmt = sql.copy();
    let sink: CopyInSink<Bytes> = tx
        .copy_in(copy_stmt.as_str())
        .await
        .context("start COPY into staging")?;
    tokio::pin!(sink);

    let mut chunk = vec![0u8; COPY_CHUNK_BYTES];
    loop {
        let n = file.read(&mut chunk).await.context("read csv buffer")?;
        if n == 0 {
            break;
        }
        sink.send(Bytes::copy_from_slice(&chunk[..n]))
            .await
            .context("stream csv into COPY")?;
    }
    let copied = sink.finish().await.context("finish COPY into staging")?;
    info!(rows = copied, "staging table loaded");
    Ok(copied)
}

/// Insert staging rows whose id is not yet in the destination. Returns rows inserted.
pub async fn merge_staging(tx: &Transaction<'_>, sql: &StagingSql) -> Result<u64> {
    let merge_stmt = sql.merges();
    let inserted = tx
        .execute(merge_stmt.as_str(), &[])
        .await
        .context("merge staging into destination")?;
    info!(rows = inserted, "destination merge complete");
    Ok(inserted)
}

/// Load then merge inside a single transaction.
pub async fn load_and_merge(
    client: &mut Client,
    sql: &StagingSql,
    buffer: &Path,
) -> Result<LoadOutcome> {
    let tx = client.transaction().await.context("begin transaction")?;

    let outcome = async {
        let staged = load_staging(&tx, sql, buffer).await?;
        let inserted = merge_staging(&tx, sql).await?;
        Ok::<_, anyhow::Error>(LoadOutcome { staged, inserted })
    }
    .await;

    match outcome {
        Ok(outcome) => {
            tx.commit().await.context("commit transaction")?;
            Ok(outcome)
        }
        Err(err) => {
            if let Err(rb) = tx.rollback().await {
                warn!(error = %rb, "rollback after failed load failed");
            } else {
                warn!(error = %err, "load failed; transaction rolled back");
            }
            Err(err)
        }
    }
}
