//! One-shot migration of SurrealDB `wave_request` records into Postgres.
//!
//! Environment (all optional; `.env` is honored):
//! - SURREAL_URL, SURREAL_USER, SURREAL_PASS, SURREAL_NS, SURREAL_DB
//! - SURREAL_RESPONSE_SHAPE: `lenient` (default) skips malformed result-groups, `strict` fails
//! - PG_HOST, PG_PORT, PG_DB, PG_USER, PG_PASS
//!
//! Exits 1 when the SurrealDB query fails; no Postgres connection is made in that case.

use anyhow::Result;
use tracing::info;
use wave_migrate::pipeline;
use wave_migrate::util::env;
use wave_migrate::MigrateConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env::init_env();
    wave_migrate::tracing::init_tracing("info,tokio_postgres=warn")?;

    let cfg = MigrateConfig::from_env()?;
    info!(target: "preflight", snapshot = ?cfg.snapshot(), "configuration snapshot");

    match pipeline::run(&cfg).await {
        Ok(summary) => {
            info!(?summary, "sync_wave_request finished");
            Ok(())
        }
        Err(err) => {
            if let Some(msg) = pipeline::source_failure_message(&err) {
                println!("Error querying SurrealDB: {msg}");
                std::process::exit(1);
            }
            Err(err)
        }
    }
}
