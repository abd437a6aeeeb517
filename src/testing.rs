//! Postgres fixtures for tests that need a live database.
//!
//! Those tests run only with `WAVE_MIGRATE_TEST_PG=1`; connection settings come from
//! the usual `PG_*` variables. Each test gets its own table pair.
use tokio_postgres::Client;

use crate::config::{MigrateConfig, MigrationTarget};
use crate::util::env::env_flag;

/// Config with a per-test table pair, or `None` when Postgres tests are disabled.
pub fn pg_config(test_name: &str) -> Option<MigrateConfig> {
    if !env_flag("WAVE_MIGRATE_TEST_PG", false) {
        eprintln!("skipping {test_name}: WAVE_MIGRATE_TEST_PG not set");
        return None;
    }
    let mut cfg = MigrateConfig::from_env().expect("test config");
    let table = format!("wave_request_t{}_{}", std::process::id(), test_name);
    cfg.target = MigrationTarget {
        record_type: "wave_request".to_string(),
        staging: format!("{table}_staging"),
        table,
    };
    Some(cfg)
}

pub async fn reset_tables(client: &Client, target: &MigrationTarget) {
    drop_tables(client, target).await;
    client
        .batch_execute(&format!(
            "CREATE TABLE \"{t}\" (id text PRIMARY KEY, data jsonb NOT NULL)",
            t = target.table
        ))
        .await
        .expect("create destination table");
}

pub async fn drop_tables(client: &Client, target: &MigrationTarget) {
    client
        .batch_execute(&format!(
            "DROP TABLE IF EXISTS \"{s}\"; DROP TABLE IF EXISTS \"{t}\";",
            s = target.staging,
            t = target.table
        ))
        .await
        .expect("drop test tables");
}

pub async fn destination_ids(client: &Client, target: &MigrationTarget) -> Vec<String> {
    client
        .query(
            format!("SELECT id FROM \"{}\" ORDER BY id", target.table).as_str(),
            &[],
        )
        .await
        .expect("select destination ids")
        .iter()
        .map(|row| row.get::<_, String>(0))
        .collect()
}
