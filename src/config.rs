//! Migration configuration, resolved once from the environment at startup.
use anyhow::{anyhow, Context, Result};
use std::fmt;

use crate::util::env::{env_opt, redact_value};

/// How strictly the SurrealDB response envelope is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseShape {
    /// Skip result-groups that are not `{"result": [...]}`.
    #[default]
    Lenient,
    /// Fail the fetch on any result-group that is not `{"result": [...]}`.
    Strict,
}

impl ResponseShape {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(anyhow!(
                "SURREAL_RESPONSE_SHAPE must be 'lenient' or 'strict', got '{other}'"
            )),
        }
    }
}

impl fmt::Display for ResponseShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lenient => f.write_str("lenient"),
            Self::Strict => f.write_str("strict"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurrealConfig {
    pub url: String,
    pub user: String,
    pub pass: String,
    pub namespace: String,
    pub database: String,
    pub shape: ResponseShape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl PgConfig {
    pub fn to_client_config(&self) -> tokio_postgres::Config {
        let mut cfg = tokio_postgres::Config::new();
        cfg.host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .password(&self.password)
            .application_name("sync_wave_request");
        cfg
    }
}

/// Which record type is read and which tables receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTarget {
    /// SurrealDB table selected from; also the record-id prefix.
    pub record_type: String,
    /// Destination table, `(id PRIMARY KEY, data)`.
    pub table: String,
    /// Scratch table created `LIKE` the destination; truncated, never dropped.
    pub staging: String,
}

impl Default for MigrationTarget {
    fn default() -> Self {
        Self {
            record_type: "wave_request".to_string(),
            table: "wave_request".to_string(),
            staging: "wave_request_staging".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateConfig {
    pub surreal: SurrealConfig,
    pub pg: PgConfig,
    pub target: MigrationTarget,
}

const SNAPSHOT_KEYS: [&str; 11] = [
    "SURREAL_URL",
    "SURREAL_USER",
    "SURREAL_PASS",
    "SURREAL_NS",
    "SURREAL_DB",
    "SURREAL_RESPONSE_SHAPE",
    "PG_HOST",
    "PG_PORT",
    "PG_DB",
    "PG_USER",
    "PG_PASS",
];

impl MigrateConfig {
    /// Build from the process environment (after `.env` loading).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_opt)
    }

    /// Build from an arbitrary key lookup; `None` or blank means "use the default".
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port_raw = get("PG_PORT", "5432");
        let port = port_raw
            .trim()
            .parse::<u16>()
            .with_context(|| format!("PG_PORT is not a valid port: '{port_raw}'"))?;
        let shape = ResponseShape::parse(&get("SURREAL_RESPONSE_SHAPE", "lenient"))?;

        Ok(Self {
            surreal: SurrealConfig {
                url: get("SURREAL_URL", "http://surrealdb:8000/sql"),
                user: get("SURREAL_USER", "root"),
                pass: get("SURREAL_PASS", "root"),
                namespace: get("SURREAL_NS", "seqera"),
                database: get("SURREAL_DB", "wave"),
                shape,
            },
            pg: PgConfig {
                host: get("PG_HOST", "postgres"),
                port,
                database: get("PG_DB", "wave"),
                user: get("PG_USER", "postgres"),
                password: get("PG_PASS", "postgres"),
            },
            target: MigrationTarget::default(),
        })
    }

    /// Resolved values keyed by their env names, secrets masked.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let values = [
            self.surreal.url.clone(),
            self.surreal.user.clone(),
            self.surreal.pass.clone(),
            self.surreal.namespace.clone(),
            self.surreal.database.clone(),
            self.surreal.shape.to_string(),
            self.pg.host.clone(),
            self.pg.port.to_string(),
            self.pg.database.clone(),
            self.pg.user.clone(),
            self.pg.password.clone(),
        ];
        SNAPSHOT_KEYS
            .iter()
            .zip(values.iter())
            .map(|(k, v)| (k.to_string(), redact_value(k, v)))
            .collect()
    }
}
