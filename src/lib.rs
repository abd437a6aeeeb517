pub mod config;
pub mod database_ops;
pub mod dedupe;
pub mod normalization;
pub mod pipeline;
pub mod source;
pub mod tracing;

pub mod util {
    pub mod env;
}

#[cfg(test)]
pub(crate) mod testing;

pub use config::MigrateConfig;
pub use pipeline::{run, MigrationSummary};
