pub mod surreal;

pub use surreal::{flatten_result_groups, FetchError, SourceRecord, SurrealClient};
