use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ResponseShape, SurrealConfig};

/// One document as returned by SurrealDB.
pub type SourceRecord = Map<String, Value>;

fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// Anything but 200 from the `/sql` endpoint. Not retried.
    #[error("SurrealDB query failed with status {status}")]
    Status { status: StatusCode, body: String },
    #[error("SurrealDB request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("SurrealDB response is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("unexpected SurrealDB response shape: {0}")]
    Shape(String),
}

/// Minimal client for SurrealDB's HTTP `/sql` endpoint.
#[derive(Debug, Clone)]
pub struct SurrealClient {
    url: String,
    user: String,
    pass: String,
    namespace: String,
    database: String,
    shape: ResponseShape,
    http: Client,
}

impl SurrealClient {
    pub fn new(cfg: &SurrealConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!("wave-migrate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            url: cfg.url.clone(),
            user: cfg.user.clone(),
            pass: cfg.pass.clone(),
            namespace: cfg.namespace.clone(),
            database: cfg.database.clone(),
            shape: cfg.shape,
            http,
        })
    }

    pub fn select_all_query(record_type: &str) -> String {
        format!("SELECT * FROM {record_type};")
    }

    /// Fetch every record of `record_type`, flattened across result-groups.
    pub async fn select_all(&self, record_type: &str) -> Result<Vec<SourceRecord>, FetchError> {
        let query = Self::select_all_query(record_type);
        debug!(url = %self.url, ns = %self.namespace, db = %self.database, %query, "querying SurrealDB");

        let resp = self
            .http
            .post(&self.url)
            .header("NS", &self.namespace)
            .header("DB", &self.database)
            .header("Accept", "application/json")
            .header("Content-Type", "application/sql")
            .basic_auth(&self.user, Some(&self.pass))
            .body(query)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if status != StatusCode::OK {
            warn!(%status, body = %truncate_for_log(&body, 2000), "SurrealDB query failed");
            return Err(FetchError::Status { status, body });
        }

        let value: Value = serde_json::from_str(&body).map_err(FetchError::Decode)?;
        let records = flatten_result_groups(value, self.shape)?;
        info!(count = records.len(), shape = %self.shape, "SurrealDB records fetched");
        Ok(records)
    }
}

/// Concatenate the `result` arrays of every result-group, in order.
///
/// Lenient mode skips groups that are not `{"result": [...]}`; strict mode rejects them.
/// Items inside a `result` array must be objects in either mode.
pub fn flatten_result_groups(
    value: Value,
    shape: ResponseShape,
) -> Result<Vec<SourceRecord>, FetchError> {
    let groups = match value {
        Value::Array(groups) => groups,
        other => {
            let msg = format!("expected an array of result-groups, got {}", value_kind(&other));
            return match shape {
                ResponseShape::Strict => Err(FetchError::Shape(msg)),
                ResponseShape::Lenient => {
                    warn!("{msg}; treating as empty");
                    Ok(Vec::new())
                }
            };
        }
    };

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (idx, group) in groups.into_iter().enumerate() {
        let mismatch = match group {
            Value::Object(mut obj) => match obj.remove("result") {
                Some(Value::Array(items)) => {
                    for (n, item) in items.into_iter().enumerate() {
                        match item {
                            Value::Object(rec) => records.push(rec),
                            other => {
                                return Err(FetchError::Shape(format!(
                                    "result-group {idx} item {n} is {}, expected an object",
                                    value_kind(&other)
                                )))
                            }
                        }
                    }
                    continue;
                }
                Some(Value::String(msg)) => {
                    let status = obj
                        .get("status")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    format!("result-group {idx} has status {status}: {msg}")
                }
                Some(other) => format!(
                    "result-group {idx} has {} as result, expected an array",
                    value_kind(&other)
                ),
                None => format!("result-group {idx} has no result field"),
            },
            other => format!("result-group {idx} is {}", value_kind(&other)),
        };

        match shape {
            ResponseShape::Strict => return Err(FetchError::Shape(mismatch)),
            ResponseShape::Lenient => {
                debug!("{mismatch}; skipped");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, "ignored result-groups without a result array");
    }
    Ok(records)
}
