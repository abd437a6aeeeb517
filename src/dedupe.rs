//! First-wins deduplication by normalized record id, written straight to CSV.
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::io::Write;

use crate::normalization::normalize_record_id;
use crate::source::SourceRecord;

/// `(id, payload)` pair ready for `COPY ... WITH CSV`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    pub id: String,
    pub payload: String,
}

impl NormalizedRow {
    /// Normalize the record id and serialize the full record as compact JSON.
    pub fn from_record(record: &SourceRecord, table: &str) -> Result<Self> {
        let raw_id = match record.get("id") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        let id = normalize_record_id(&raw_id, table).to_string();
        let payload = serde_json::to_string(record).context("serialize record payload")?;
        Ok(Self { id, payload })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupeReport {
    pub fetched: usize,
    pub unique: usize,
    pub duplicates: usize,
}

fn csv_writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out)
}

/// Write one `id,"payload"` line per first occurrence of each normalized id.
///
/// Records are visited in the order given; a later record with an id already seen is
/// counted as a duplicate and dropped regardless of its content.
pub fn write_unique_rows<W: Write>(
    records: &[SourceRecord],
    table: &str,
    out: W,
) -> Result<DedupeReport> {
    let mut writer = csv_writer(out);
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    let mut report = DedupeReport {
        fetched: records.len(),
        ..DedupeReport::default()
    };

    for record in records {
        let row = NormalizedRow::from_record(record, table)?;
        if !seen.insert(row.id.clone()) {
            report.duplicates += 1;
            continue;
        }
        writer
            .write_record([row.id.as_str(), row.payload.as_str()])
            .with_context(|| format!("write csv row for id {}", row.id))?;
    }
    writer.flush().context("flush csv buffer")?;

    report.unique = seen.len();
    Ok(report)
}
