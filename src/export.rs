//! CSV export of a projected view.

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::models::{join_list, FieldValue, Record, RecordKind};

pub const MISSING_VALUE: &str = "N/A";
pub const EXPORT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvExport {
    pub filename: String,
    pub content: String,
}

pub fn export_filename(kind: RecordKind, date: NaiveDate) -> String {
    format!("{}_export_{}.csv", kind.as_str(), date.format("%Y-%m-%d"))
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn render_cell(value: FieldValue<'_>) -> String {
    let text = match value {
        FieldValue::Text(s) => s.to_string(),
        FieldValue::List(items) => join_list(items),
        FieldValue::Flag(b) => b.to_string(),
        FieldValue::Timestamp(Some(at)) => at.format(EXPORT_DATE_FORMAT).to_string(),
        FieldValue::Timestamp(None) | FieldValue::Missing => String::new(),
    };
    if text.trim().is_empty() {
        quote(MISSING_VALUE)
    } else {
        quote(&text)
    }
}

/// Serializes `records` (already filtered and sorted) under the kind's fixed
/// header.
pub fn export_records<R: Record>(records: &[R], date: NaiveDate) -> CsvExport {
    let schema = R::KIND.schema();
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(schema.export_header.to_string());
    for record in records {
        let row: Vec<String> = schema
            .export_fields
            .iter()
            .map(|field| render_cell(record.field(field)))
            .collect();
        lines.push(row.join(","));
    }

    CsvExport {
        filename: export_filename(R::KIND, date),
        content: lines.join("\n"),
    }
}

pub fn export_today<R: Record>(records: &[R]) -> CsvExport {
    export_records(records, Utc::now().date_naive())
}
