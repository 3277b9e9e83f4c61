use serde::Serialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Machine-readable wrapper printed for every command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub meta: EnvelopeMeta,
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<EnvelopeError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeMeta {
    pub request_id: String,
    pub command: &'static str,
    pub generated_at: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
}

impl Envelope {
    pub fn new(command: &'static str, data: Value, latency_ms: u64) -> Self {
        Self {
            meta: EnvelopeMeta {
                request_id: uuid::Uuid::new_v4().to_string(),
                command,
                generated_at: OffsetDateTime::now_utc()
                    .format(&Rfc3339)
                    .unwrap_or_else(|_| String::from("unknown")),
                latency_ms,
            },
            data,
            errors: Vec::new(),
        }
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors.push(EnvelopeError {
            code: code.into(),
            message: message.into(),
        });
        self
    }
}

pub fn render(envelope: &Envelope, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => print!("{}", render_table(envelope)),
    }

    Ok(())
}

fn render_table(envelope: &Envelope) -> String {
    let mut out = String::new();
    out.push_str(&format!("request_id  : {}\n", envelope.meta.request_id));
    out.push_str(&format!("command     : {}\n", envelope.meta.command));
    out.push_str(&format!("latency_ms  : {}\n", envelope.meta.latency_ms));

    match &envelope.data {
        Value::Object(fields) => {
            for (name, value) in fields {
                match value {
                    Value::Array(rows) => {
                        out.push_str(&format!("{name}:\n"));
                        out.push_str(&rows_table(rows));
                    }
                    other => out.push_str(&format!("{name:<12}: {}\n", scalar(other))),
                }
            }
        }
        Value::Array(rows) => out.push_str(&rows_table(rows)),
        other => out.push_str(&format!("{}\n", scalar(other))),
    }

    if !envelope.errors.is_empty() {
        out.push_str("errors:\n");
        for error in &envelope.errors {
            out.push_str(&format!("  - {}: {}\n", error.code, error.message));
        }
    }

    out
}

/// Aligned columns from an array of flat objects; keys of the first row are the header.
fn rows_table(rows: &[Value]) -> String {
    let Some(Value::Object(first)) = rows.first() else {
        return String::from("  (none)\n");
    };
    let columns: Vec<&String> = first.keys().collect();

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| row.get(column.as_str()).map(scalar).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            cells
                .iter()
                .map(|row| row[index].len())
                .chain(std::iter::once(column.len()))
                .max()
                .unwrap_or_default()
        })
        .collect();

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(column, width)| format!("{column:<width$}"))
        .collect();
    out.push_str(&format!("  {}\n", header.join("  ").trim_end()));
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(&format!("  {}\n", line.join("  ").trim_end()));
    }
    out
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Null => String::from("-"),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_envelope_omits_empty_errors() {
        let envelope = Envelope::new("summary", json!({ "symbols": [] }), 3);
        let value = serde_json::to_value(&envelope).expect("serialize");

        assert!(value.get("errors").is_none());
        assert_eq!(value["meta"]["command"], "summary");
        assert_eq!(value["meta"]["request_id"].as_str().map(str::len), Some(36));
    }

    #[test]
    fn table_lists_rows_with_aligned_columns() {
        let envelope = Envelope::new(
            "rsi",
            json!({
                "symbol": "AAPL",
                "points": [
                    { "close": 185.64, "date": "2024-01-02", "rsi": null },
                    { "close": 184.25, "date": "2024-01-03", "rsi": 42.5 }
                ]
            }),
            0,
        );

        let table = render_table(&envelope);

        assert!(table.contains("symbol      : AAPL"));
        assert!(table.contains("  close   date        rsi\n"));
        assert!(table.contains("  185.64  2024-01-02  -\n"));
        assert!(table.contains("  184.25  2024-01-03  42.5\n"));
    }

    #[test]
    fn table_reports_errors() {
        let envelope = Envelope::new("sync", json!({ "status": "failed" }), 0)
            .with_error("sync.api_error", "provider responded with status 500");

        let table = render_table(&envelope);

        assert!(table.contains("errors:\n  - sync.api_error: provider responded with status 500\n"));
    }

    #[test]
    fn empty_row_set_is_marked() {
        assert_eq!(rows_table(&[]), "  (none)\n");
    }
}
