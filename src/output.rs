//! Output formatting utilities

use crate::async_differ::DiffType;
use crate::diff_iter::DiffRow;
use crate::error::Result;
use crate::partition::{DiffPartition, PartitionSet};
use crate::schema::{from_col_name, to_col_name, Schema, COMMIT_COLUMN};
use crate::super_schema::SuperSchema;
use crate::value::Value;
use serde_json::json;

/// Pretty printer for histdiff output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print the heading of one partition's changes
    pub fn print_partition_header(table: &str, partition: &DiffPartition) {
        println!(
            "🔍 {}: {} → {}",
            table,
            short_label(&partition.older_label),
            short_label(&partition.newer_label)
        );
    }

    /// Print one diff row as a block. `last` closes the partition's tree.
    pub fn print_diff_row(columns: &Schema, row: &DiffRow, last: bool) {
        let (prefix, child) = if last { ("└─", "   ") } else { ("├─", "│  ") };
        println!(
            "{} {} {} → {}",
            prefix,
            diff_marker(row.diff_type()),
            commit_label(row, &from_col_name(COMMIT_COLUMN)),
            commit_label(row, &to_col_name(COMMIT_COLUMN)),
        );

        let changes = Self::row_changes(columns, row);
        for (j, line) in changes.iter().enumerate() {
            let marker = if j == changes.len() - 1 { "└─" } else { "├─" };
            println!("{}{} {}", child, marker, line);
        }
    }

    pub fn print_diff_summary(table: &str, rows: usize, partitions: usize) {
        if rows == 0 {
            println!("✅ {}: no changes", table);
        } else {
            println!("📊 {}: {} changed rows across {} partitions", table, rows, partitions);
        }
    }

    fn row_changes(columns: &Schema, row: &DiffRow) -> Vec<String> {
        let mut lines = Vec::new();
        for col in columns.columns() {
            let to = row.get(&to_col_name(&col.name)).unwrap_or(&Value::Null);
            let from = row.get(&from_col_name(&col.name)).unwrap_or(&Value::Null);
            match row.diff_type() {
                DiffType::Added => lines.push(format!("{}: {}", col.name, format_value(to))),
                DiffType::Removed => lines.push(format!("{}: {}", col.name, format_value(from))),
                DiffType::Modified if col.is_key => {
                    lines.push(format!("{}: {}", col.name, format_value(to)))
                }
                DiffType::Modified if to != from => lines.push(format!(
                    "{}: '{}' → '{}'",
                    col.name,
                    format_value(from),
                    format_value(to)
                )),
                DiffType::Modified => {}
            }
        }
        lines
    }

    /// Print the partitions of a table's history, newest first
    pub fn print_partitions(table: &str, partitions: &PartitionSet) {
        if partitions.is_empty() {
            println!("✅ {}: no changes in range", table);
            return;
        }

        println!("📜 {}: {} partitions", table, partitions.len());
        for (i, p) in partitions.iter().enumerate() {
            let prefix = if i == partitions.len() - 1 { "└─" } else { "├─" };
            let date = p
                .newer_date
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| "uncommitted".to_string());
            println!(
                "{} {} → {} ({})",
                prefix,
                short_label(&p.older_label),
                short_label(&p.newer_label),
                date
            );
        }
    }

    /// Print the reconciled schema with every name each column has carried
    pub fn print_super_schema(table: &str, super_schema: &SuperSchema, generated: &Schema) {
        println!("🧬 {}: {} columns", table, generated.len());
        for (i, col) in generated.columns().iter().enumerate() {
            let prefix = if i == generated.len() - 1 { "└─" } else { "├─" };
            let mut flags = Vec::new();
            if col.is_key {
                flags.push("key");
            }
            if !col.nullable {
                flags.push("not null");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            println!("{} {} {} (tag {}){}", prefix, col.name, col.kind, col.tag, flags);

            let names = super_schema.all_names(col.tag);
            if names.len() > 1 {
                let child = if i == generated.len() - 1 { "   " } else { "│  " };
                println!("{}└─ also known as: {}", child, names.join(", "));
            }
        }
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }

    /// Format one diff row as a single-line object keyed by column name
    pub fn format_diff_row(row: &DiffRow) -> Result<String> {
        let object: serde_json::Map<String, serde_json::Value> = row
            .to_map()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value_to_json(value)))
            .collect();
        Ok(serde_json::to_string(&object)?)
    }

    pub fn format_partitions(partitions: &PartitionSet) -> Result<String> {
        let parts: Vec<serde_json::Value> = partitions
            .iter()
            .map(|p| {
                json!({
                    "from_commit": p.older_label,
                    "to_commit": p.newer_label,
                    "from_commit_date": p.older_date.map(|d| d.to_rfc3339()),
                    "to_commit_date": p.newer_date.map(|d| d.to_rfc3339()),
                    "from_exists": p.older.is_some(),
                    "to_exists": p.newer.is_some(),
                })
            })
            .collect();
        Self::format(&parts)
    }

    pub fn format_schema(generated: &Schema) -> Result<String> {
        Self::format(generated.columns())
    }
}

/// Render a value for display
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bytes(b) => format!("0x{}", hex(b)),
        other => other.to_string(),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Uint(u) => json!(u),
        Value::Float(f) => json!(f),
        Value::String(s) => json!(s),
        Value::Bytes(b) => json!(format!("0x{}", hex(b))),
        Value::Timestamp(t) => json!(t.to_rfc3339()),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn diff_marker(diff_type: DiffType) -> &'static str {
    match diff_type {
        DiffType::Added => "➕ added",
        DiffType::Modified => "✏️  modified",
        DiffType::Removed => "➖ removed",
    }
}

fn commit_label(row: &DiffRow, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => short_label(s),
        _ => "∅".to_string(),
    }
}

/// Commit hashes are shortened; labels such as WORKING are kept whole
fn short_label(label: &str) -> String {
    if label.len() == 64 && label.chars().all(|c| c.is_ascii_hexdigit()) {
        label[..8].to_string()
    } else {
        label.to_string()
    }
}
