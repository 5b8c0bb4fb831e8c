//! Error types for histdiff operations

use crate::value::ValueKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HistDiffError>;

#[derive(Error, Debug)]
pub enum HistDiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Table not found: {table}")]
    TableNotFound { table: String },

    #[error(
        "Schema conflict in table '{table}': tag {tag} ({column}) is {existing} but a historical schema declares it as {incoming}"
    )]
    SchemaConflict {
        table: String,
        tag: u64,
        column: String,
        existing: ValueKind,
        incoming: ValueKind,
    },

    #[error(
        "Cannot convert column '{column}' of table '{table}' from {from} to {to}{}",
        value_suffix(.value)
    )]
    TypeConversion {
        table: String,
        column: String,
        from: ValueKind,
        to: ValueKind,
        value: Option<String>,
    },

    #[error("Snapshot store error: {message}")]
    Store { message: String },

    #[error("Schema mismatch: {message}")]
    SchemaMismatch { message: String },

    #[error("Diff row iterator is closed")]
    IteratorClosed,

    #[error("Partition index {index} out of range (have {len})")]
    PartitionOutOfRange { index: usize, len: usize },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

fn value_suffix(value: &Option<String>) -> String {
    match value {
        Some(v) => format!(" (value {})", v),
        None => String::new(),
    }
}

impl HistDiffError {
    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store {
            message: msg.into(),
        }
    }

    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// Structural failures end the diff session for the affected table.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::TableNotFound { .. } | Self::SchemaConflict { .. } | Self::TypeConversion { .. }
        )
    }
}
