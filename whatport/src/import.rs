//! Bulk loading of the port dataset from a local JSON file.
//!
//! Two layouts are accepted: a plain array of records, or a document-store
//! export shaped as `{ "<table>": { "<id>": record, ... } }`. Tables are read
//! in name order and rows in ascending numeric id order.

use std::path::Path;
use serde::Deserialize;
use serde_json::Value;
use shared::types::PortRecord;
use crate::error::{Result, StoreError};
use crate::store::db::PortDb;

#[derive(Deserialize)]
struct RawRecord {
    name: String,
    port: RawPort,
    protocol: String,
    /// Absent and null descriptions are both stored as ""
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for RawPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawPort::Number(n) => write!(f, "{}", n),
            RawPort::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Read and validate every record of a dataset file
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Vec<PortRecord>> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    parse_dataset(&contents)
}

/// Parse dataset JSON. Any invalid record fails the whole dataset.
pub fn parse_dataset(contents: &str) -> Result<Vec<PortRecord>> {
    let document: Value = serde_json::from_str(contents)?;

    let rows = match document {
        Value::Array(rows) => rows,
        Value::Object(tables) => {
            let mut rows = Vec::new();
            for (table, content) in tables {
                let Value::Object(table_rows) = content else {
                    return Err(StoreError::InvalidDataset(format!(
                        "table {:?} is not an object of records",
                        table
                    )));
                };
                let mut table_rows: Vec<(String, Value)> = table_rows.into_iter().collect();
                table_rows.sort_by_key(|(id, _)| id.parse::<u64>().unwrap_or(u64::MAX));
                rows.extend(table_rows.into_iter().map(|(_, row)| row));
            }
            rows
        }
        _ => {
            return Err(StoreError::InvalidDataset(
                "expected an array of records or an object of tables".to_string(),
            ))
        }
    };

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| to_record(index, row))
        .collect()
}

fn to_record(index: usize, row: Value) -> Result<PortRecord> {
    let raw: RawRecord = serde_json::from_value(row).map_err(|e| StoreError::InvalidRecord {
        index,
        message: e.to_string(),
    })?;

    let port = match &raw.port {
        RawPort::Number(n) => u16::try_from(*n).ok(),
        RawPort::Text(s) => s.trim().parse::<u16>().ok(),
    }
    .ok_or_else(|| StoreError::InvalidRecord {
        index,
        message: format!("port {} is not a number in 0-65535", raw.port),
    })?;

    Ok(PortRecord {
        name: raw.name,
        port,
        protocol: raw.protocol,
        description: raw.description.unwrap_or_default(),
    })
}

/// Load `path` into the store, replacing whatever it held
pub fn import_file(db: &mut PortDb, path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let records = load_dataset(path)?;
    let written = db.replace_all(&records, Some(path))?;
    tracing::info!("Imported {} records from {}", written, path.display());
    Ok(written)
}
