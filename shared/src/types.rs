use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// A known service bound to a port.
/// This is the canonical data model used by the store, query engine, API and CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    /// Service name, e.g. "http"
    pub name: String,

    /// Port number
    pub port: u16,

    /// Transport protocol, e.g. "tcp", or a merged list such as "tcp, udp"
    pub protocol: String,

    /// Free text description, empty when the dataset has none
    #[serde(default)]
    pub description: String,
}

impl PortRecord {
    pub fn new(
        name: impl Into<String>,
        port: u16,
        protocol: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            port,
            protocol: protocol.into(),
            description: description.into(),
        }
    }
}

/// Summary of what the record store currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatus {
    /// Number of raw (unmerged) records
    pub records: u64,

    /// When the dataset was last bulk-loaded
    pub imported_at: Option<DateTime<Utc>>,

    /// File the dataset was loaded from
    pub source: Option<PathBuf>,
}
