// Metadata Store Abstraction
//
// Source of the declarative job definitions. The engine only ever
// reads whole tables; it never builds query text itself.

use std::fs;
use std::path::PathBuf;

use super::{MetadataError, MetadataRow};

/// Read-only access to the job metadata table.
///
/// Implementations must return every row of `table`. Ordering is
/// not required; the index sorts by job and step.
pub trait MetadataStore {
    fn fetch_all(&self, table: &str) -> Result<Vec<MetadataRow>, MetadataError>;
}

/// Metadata held in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMetadataStore {
    rows: Vec<MetadataRow>,
    unavailable: bool,
}

impl InMemoryMetadataStore {
    pub fn new(rows: Vec<MetadataRow>) -> Self {
        Self {
            rows,
            unavailable: false,
        }
    }

    /// A store that fails every fetch.
    pub fn unavailable() -> Self {
        Self {
            rows: Vec::new(),
            unavailable: true,
        }
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn fetch_all(&self, table: &str) -> Result<Vec<MetadataRow>, MetadataError> {
        if self.unavailable {
            return Err(MetadataError::Unavailable(format!("table `{table}` cannot be reached")));
        }
        Ok(self.rows.clone())
    }
}

/// Metadata exported as a JSON array of rows.
///
/// The table name is ignored; the file is the table.
#[derive(Debug, Clone)]
pub struct JsonFileMetadataStore {
    path: PathBuf,
}

impl JsonFileMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MetadataStore for JsonFileMetadataStore {
    fn fetch_all(&self, _table: &str) -> Result<Vec<MetadataRow>, MetadataError> {
        let data = fs::read_to_string(&self.path)?;
        serde_json::from_str(&data).map_err(|err| MetadataError::Malformed(err.to_string()))
    }
}
