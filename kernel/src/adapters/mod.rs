// Collaborator Interfaces
//
// Object storage, bulk loading and stored procedures are external
// systems. The engine talks to them only through these traits and
// converts every failure into a step outcome at the call site.

use serde::{Deserialize, Serialize};

use crate::metadata::config::{LoadOptions, WriteMode};
use crate::pattern::{self, Pattern};

pub mod memory;

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed: {reason}")]
pub struct CollaboratorError {
    pub operation: &'static str,
    pub reason: String,
}

impl CollaboratorError {
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}

/// A named object inside a bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Blob {
    pub bucket: String,
    pub name: String,
}

impl Blob {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    /// `bucket/name`, the form patterns are written against.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.bucket, self.name)
    }
}

pub trait ObjectStore {
    /// Every blob in `bucket`.
    fn list(&self, bucket: &str) -> Result<Vec<Blob>, CollaboratorError>;

    fn copy(
        &mut self,
        src_bucket: &str,
        src_name: &str,
        dst_bucket: &str,
        dst_name: &str,
    ) -> Result<(), CollaboratorError>;

    fn delete(&mut self, bucket: &str, name: &str) -> Result<(), CollaboratorError>;
}

/// A bulk load of files into a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadRequest {
    pub source_uri: String,
    pub table_id: String,
    pub options: LoadOptions,
    pub write_mode: WriteMode,
}

pub trait BulkLoader {
    fn load(&mut self, request: &LoadRequest) -> Result<(), CollaboratorError>;

    /// Stamp `request_id` on the rows of `table_id` that the last load
    /// inserted (rows with no request id yet).
    fn tag_request_id(&mut self, table_id: &str, request_id: &str) -> Result<(), CollaboratorError>;
}

pub trait ProcedureRunner {
    /// Invoke a stored procedure. An empty return message means success.
    fn call(
        &mut self,
        procedure: &str,
        request_id: &str,
        load_mode: &str,
        configuration: &str,
    ) -> Result<String, CollaboratorError>;
}

/// Blobs matching a `<bucket>/<pattern>` source name.
///
/// A source name without `/` names a bucket and matches all of it.
pub fn matching_blobs(
    store: &dyn ObjectStore,
    source_name: &str,
) -> Result<Vec<Blob>, CollaboratorError> {
    let (bucket, search) = source_name.split_once('/').unwrap_or((source_name, ""));
    let search = Pattern::new(search);

    Ok(store
        .list(bucket)?
        .into_iter()
        .filter(|blob| search.is_match(&blob.name))
        .collect())
}

/// Where an archived blob goes.
///
/// `target` is `[gs://]bucket[/folder...]`; the blob keeps its base
/// filename under the folder prefix.
pub fn archive_destination(source_name: &str, target: &str) -> (String, String) {
    let target = target
        .strip_prefix("GS://")
        .or_else(|| target.strip_prefix("gs://"))
        .unwrap_or(target);
    let file = pattern::file_name(source_name);

    match target.split_once('/') {
        Some((bucket, prefix)) => (bucket.to_string(), format!("{prefix}/{file}")),
        None => (target.to_string(), file.to_string()),
    }
}
