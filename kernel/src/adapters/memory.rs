// In-Memory Collaborators
//
// Deterministic stand-ins for object storage, the bulk loader and
// the procedure runner. Used by tests and by the CLI dry run.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::{Blob, BulkLoader, CollaboratorError, LoadRequest, ObjectStore, ProcedureRunner};

#[derive(Debug, Default, Clone)]
pub struct InMemoryObjectStore {
    blobs: BTreeSet<Blob>,
    failing: BTreeSet<Blob>,
    unavailable: bool,
}

impl InMemoryObjectStore {
    pub fn with_blobs(blobs: impl IntoIterator<Item = Blob>) -> Self {
        Self {
            blobs: blobs.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn insert(&mut self, blob: Blob) {
        self.blobs.insert(blob);
    }

    /// Make every copy or delete of `blob` fail.
    pub fn fail_on(&mut self, blob: Blob) {
        self.failing.insert(blob);
    }

    /// Make listing fail.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    pub fn blobs(&self) -> impl Iterator<Item = &Blob> {
        self.blobs.iter()
    }

    pub fn contains(&self, bucket: &str, name: &str) -> bool {
        self.blobs.contains(&Blob::new(bucket, name))
    }

    fn check(&self, operation: &'static str, blob: &Blob) -> Result<(), CollaboratorError> {
        if self.failing.contains(blob) {
            return Err(CollaboratorError::new(operation, format!("{} is locked", blob.full_name())));
        }
        if !self.blobs.contains(blob) {
            return Err(CollaboratorError::new(operation, format!("{} not found", blob.full_name())));
        }
        Ok(())
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn list(&self, bucket: &str) -> Result<Vec<Blob>, CollaboratorError> {
        if self.unavailable {
            return Err(CollaboratorError::new("list", format!("bucket {bucket} unreachable")));
        }
        Ok(self.blobs.iter().filter(|b| b.bucket == bucket).cloned().collect())
    }

    fn copy(
        &mut self,
        src_bucket: &str,
        src_name: &str,
        dst_bucket: &str,
        dst_name: &str,
    ) -> Result<(), CollaboratorError> {
        self.check("copy", &Blob::new(src_bucket, src_name))?;
        self.blobs.insert(Blob::new(dst_bucket, dst_name));
        Ok(())
    }

    fn delete(&mut self, bucket: &str, name: &str) -> Result<(), CollaboratorError> {
        let blob = Blob::new(bucket, name);
        self.check("delete", &blob)?;
        self.blobs.remove(&blob);
        Ok(())
    }
}

/// Records load requests and lineage tags.
#[derive(Debug, Default, Clone, Serialize)]
pub struct InMemoryBulkLoader {
    pub loads: Vec<LoadRequest>,
    pub tags: Vec<(String, String)>,
    #[serde(skip)]
    fail_loads: bool,
    #[serde(skip)]
    fail_tags: bool,
}

impl InMemoryBulkLoader {
    pub fn failing() -> Self {
        Self {
            fail_loads: true,
            ..Self::default()
        }
    }

    pub fn failing_tags() -> Self {
        Self {
            fail_tags: true,
            ..Self::default()
        }
    }
}

impl BulkLoader for InMemoryBulkLoader {
    fn load(&mut self, request: &LoadRequest) -> Result<(), CollaboratorError> {
        if self.fail_loads {
            return Err(CollaboratorError::new("load", format!("job for {} rejected", request.table_id)));
        }
        self.loads.push(request.clone());
        Ok(())
    }

    fn tag_request_id(&mut self, table_id: &str, request_id: &str) -> Result<(), CollaboratorError> {
        if self.fail_tags {
            return Err(CollaboratorError::new("tag", format!("{table_id} has no REQUEST_ID column")));
        }
        self.tags.push((table_id.to_string(), request_id.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcedureCall {
    pub procedure: String,
    pub request_id: String,
    pub load_mode: String,
    pub configuration: String,
}

/// Procedures with scripted return messages.
///
/// Calling a procedure that was never scripted is an invocation error.
#[derive(Debug, Default, Clone, Serialize)]
pub struct InMemoryProcedureRunner {
    #[serde(skip)]
    returns: BTreeMap<String, String>,
    pub calls: Vec<ProcedureCall>,
}

impl InMemoryProcedureRunner {
    pub fn new(returns: BTreeMap<String, String>) -> Self {
        Self {
            returns,
            calls: Vec::new(),
        }
    }

    pub fn script(&mut self, procedure: impl Into<String>, message: impl Into<String>) {
        self.returns.insert(procedure.into(), message.into());
    }
}

impl ProcedureRunner for InMemoryProcedureRunner {
    fn call(
        &mut self,
        procedure: &str,
        request_id: &str,
        load_mode: &str,
        configuration: &str,
    ) -> Result<String, CollaboratorError> {
        self.calls.push(ProcedureCall {
            procedure: procedure.to_string(),
            request_id: request_id.to_string(),
            load_mode: load_mode.to_string(),
            configuration: configuration.to_string(),
        });

        self.returns
            .get(procedure)
            .cloned()
            .ok_or_else(|| CollaboratorError::new("call", format!("procedure {procedure} does not exist")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_then_delete_moves_blob() {
        let mut store = InMemoryObjectStore::with_blobs([Blob::new("landing", "a.csv")]);

        store.copy("landing", "a.csv", "archive", "old/a.csv").unwrap();
        store.delete("landing", "a.csv").unwrap();

        assert!(store.contains("archive", "old/a.csv"));
        assert!(!store.contains("landing", "a.csv"));
    }

    #[test]
    fn failing_blob_rejects_operations() {
        let blob = Blob::new("landing", "a.csv");
        let mut store = InMemoryObjectStore::with_blobs([blob.clone()]);
        store.fail_on(blob);

        assert!(store.delete("landing", "a.csv").is_err());
        assert!(store.contains("landing", "a.csv"));
    }

    #[test]
    fn unscripted_procedure_errors() {
        let mut runner = InMemoryProcedureRunner::default();
        runner.script("SP_OK", "");

        assert_eq!(runner.call("SP_OK", "r", "FULL", "").unwrap(), "");
        assert!(runner.call("SP_MISSING", "r", "FULL", "").is_err());
        assert_eq!(runner.calls.len(), 2);
    }
}
