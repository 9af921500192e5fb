// Shared test fixtures: in-memory collaborators with zero delays.

use uuid::Uuid;

use crate::adapters::memory::{InMemoryBulkLoader, InMemoryObjectStore, InMemoryProcedureRunner};
use crate::adapters::Blob;
use crate::audit::{InMemoryAuditSink, LogRecord};
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::metadata::store::InMemoryMetadataStore;
use crate::metadata::MetadataRow;

pub struct Harness {
    pub config: EngineConfig,
    pub metadata: InMemoryMetadataStore,
    pub objects: InMemoryObjectStore,
    pub loader: InMemoryBulkLoader,
    pub procedures: InMemoryProcedureRunner,
    pub sink: InMemoryAuditSink,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            config: EngineConfig {
                check_delay_secs: 0,
                log_interval_ms: 0,
                ..EngineConfig::default()
            },
            metadata: InMemoryMetadataStore::default(),
            objects: InMemoryObjectStore::default(),
            loader: InMemoryBulkLoader::default(),
            procedures: InMemoryProcedureRunner::default(),
            sink: InMemoryAuditSink::new(),
        }
    }
}

impl Harness {
    /// Blobs given as `bucket/name`.
    pub fn with_blobs(paths: &[&str]) -> Self {
        let mut harness = Self::default();
        for path in paths {
            let (bucket, name) = path.split_once('/').unwrap();
            harness.objects.insert(Blob::new(bucket, name));
        }
        harness
    }

    pub fn context(&mut self) -> ExecutionContext<'_> {
        ExecutionContext::new(
            self.config.clone(),
            &self.metadata,
            &mut self.objects,
            &mut self.loader,
            &mut self.procedures,
            &mut self.sink,
        )
    }
}

pub fn job_record() -> LogRecord {
    let trigger = MetadataRow {
        job_name: "SALES".into(),
        job_version: "1".into(),
        control_flag: "TRIGGER".into(),
        source_name: "landing/sales*".into(),
        ..MetadataRow::default()
    };
    LogRecord::job(Uuid::new_v4(), "2024-01-01T09:00:00".into(), &trigger)
}

pub fn summary(harness: &Harness) -> Vec<(&'static str, &'static str, &str)> {
    harness.sink.summary()
}
