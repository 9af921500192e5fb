// Execution Context
//
// Everything a run needs, constructed once and passed down
// explicitly: configuration, collaborator handles and the audit
// logger.

use crate::adapters::{BulkLoader, ObjectStore, ProcedureRunner};
use crate::audit::{local_request_id, AuditLogger, AuditSink};
use crate::config::EngineConfig;
use crate::metadata::MetadataStore;

pub struct ExecutionContext<'a> {
    pub config: EngineConfig,
    pub metadata: &'a dyn MetadataStore,
    pub objects: &'a mut dyn ObjectStore,
    pub loader: &'a mut dyn BulkLoader,
    pub procedures: &'a mut dyn ProcedureRunner,
    pub audit: AuditLogger<'a>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        config: EngineConfig,
        metadata: &'a dyn MetadataStore,
        objects: &'a mut dyn ObjectStore,
        loader: &'a mut dyn BulkLoader,
        procedures: &'a mut dyn ProcedureRunner,
        sink: &'a mut dyn AuditSink,
    ) -> Self {
        let audit = AuditLogger::new(sink, config.execution_log_table.clone(), config.log_interval());
        Self {
            config,
            metadata,
            objects,
            loader,
            procedures,
            audit,
        }
    }

    /// Fresh request id from the local clock.
    pub fn request_id(&self) -> String {
        local_request_id(self.config.local_tz)
    }
}
