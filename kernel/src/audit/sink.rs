// Audit Sink Abstraction
//
// Durable destination of the execution log. The engine treats it as
// fire-and-forget: a failed append is reported operationally and
// never fails the step it describes.

use super::LogRecord;
use crate::adapters::CollaboratorError;

/// Append-only storage for audit records.
///
/// Implementations MUST NOT:
/// - Reorder records
/// - Mutate records already appended
pub trait AuditSink {
    fn append(&mut self, table: &str, record: &LogRecord) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditSink {
    records: Vec<LogRecord>,
    failing: bool,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every append.
    pub fn failing() -> Self {
        Self {
            records: Vec::new(),
            failing: true,
        }
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// `(event, status, message)` triples, the shape most tests assert on.
    pub fn summary(&self) -> Vec<(&'static str, &'static str, &str)> {
        self.records
            .iter()
            .map(|r| {
                (
                    r.request_log_event.as_str(),
                    r.status.as_str(),
                    r.log_message.as_str(),
                )
            })
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn append(&mut self, table: &str, record: &LogRecord) -> Result<(), CollaboratorError> {
        if self.failing {
            return Err(CollaboratorError::new("insert", format!("{table} is read-only")));
        }
        self.records.push(record.clone());
        Ok(())
    }
}
