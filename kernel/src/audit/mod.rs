// Execution Audit Log
//
// One record per step lifecycle transition. Records are snapshots:
// the logger stamps its own copy and the sink only ever sees
// finished values, in sequence order.

use std::fmt;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metadata::MetadataRow;

pub mod sink;

pub use sink::{AuditSink, InMemoryAuditSink};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEvent {
    #[serde(rename = "START")]
    Start,
    #[serde(rename = "END")]
    End,
    #[serde(rename = "JOB START")]
    JobStart,
    #[serde(rename = "JOB END")]
    JobEnd,
}

impl LogEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            LogEvent::Start => "START",
            LogEvent::End => "END",
            LogEvent::JobStart => "JOB START",
            LogEvent::JobEnd => "JOB END",
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogStatus {
    Info,
    Error,
}

impl LogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LogStatus::Info => "INFO",
            LogStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the execution log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LogRecord {
    pub log_uuid: Uuid,
    pub sequence: u64,
    pub job_instance: Uuid,
    pub log_timestamp: String,
    pub request_log_event: LogEvent,
    pub request_id: String,
    pub job_name: String,
    pub job_version: String,
    pub step: i64,
    pub step_name: String,
    pub status: LogStatus,
    #[serde(rename = "TYPE")]
    pub step_type: String,
    pub subtype: String,
    pub control_flag: String,
    pub load_mode: String,
    pub configuration: String,
    pub source_type: String,
    pub source_name: String,
    pub target_type: String,
    pub target_name: String,
    pub log_message: String,
    pub log_user: String,
}

impl LogRecord {
    /// Job-level record describing the trigger that started a run.
    pub fn job(job_instance: Uuid, request_id: String, trigger: &MetadataRow) -> Self {
        Self {
            log_uuid: Uuid::nil(),
            sequence: 0,
            job_instance,
            log_timestamp: String::new(),
            request_log_event: LogEvent::JobStart,
            request_id,
            job_name: trigger.job_name.clone(),
            job_version: trigger.job_version.clone(),
            step: trigger.step,
            step_name: String::new(),
            status: LogStatus::Info,
            step_type: String::new(),
            subtype: String::new(),
            control_flag: String::new(),
            load_mode: String::new(),
            configuration: String::new(),
            source_type: String::new(),
            source_name: trigger.source_name.clone(),
            target_type: String::new(),
            target_name: String::new(),
            log_message: String::new(),
            log_user: String::new(),
        }
    }

    /// Copy of a job record describing one step.
    pub fn for_step(&self, row: &MetadataRow, request_id: String) -> Self {
        Self {
            request_id,
            step: row.step,
            step_name: row.step_name.clone(),
            step_type: row.step_type.clone(),
            subtype: row.subtype.clone(),
            control_flag: row.control_flag.clone(),
            load_mode: row.load_mode.clone(),
            configuration: row.configuration.clone(),
            source_type: row.source_type.clone(),
            source_name: row.source_name.clone(),
            target_type: row.target_type.clone(),
            target_name: row.target_name.clone(),
            log_message: String::new(),
            ..self.clone()
        }
    }

    pub fn mark(&mut self, event: LogEvent, status: LogStatus, message: impl Into<String>) {
        self.request_log_event = event;
        self.status = status;
        self.log_message = message.into();
    }
}

/// UTC wall clock in log timestamp format.
pub fn utc_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Local wall clock in log timestamp format, used as a request id.
pub fn local_request_id(tz: Tz) -> String {
    request_id_at(Utc::now(), tz)
}

/// Request id for `instant` on the wall clock of `tz`, daylight saving included.
pub fn request_id_at(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format(TIMESTAMP_FORMAT).to_string()
}

/// Writes audit records to a sink, best effort.
///
/// Every record gets a fresh UUID, the current UTC timestamp and the
/// next sequence number. A non-zero `interval` is slept before each
/// write so consecutive records differ at one-second granularity.
pub struct AuditLogger<'a> {
    sink: &'a mut dyn AuditSink,
    table: String,
    interval: Duration,
    sequence: u64,
}

impl<'a> AuditLogger<'a> {
    pub fn new(sink: &'a mut dyn AuditSink, table: impl Into<String>, interval: Duration) -> Self {
        Self {
            sink,
            table: table.into(),
            interval,
            sequence: 0,
        }
    }

    pub fn write(&mut self, record: &LogRecord) {
        if !self.interval.is_zero() {
            thread::sleep(self.interval);
        }

        self.sequence += 1;
        let stamped = LogRecord {
            log_uuid: Uuid::new_v4(),
            sequence: self.sequence,
            log_timestamp: utc_timestamp(),
            ..record.clone()
        };

        tracing::debug!(
            table = %self.table,
            sequence = stamped.sequence,
            event = %stamped.request_log_event,
            status = %stamped.status,
            log_message = %stamped.log_message,
            "audit record"
        );

        if let Err(err) = self.sink.append(&self.table, &stamped) {
            tracing::error!(
                table = %self.table,
                job = %stamped.job_name,
                step = stamped.step,
                error = %err,
                "error writing execution log"
            );
        }
    }

    /// Number of records written so far, including failed appends.
    pub fn written(&self) -> u64 {
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger() -> MetadataRow {
        MetadataRow {
            job_name: "SALES".into(),
            job_version: "3".into(),
            step: 0,
            control_flag: "TRIGGER".into(),
            source_name: "landing/sales*".into(),
            ..MetadataRow::default()
        }
    }

    #[test]
    fn records_are_sequenced_and_stamped() {
        let mut sink = InMemoryAuditSink::new();
        let job = LogRecord::job(Uuid::new_v4(), "2024-01-01T10:00:00".into(), &trigger());

        {
            let mut logger = AuditLogger::new(&mut sink, "LOG", Duration::ZERO);
            logger.write(&job);
            logger.write(&job);
            assert_eq!(logger.written(), 2);
        }

        let records = sink.records();
        assert_eq!(records[0].sequence, 1);
        assert_eq!(records[1].sequence, 2);
        assert_ne!(records[0].log_uuid, records[1].log_uuid);
        assert!(!records[0].log_timestamp.is_empty());
    }

    #[test]
    fn sink_failure_is_swallowed() {
        let mut sink = InMemoryAuditSink::failing();
        let job = LogRecord::job(Uuid::new_v4(), String::new(), &trigger());

        let mut logger = AuditLogger::new(&mut sink, "LOG", Duration::ZERO);
        logger.write(&job);
        assert_eq!(logger.written(), 1);
    }

    #[test]
    fn step_record_takes_row_descriptor() {
        let job = LogRecord::job(Uuid::new_v4(), "job-req".into(), &trigger());
        let row = MetadataRow {
            job_name: "SALES".into(),
            step: 2,
            step_name: "LOAD_SALES".into(),
            step_type: "FILE".into(),
            subtype: "LOAD".into(),
            target_name: "STG.SALES".into(),
            ..MetadataRow::default()
        };

        let record = job.for_step(&row, "step-req".into());

        assert_eq!(record.job_instance, job.job_instance);
        assert_eq!(record.request_id, "step-req");
        assert_eq!(record.step, 2);
        assert_eq!(record.step_type, "FILE");
        assert_eq!(record.target_name, "STG.SALES");
    }

    #[test]
    fn request_id_follows_sydney_daylight_saving() {
        let summer: DateTime<Utc> = "2025-01-15T00:00:00Z".parse().unwrap();
        let winter: DateTime<Utc> = "2025-07-15T00:00:00Z".parse().unwrap();

        assert_eq!(request_id_at(summer, chrono_tz::Australia::Sydney), "2025-01-15T11:00:00");
        assert_eq!(request_id_at(winter, chrono_tz::Australia::Sydney), "2025-07-15T10:00:00");
    }

    #[test]
    fn record_serializes_with_column_names() {
        let job = LogRecord::job(Uuid::nil(), String::new(), &trigger());
        let value = serde_json::to_value(&job).unwrap();

        assert_eq!(value["REQUEST_LOG_EVENT"], "JOB START");
        assert_eq!(value["STATUS"], "INFO");
        assert_eq!(value["JOB_NAME"], "SALES");
        assert!(value.get("TYPE").is_some());
    }
}
