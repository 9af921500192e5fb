// Step Dispatch
//
// Executes one metadata step. The parsed StepAction selects the
// branch; each branch brackets its work with audit records and turns
// every collaborator failure into a StepOutcome. The closing record
// is written whether or not the step succeeded.

use std::thread;

use crate::adapters::{archive_destination, matching_blobs, Blob, CollaboratorError, LoadRequest};
use crate::audit::{LogEvent, LogRecord, LogStatus};
use crate::context::ExecutionContext;
use crate::metadata::config::{CheckConfig, CheckConfigError, LoadConfigError, LoadOptions};
use crate::metadata::{Step, StepAction};

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub success: bool,
    pub message: String,
}

impl StepOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    fn status(&self) -> LogStatus {
        if self.success {
            LogStatus::Info
        } else {
            LogStatus::Error
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BlobAction {
    Archive,
    Delete,
}

impl BlobAction {
    /// (item success, item failure, all done, incomplete)
    fn messages(self) -> [&'static str; 4] {
        match self {
            BlobAction::Archive => [
                "archive success",
                "error archiving blob",
                "all files archived",
                "file archives incomplete",
            ],
            BlobAction::Delete => [
                "delete success",
                "delete fail",
                "file deletions complete",
                "file deletions incomplete",
            ],
        }
    }
}

pub struct StepDispatcher<'c, 'a> {
    ctx: &'c mut ExecutionContext<'a>,
}

impl<'c, 'a> StepDispatcher<'c, 'a> {
    pub fn new(ctx: &'c mut ExecutionContext<'a>) -> Self {
        Self { ctx }
    }

    /// Run `step`, logging against a copy of the job record.
    pub fn dispatch(&mut self, step: &Step, job_log: &LogRecord) -> StepOutcome {
        let row = &step.row;
        let _span = tracing::info_span!("step", job = %row.job_name, step = row.step, name = %row.step_name)
            .entered();

        let log = job_log.for_step(row, self.ctx.request_id());

        let outcome = match &step.action {
            StepAction::Trigger => StepOutcome::success(""),
            StepAction::Check(config) => self.check(step, config, log),
            StepAction::Load(options) => self.load(step, options, log),
            StepAction::Archive => self.each_blob(step, BlobAction::Archive, log),
            StepAction::Delete => self.each_blob(step, BlobAction::Delete, log),
            StepAction::Procedure => self.procedure(step, log),
            StepAction::Unsupported => {
                let outcome = StepOutcome::failure("invalid metadata step");
                self.close(log, &outcome);
                outcome
            }
        };

        if outcome.success {
            tracing::info!(outcome = %outcome.message, "step finished");
        } else {
            tracing::warn!(outcome = %outcome.message, "step failed");
        }
        outcome
    }

    fn open(&mut self, log: &mut LogRecord) {
        log.mark(LogEvent::Start, LogStatus::Info, "");
        self.ctx.audit.write(log);
    }

    fn close(&mut self, mut log: LogRecord, outcome: &StepOutcome) {
        log.mark(LogEvent::End, outcome.status(), outcome.message.clone());
        self.ctx.audit.write(&log);
    }

    fn check(
        &mut self,
        step: &Step,
        config: &Result<CheckConfig, CheckConfigError>,
        mut log: LogRecord,
    ) -> StepOutcome {
        self.open(&mut log);

        let outcome = match config {
            Err(err) => StepOutcome::failure(err.to_string()),
            Ok(config) => {
                if config.required_files > 1 {
                    // listings lag behind uploads of multi-file drops
                    thread::sleep(self.ctx.config.check_delay());
                }

                match matching_blobs(&*self.ctx.objects, &step.row.source_name) {
                    Ok(blobs) if blobs.len() as u64 == config.required_files => {
                        StepOutcome::success("passed file count check")
                    }
                    Ok(blobs) => {
                        tracing::debug!(
                            found = blobs.len(),
                            required = config.required_files,
                            "file count mismatch"
                        );
                        StepOutcome::failure("failed file count check")
                    }
                    Err(err) => listing_failed(&err),
                }
            }
        };

        self.close(log, &outcome);
        outcome
    }

    fn load(
        &mut self,
        step: &Step,
        options: &Result<LoadOptions, LoadConfigError>,
        mut log: LogRecord,
    ) -> StepOutcome {
        self.open(&mut log);

        let outcome = match options {
            Err(err) => StepOutcome::failure(err.to_string()),
            Ok(options) => self.bulk_load(step, options, &log.request_id),
        };

        self.close(log, &outcome);
        outcome
    }

    fn bulk_load(&mut self, step: &Step, options: &LoadOptions, request_id: &str) -> StepOutcome {
        let request = LoadRequest {
            source_uri: format!("gs://{}", step.row.source_name),
            table_id: self.ctx.config.table_id(&step.row.target_name),
            options: options.clone(),
            write_mode: options.write_mode(),
        };

        if let Err(err) = self.ctx.loader.load(&request) {
            tracing::warn!(uri = %request.source_uri, table = %request.table_id, error = %err, "bulk load failed");
            return StepOutcome::failure("load failed");
        }

        if let Err(err) = self.ctx.loader.tag_request_id(&request.table_id, request_id) {
            tracing::warn!(table = %request.table_id, %request_id, error = %err, "could not tag loaded rows");
        }

        StepOutcome::success("file load success")
    }

    fn each_blob(&mut self, step: &Step, action: BlobAction, mut log: LogRecord) -> StepOutcome {
        let [item_ok, item_failed, all_done, incomplete] = action.messages();

        let blobs = match matching_blobs(&*self.ctx.objects, &step.row.source_name) {
            Ok(blobs) => blobs,
            Err(err) => {
                let outcome = listing_failed(&err);
                self.close(log, &outcome);
                return outcome;
            }
        };

        if blobs.is_empty() {
            tracing::debug!(source = %step.row.source_name, "no files to process");
            return StepOutcome::success("no matching files");
        }

        let mut succeeded = 0;
        let mut last = StepOutcome::success("");

        for blob in &blobs {
            log.source_name = blob.full_name();
            self.open(&mut log);

            let result = match action {
                BlobAction::Archive => self.archive(blob, &step.row.target_name),
                BlobAction::Delete => self.ctx.objects.delete(&blob.bucket, &blob.name),
            };

            last = match result {
                Ok(()) => {
                    succeeded += 1;
                    StepOutcome::success(item_ok)
                }
                Err(err) => {
                    tracing::warn!(blob = %blob.full_name(), error = %err, "blob operation failed");
                    StepOutcome::failure(item_failed)
                }
            };
            self.close(log.clone(), &last);
        }

        if blobs.len() == 1 {
            return last;
        }

        let summary = if succeeded == blobs.len() {
            StepOutcome::success(all_done)
        } else {
            StepOutcome::failure(incomplete)
        };

        log.source_type.clear();
        log.source_name = step.row.source_name.clone();
        log.target_type.clear();
        log.target_name.clear();
        self.close(log, &summary);

        summary
    }

    fn archive(&mut self, blob: &Blob, target: &str) -> Result<(), CollaboratorError> {
        let (bucket, name) = archive_destination(&blob.name, target);
        self.ctx.objects.copy(&blob.bucket, &blob.name, &bucket, &name)?;
        self.ctx.objects.delete(&blob.bucket, &blob.name)
    }

    fn procedure(&mut self, step: &Step, mut log: LogRecord) -> StepOutcome {
        self.open(&mut log);

        let row = &step.row;
        let outcome = match self
            .ctx
            .procedures
            .call(&row.step_name, &log.request_id, &row.load_mode, &row.configuration)
        {
            Ok(message) if message.is_empty() => StepOutcome::success("procedure success"),
            Ok(message) => StepOutcome::failure(message),
            Err(err) => {
                tracing::warn!(procedure = %row.step_name, error = %err, "procedure call failed");
                StepOutcome::failure("procedure error")
            }
        };

        self.close(log, &outcome);
        outcome
    }
}

fn listing_failed(err: &CollaboratorError) -> StepOutcome {
    tracing::warn!(error = %err, "blob listing failed");
    StepOutcome::failure("blob listing failed")
}
