// Job Runner
//
// Drives one inbound event end to end:
// metadata → trigger → JOB START → steps → JOB END
//
// The first failing step ends the job. Later steps are neither
// executed nor logged; nothing is retried or rolled back.

use serde::Serialize;
use uuid::Uuid;

use crate::audit::{LogEvent, LogRecord, LogStatus};
use crate::context::ExecutionContext;
use crate::dispatch::StepDispatcher;
use crate::metadata::{MetadataError, MetadataIndex};
use crate::trigger::{self, FileEvent};

/// Summary of a job that ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub job_instance: Uuid,
    pub job_name: String,
    pub success: bool,
    /// Steps handed to the dispatcher.
    pub executed: usize,
    /// Steps passed over because they are inactive.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// No trigger claimed the file.
    NoMatch,
    Completed(JobReport),
}

pub struct JobRunner<'a> {
    ctx: ExecutionContext<'a>,
}

impl<'a> JobRunner<'a> {
    pub fn new(ctx: ExecutionContext<'a>) -> Self {
        Self { ctx }
    }

    /// Load metadata and run whatever job `event` triggers.
    ///
    /// Only a metadata failure is an error; an unmatched event is a
    /// normal, silent outcome.
    pub fn run(&mut self, event: &FileEvent) -> Result<RunOutcome, MetadataError> {
        let index = MetadataIndex::load(self.ctx.metadata, &self.ctx.config.metadata_table)?;
        Ok(self.run_with_index(&index, event))
    }

    pub fn run_with_index(&mut self, index: &MetadataIndex, event: &FileEvent) -> RunOutcome {
        let Some(found) = trigger::resolve(index, event) else {
            return RunOutcome::NoMatch;
        };

        let trigger = &found.trigger.row;
        let job_instance = Uuid::new_v4();
        let _span = tracing::info_span!("job", job = %trigger.job_name, instance = %job_instance).entered();
        tracing::info!(file = %event.search_name(), steps = found.steps.len(), "job started");

        let mut job_log = LogRecord::job(job_instance, self.ctx.request_id(), trigger);
        self.ctx.audit.write(&job_log);

        let mut success = true;
        let mut executed = 0;
        let mut skipped = 0;

        for step in &found.steps {
            if !success {
                break;
            }

            if !step.is_active() {
                tracing::info!(step = step.row.step, name = %step.row.step_name, "step inactive, skipping");
                let mut log = job_log.for_step(&step.row, self.ctx.request_id());
                log.mark(LogEvent::End, LogStatus::Info, "skipped");
                self.ctx.audit.write(&log);
                skipped += 1;
                continue;
            }

            let outcome = StepDispatcher::new(&mut self.ctx).dispatch(step, &job_log);
            executed += 1;
            success = outcome.success;
        }

        if success {
            job_log.mark(LogEvent::JobEnd, LogStatus::Info, "job success");
            tracing::info!(executed, skipped, "job succeeded");
        } else {
            job_log.mark(LogEvent::JobEnd, LogStatus::Error, "job fail");
            tracing::warn!(executed, skipped, "job failed");
        }
        self.ctx.audit.write(&job_log);

        RunOutcome::Completed(JobReport {
            job_instance,
            job_name: trigger.job_name.clone(),
            success,
            executed,
            skipped,
        })
    }
}
