// Trigger Resolution
//
// Maps an inbound file-arrival event to the job whose trigger row
// matches it. Most events match nothing; that is not an error.

use serde::{Deserialize, Serialize};

use crate::metadata::active::json_str;
use crate::metadata::{MetadataIndex, Step};
use crate::pattern;

/// Object-creation notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    pub bucket: String,
    pub name: String,
}

impl FileEvent {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    /// `bucket/name`, compared against trigger SOURCE_NAME.
    pub fn search_name(&self) -> String {
        format!("{}/{}", self.bucket, self.name)
    }

    pub fn file_name(&self) -> &str {
        pattern::file_name(&self.name)
    }
}

/// A resolved trigger and the job steps it starts.
#[derive(Debug, Clone)]
pub struct TriggerMatch<'a> {
    pub trigger: &'a Step,
    pub steps: Vec<&'a Step>,
}

/// Resolve `event` against every trigger row.
///
/// When several active triggers match, the last one in index order
/// wins. Its `"filename"` configuration, if set, must also match the
/// event's base filename.
pub fn resolve<'a>(index: &'a MetadataIndex, event: &FileEvent) -> Option<TriggerMatch<'a>> {
    let search_name = event.search_name();

    let candidates: Vec<&Step> = index
        .triggers()
        .filter(|t| pattern::matches(&search_name, &t.row.source_name))
        .filter(|t| t.is_active())
        .collect();

    if candidates.len() > 1 {
        let jobs: Vec<&str> = candidates.iter().map(|t| t.row.job_name.as_str()).collect();
        tracing::warn!(file = %search_name, ?jobs, "several triggers match, using the last one");
    }

    let Some(trigger) = candidates.last().copied() else {
        tracing::debug!(file = %search_name, "no active trigger matches");
        return None;
    };

    let filter = json_str(&trigger.row.configuration, "filename").unwrap_or_default();
    if !filter.is_empty() && !pattern::matches(event.file_name(), &filter) {
        tracing::debug!(
            file = %search_name,
            job = %trigger.row.job_name,
            %filter,
            "filename filter rejects file"
        );
        return None;
    }

    let steps = index.steps_for(&trigger.row.job_name);
    if steps.is_empty() {
        tracing::debug!(job = %trigger.row.job_name, "trigger matched a job with no steps");
        return None;
    }

    Some(TriggerMatch { trigger, steps })
}
