// Job Metadata
//
// Declarative job definitions and the in-memory index the engine
// resolves triggers and step sequences against.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

pub mod active;
pub mod config;
pub mod store;

pub use active::is_active;
pub use config::{StepAction, TRIGGER};
pub use store::MetadataStore;

/// Errors that make the metadata unusable for a run.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed metadata: {0}")]
    Malformed(String),

    #[error("metadata io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One row of the job metadata table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct MetadataRow {
    #[serde(deserialize_with = "null_as_empty")]
    pub job_name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub job_version: String,
    pub step: i64,
    #[serde(deserialize_with = "null_as_empty")]
    pub step_name: String,
    #[serde(rename = "TYPE", deserialize_with = "null_as_empty")]
    pub step_type: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub subtype: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub control_flag: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub load_mode: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub configuration: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub source_type: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub source_name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub target_type: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub target_name: String,
}

impl MetadataRow {
    pub fn is_trigger(&self) -> bool {
        self.control_flag == TRIGGER
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A metadata row paired with its parsed action.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub row: MetadataRow,
    pub action: StepAction,
}

impl Step {
    pub fn new(row: MetadataRow) -> Self {
        let action = StepAction::from_row(&row);
        Self { row, action }
    }

    pub fn is_active(&self) -> bool {
        is_active(&self.row.configuration)
    }
}

/// All job definitions, sorted by job name then step.
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    steps: Vec<Step>,
}

impl MetadataIndex {
    /// Fetch every row of `table` and build the index.
    pub fn load(store: &dyn MetadataStore, table: &str) -> Result<Self, MetadataError> {
        let rows = store.fetch_all(table)?;
        tracing::debug!(%table, rows = rows.len(), "metadata loaded");
        Ok(Self::from_rows(rows))
    }

    pub fn from_rows(mut rows: Vec<MetadataRow>) -> Self {
        rows.sort_by(|a, b| (&a.job_name, a.step).cmp(&(&b.job_name, b.step)));

        let index = Self {
            steps: rows.into_iter().map(Step::new).collect(),
        };
        index.report_inconsistencies();
        index
    }

    /// Every trigger row, in index order.
    pub fn triggers(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| s.row.is_trigger())
    }

    /// Executable steps of a job, ordered by STEP.
    pub fn steps_for(&self, job_name: &str) -> Vec<&Step> {
        self.steps
            .iter()
            .filter(|s| s.row.job_name == job_name && !s.row.is_trigger())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    // Duplicate steps, trigger counts and bad configurations are
    // reported here, before any job reaches them.
    fn report_inconsistencies(&self) {
        let mut triggers: BTreeMap<&str, usize> = BTreeMap::new();

        for (i, step) in self.steps.iter().enumerate() {
            let row = &step.row;
            *triggers.entry(row.job_name.as_str()).or_default() += usize::from(row.is_trigger());

            if let Some(prev) = i.checked_sub(1).map(|p| &self.steps[p].row) {
                if prev.job_name == row.job_name && prev.step == row.step {
                    tracing::warn!(job = %row.job_name, step = row.step, "duplicate step number");
                }
            }

            if let Some(problem) = step.action.config_error() {
                tracing::warn!(
                    job = %row.job_name,
                    step = row.step,
                    step_name = %row.step_name,
                    %problem,
                    "step configuration rejected"
                );
            }
        }

        for (job, count) in triggers.into_iter().filter(|(_, count)| *count != 1) {
            tracing::warn!(%job, triggers = count, "job should have exactly one trigger row");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::store::InMemoryMetadataStore;
    use super::*;

    fn row(job: &str, step: i64, control_flag: &str) -> MetadataRow {
        MetadataRow {
            job_name: job.into(),
            job_version: "1".into(),
            step,
            step_name: format!("{job}_{step}"),
            step_type: "FILE".into(),
            subtype: "DELETE".into(),
            control_flag: control_flag.into(),
            ..MetadataRow::default()
        }
    }

    #[test]
    fn steps_are_sorted_and_exclude_trigger() {
        let index = MetadataIndex::from_rows(vec![
            row("SALES", 3, ""),
            row("COSTS", 1, "TRIGGER"),
            row("SALES", 0, "TRIGGER"),
            row("SALES", 1, ""),
        ]);

        let steps: Vec<i64> = index.steps_for("SALES").iter().map(|s| s.row.step).collect();
        assert_eq!(steps, vec![1, 3]);

        let triggers: Vec<&str> = index.triggers().map(|s| s.row.job_name.as_str()).collect();
        assert_eq!(triggers, vec!["COSTS", "SALES"]);
    }

    #[test]
    fn unknown_job_has_no_steps() {
        let index = MetadataIndex::from_rows(vec![row("SALES", 1, "")]);
        assert!(index.steps_for("COSTS").is_empty());
    }

    #[test]
    fn load_propagates_store_failure() {
        let err = MetadataIndex::load(&InMemoryMetadataStore::unavailable(), "META").unwrap_err();
        assert!(err.to_string().contains("unavailable"));
    }

    #[test]
    fn rows_decode_from_json_with_nulls() {
        let json = r#"[{
            "JOB_NAME": "SALES", "JOB_VERSION": "2", "STEP": 1, "STEP_NAME": "CHK",
            "TYPE": "CHECK", "SUBTYPE": null, "CONTROL_FLAG": null, "LOAD_MODE": "",
            "CONFIGURATION": "{\"file\": 2}", "SOURCE_TYPE": "GCS",
            "SOURCE_NAME": "landing/sales*", "TARGET_TYPE": "", "TARGET_NAME": ""
        }]"#;

        let rows: Vec<MetadataRow> = serde_json::from_str(json).unwrap();
        assert_eq!(rows[0].subtype, "");
        assert_eq!(rows[0].step_type, "CHECK");

        let index = MetadataIndex::from_rows(rows);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn missing_column_is_rejected() {
        let json = r#"[{"JOB_NAME": "SALES", "STEP": 1}]"#;
        assert!(serde_json::from_str::<Vec<MetadataRow>>(json).is_err());
    }
}
