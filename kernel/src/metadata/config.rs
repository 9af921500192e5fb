// Step Configuration
//
// Turns the free-form CONFIGURATION column into a typed action per
// step kind. Parsing happens once when the index is built so that
// malformed rows are reported before any job runs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::active::json_item;
use super::MetadataRow;

pub const TRIGGER: &str = "TRIGGER";

const LOAD_KEYS: [&str; 6] = [
    "allow_jagged_rows",
    "skip_leading_rows",
    "source_format",
    "field_delimiter",
    "quote",
    "truncate_before_load",
];

/// What the dispatcher does with a row.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    Trigger,
    Check(Result<CheckConfig, CheckConfigError>),
    Load(Result<LoadOptions, LoadConfigError>),
    Archive,
    Delete,
    Procedure,
    Unsupported,
}

impl StepAction {
    /// Classify a row by CONTROL_FLAG, TYPE and SUBTYPE.
    pub fn from_row(row: &MetadataRow) -> Self {
        if row.control_flag == TRIGGER {
            return StepAction::Trigger;
        }

        match (row.step_type.as_str(), row.subtype.as_str()) {
            ("CHECK", _) => StepAction::Check(CheckConfig::parse(&row.configuration)),
            ("FILE", "LOAD") => StepAction::Load(LoadOptions::parse(&row.configuration)),
            ("FILE", "ARCHIVE") => StepAction::Archive,
            ("FILE", "DELETE") => StepAction::Delete,
            ("PROCEDURE", "LOAD") => StepAction::Procedure,
            _ => StepAction::Unsupported,
        }
    }

    /// Validation problem carried by this action, if any.
    pub fn config_error(&self) -> Option<String> {
        match self {
            StepAction::Check(Err(err)) => Some(err.to_string()),
            StepAction::Load(Err(err)) => Some(err.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckConfigError {
    #[error("invalid check config")]
    InvalidFileCount,
}

/// File count requirement of a CHECK step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConfig {
    pub required_files: u64,
}

impl CheckConfig {
    /// Read the `"file"` key, defaulting to one file.
    pub fn parse(configuration: &str) -> Result<Self, CheckConfigError> {
        let required_files = match json_item(configuration, "file") {
            None => 1,
            Some(Value::Number(n)) => n.as_u64().ok_or(CheckConfigError::InvalidFileCount)?,
            Some(Value::String(s)) if s.is_empty() => 1,
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| CheckConfigError::InvalidFileCount)?,
            Some(_) => return Err(CheckConfigError::InvalidFileCount),
        };

        Ok(Self { required_files })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadConfigError {
    #[error("load config in metadata is empty")]
    Empty,

    #[error("invalid load config")]
    Invalid,
}

/// Input format understood by the bulk loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceFormat {
    Csv,
    NewlineDelimitedJson,
    Avro,
    Parquet,
    Orc,
    DatastoreBackup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteMode {
    Truncate,
    Append,
}

/// Options of a FILE/LOAD step, exactly as declared in metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    pub allow_jagged_rows: bool,
    pub skip_leading_rows: u32,
    pub source_format: SourceFormat,
    pub field_delimiter: char,
    pub quote: char,
    pub truncate_before_load: String,
}

impl LoadOptions {
    /// Parse and validate a load configuration.
    ///
    /// The key set must be exactly the six load keys; the `active`
    /// override is the only extra key tolerated.
    pub fn parse(configuration: &str) -> Result<Self, LoadConfigError> {
        if configuration.is_empty() {
            return Err(LoadConfigError::Empty);
        }

        let mut map: Map<String, Value> =
            serde_json::from_str(configuration).map_err(|_| LoadConfigError::Invalid)?;
        map.retain(|key, _| !key.eq_ignore_ascii_case("active"));

        let keys: BTreeSet<&str> = map.keys().map(String::as_str).collect();
        if keys != BTreeSet::from(LOAD_KEYS) {
            return Err(LoadConfigError::Invalid);
        }

        serde_json::from_value(Value::Object(map)).map_err(|_| LoadConfigError::Invalid)
    }

    pub fn write_mode(&self) -> WriteMode {
        if self.truncate_before_load.eq_ignore_ascii_case("YES") {
            WriteMode::Truncate
        } else {
            WriteMode::Append
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOAD_CONFIG: &str = r#"{"allow_jagged_rows": false, "skip_leading_rows": 1, "source_format": "CSV", "field_delimiter": ",", "quote": "\"", "truncate_before_load": "NO"}"#;

    fn row(control_flag: &str, step_type: &str, subtype: &str, configuration: &str) -> MetadataRow {
        MetadataRow {
            control_flag: control_flag.into(),
            step_type: step_type.into(),
            subtype: subtype.into(),
            configuration: configuration.into(),
            ..MetadataRow::default()
        }
    }

    #[test]
    fn load_config_round_trips_all_fields() {
        let options = LoadOptions::parse(LOAD_CONFIG).unwrap();

        assert!(!options.allow_jagged_rows);
        assert_eq!(options.skip_leading_rows, 1);
        assert_eq!(options.source_format, SourceFormat::Csv);
        assert_eq!(options.field_delimiter, ',');
        assert_eq!(options.quote, '"');
        assert_eq!(options.write_mode(), WriteMode::Append);
    }

    #[test]
    fn truncate_is_case_insensitive() {
        let config = LOAD_CONFIG.replace(r#""NO""#, r#""yes""#);
        let options = LoadOptions::parse(&config).unwrap();
        assert_eq!(options.write_mode(), WriteMode::Truncate);
    }

    #[test]
    fn load_config_key_set_must_be_exact() {
        let missing = r#"{"allow_jagged_rows": false, "skip_leading_rows": 1}"#;
        assert_eq!(LoadOptions::parse(missing), Err(LoadConfigError::Invalid));

        let extra = LOAD_CONFIG.replace('}', r#", "encoding": "UTF-8"}"#);
        assert_eq!(LoadOptions::parse(&extra), Err(LoadConfigError::Invalid));

        let with_active = LOAD_CONFIG.replace('}', r#", "ACTIVE": "Y"}"#);
        assert!(LoadOptions::parse(&with_active).is_ok());
    }

    #[test]
    fn load_config_rejects_empty_and_wrong_types() {
        assert_eq!(LoadOptions::parse(""), Err(LoadConfigError::Empty));
        assert_eq!(LoadOptions::parse("nope"), Err(LoadConfigError::Invalid));

        let bad_rows = LOAD_CONFIG.replace(r#""skip_leading_rows": 1"#, r#""skip_leading_rows": "one""#);
        assert_eq!(LoadOptions::parse(&bad_rows), Err(LoadConfigError::Invalid));
    }

    #[test]
    fn check_defaults_to_one_file() {
        assert_eq!(CheckConfig::parse("").unwrap().required_files, 1);
        assert_eq!(CheckConfig::parse("not json").unwrap().required_files, 1);
        assert_eq!(CheckConfig::parse(r#"{"file": 3}"#).unwrap().required_files, 3);
        assert_eq!(CheckConfig::parse(r#"{"file": "2"}"#).unwrap().required_files, 2);
        assert_eq!(
            CheckConfig::parse(r#"{"file": [1]}"#),
            Err(CheckConfigError::InvalidFileCount)
        );
    }

    #[test]
    fn actions_follow_type_and_subtype() {
        assert_eq!(StepAction::from_row(&row("TRIGGER", "FILE", "LOAD", "")), StepAction::Trigger);
        assert_eq!(StepAction::from_row(&row("", "FILE", "ARCHIVE", "")), StepAction::Archive);
        assert_eq!(StepAction::from_row(&row("", "FILE", "DELETE", "")), StepAction::Delete);
        assert_eq!(StepAction::from_row(&row("", "PROCEDURE", "LOAD", "")), StepAction::Procedure);
        assert_eq!(StepAction::from_row(&row("", "FILE", "MERGE", "")), StepAction::Unsupported);
        assert_eq!(StepAction::from_row(&row("", "file", "load", "")), StepAction::Unsupported);
        assert!(matches!(
            StepAction::from_row(&row("", "CHECK", "", "")),
            StepAction::Check(Ok(CheckConfig { required_files: 1 }))
        ));
        assert_eq!(
            StepAction::from_row(&row("", "FILE", "LOAD", "")).config_error().as_deref(),
            Some("load config in metadata is empty")
        );
    }
}
