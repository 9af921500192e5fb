// Engine Configuration
//
// Constants shared by every component of a run: table names, the
// project that qualifies load targets, and the deliberate delays.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: `{value}`")]
    InvalidValue { name: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Qualifies load targets as `<project>.<table>` when set.
    pub project_id: String,
    pub metadata_table: String,
    pub execution_log_table: String,
    /// Pause before counting files when a CHECK expects more than one.
    pub check_delay_secs: u64,
    /// Pause before each audit write.
    pub log_interval_ms: u64,
    /// Zone of the local clock used for request ids.
    pub local_tz: Tz,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            metadata_table: "FIN_ADMIN_UTILITY.JOB_METADATA".into(),
            execution_log_table: "FIN_ADMIN_UTILITY.JOB_EXECUTION_LOG".into(),
            check_delay_secs: 180,
            log_interval_ms: 1000,
            local_tz: chrono_tz::Australia::Sydney,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by environment variables:
    ///
    /// - `RELAY_PROJECT_ID`
    /// - `RELAY_META_TABLE`
    /// - `RELAY_EXECUTION_LOG`
    /// - `RELAY_CHECK_DELAY_SECS`
    /// - `RELAY_LOG_INTERVAL_MS`
    /// - `RELAY_LOCAL_TZ` (IANA name, e.g. `Australia/Sydney`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(project) = env::var("RELAY_PROJECT_ID") {
            config.project_id = project;
        }
        if let Ok(table) = env::var("RELAY_META_TABLE") {
            config.metadata_table = table;
        }
        if let Ok(table) = env::var("RELAY_EXECUTION_LOG") {
            config.execution_log_table = table;
        }
        if let Some(secs) = parse_var("RELAY_CHECK_DELAY_SECS")? {
            config.check_delay_secs = secs;
        }
        if let Some(ms) = parse_var("RELAY_LOG_INTERVAL_MS")? {
            config.log_interval_ms = ms;
        }
        if let Some(tz) = parse_var("RELAY_LOCAL_TZ")? {
            config.local_tz = tz;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metadata_table.trim().is_empty() {
            return Err(ConfigError::Empty("metadata_table"));
        }
        if self.execution_log_table.trim().is_empty() {
            return Err(ConfigError::Empty("execution_log_table"));
        }
        Ok(())
    }

    pub fn check_delay(&self) -> Duration {
        Duration::from_secs(self.check_delay_secs)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_millis(self.log_interval_ms)
    }

    /// Fully qualified load target for a metadata TARGET_NAME.
    pub fn table_id(&self, target: &str) -> String {
        if self.project_id.is_empty() {
            target.to_string()
        } else {
            format!("{}.{}", self.project_id, target)
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(None),
    }
}

#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn project_id(mut self, project: impl Into<String>) -> Self {
        self.config.project_id = project.into();
        self
    }

    pub fn metadata_table(mut self, table: impl Into<String>) -> Self {
        self.config.metadata_table = table.into();
        self
    }

    pub fn execution_log_table(mut self, table: impl Into<String>) -> Self {
        self.config.execution_log_table = table.into();
        self
    }

    pub fn check_delay_secs(mut self, secs: u64) -> Self {
        self.config.check_delay_secs = secs;
        self
    }

    pub fn log_interval_ms(mut self, ms: u64) -> Self {
        self.config.log_interval_ms = ms;
        self
    }

    pub fn local_tz(mut self, tz: Tz) -> Self {
        self.config.local_tz = tz;
        self
    }

    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
