use std::collections::BTreeMap;
use std::fs;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use relay_kernel::adapters::memory::{InMemoryBulkLoader, InMemoryObjectStore, InMemoryProcedureRunner};
use relay_kernel::adapters::Blob;
use relay_kernel::audit::{InMemoryAuditSink, LogRecord};
use relay_kernel::config::EngineConfig;
use relay_kernel::context::ExecutionContext;
use relay_kernel::metadata::store::JsonFileMetadataStore;
use relay_kernel::runner::{JobRunner, RunOutcome};
use relay_kernel::trigger::FileEvent;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Relay ETL engine (dry-run)
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(about = "Run one file-arrival event against job metadata (dry-run)", long_about = None)]
struct Cli {
    /// Path to job metadata rows JSON
    #[arg(long)]
    metadata: String,

    /// Bucket of the arriving file
    #[arg(long)]
    bucket: String,

    /// Object name of the arriving file
    #[arg(long)]
    name: String,

    /// Path to a JSON list of existing blobs ({"bucket", "name"})
    #[arg(long)]
    objects: Option<String>,

    /// Path to a JSON map of procedure name to return message
    #[arg(long)]
    procedures: Option<String>,

    /// Project qualifying load targets
    #[arg(long)]
    project: Option<String>,

    /// Override the CHECK delay
    #[arg(long)]
    check_delay_secs: Option<u64>,

    /// Override the pause before each audit write
    #[arg(long)]
    log_interval_ms: Option<u64>,

    /// Operational log format (stderr)
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

/// Wrapper for JSON output
#[derive(Debug, Serialize)]
struct CliOutput {
    outcome: RunOutcome,
    audit_log: Vec<LogRecord>,
    objects: Vec<Blob>,
    loads: InMemoryBulkLoader,
    procedures: InMemoryProcedureRunner,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {path}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    // ----------------------------
    // Configuration
    // ----------------------------
    let mut config = EngineConfig::from_env()?;
    if let Some(project) = cli.project {
        config.project_id = project;
    }
    if let Some(secs) = cli.check_delay_secs {
        config.check_delay_secs = secs;
    }
    if let Some(ms) = cli.log_interval_ms {
        config.log_interval_ms = ms;
    }

    // ----------------------------
    // Collaborators
    // ----------------------------
    let metadata = JsonFileMetadataStore::new(&cli.metadata);

    let mut objects = match &cli.objects {
        Some(path) => InMemoryObjectStore::with_blobs(read_json::<Vec<Blob>>(path)?),
        None => InMemoryObjectStore::default(),
    };

    let mut procedures = match &cli.procedures {
        Some(path) => InMemoryProcedureRunner::new(read_json::<BTreeMap<String, String>>(path)?),
        None => InMemoryProcedureRunner::default(),
    };

    let mut loader = InMemoryBulkLoader::default();
    let mut sink = InMemoryAuditSink::new();

    // ----------------------------
    // Run
    // ----------------------------
    let event = FileEvent::new(cli.bucket, cli.name);
    let ctx = ExecutionContext::new(
        config,
        &metadata,
        &mut objects,
        &mut loader,
        &mut procedures,
        &mut sink,
    );

    let outcome = match JobRunner::new(ctx).run(&event) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(error = %err, "error getting metadata");
            return Err(err.into());
        }
    };

    // ----------------------------
    // Output
    // ----------------------------
    let output = CliOutput {
        outcome,
        audit_log: sink.records().to_vec(),
        objects: objects.blobs().cloned().collect(),
        loads: loader,
        procedures,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
