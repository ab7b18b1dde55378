//! Monitor Command
//!
//! Runs queries against every enabled provider and stores the results.
//!
//! Usage:
//!   brandpulse monitor "best data analytics firms" [--file queries.txt]
//!   brandpulse monitor --file queries.txt --no-persist -f json
//!   brandpulse monitor "query" --provider gemini --output results.json

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::info;
use uuid::Uuid;

use crate::ai::create_shared_metrics;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, OutputFormat, collect_queries};
use crate::monitor::{BatchOutcome, Orchestrator};
use crate::storage::ResultSink;
use crate::types::{MonitorError, ProviderKind, Result};

#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    pub queries: Vec<String>,
    pub file: Option<PathBuf>,
    pub config: Option<PathBuf>,
    /// Overrides `monitor.enabled_providers` when non-empty
    pub providers: Vec<ProviderKind>,
    pub format: OutputFormat,
    /// Skip the result store entirely
    pub no_persist: bool,
    /// Write the full batch outcome as JSON to this path
    pub output: Option<PathBuf>,
}

pub fn run(options: MonitorOptions) -> Result<()> {
    let ctx = CommandContext::load(options.config.as_deref())?.with_providers(&options.providers)?;
    let queries = collect_queries(&options.queries, options.file.as_deref())?;

    let metrics = create_shared_metrics(Uuid::new_v4().to_string());
    let orchestrator = Orchestrator::from_config(&ctx.config)?.with_metrics(Arc::clone(&metrics));
    let sink = if options.no_persist {
        None
    } else {
        Some(ResultSink::from_config(&ctx.config.storage)?)
    };

    info!(
        queries = queries.len(),
        providers = ?ctx.config.monitor.enabled_providers,
        store = sink.as_ref().map(|s| s.store().describe()).unwrap_or_else(|| "none".to_string()),
        "Starting monitoring run"
    );

    let rt = Runtime::new()?;
    let outcome = rt.block_on(orchestrator.monitor(queries, sink.as_ref()));

    render(&outcome, options.format, sink.is_some())?;
    if options.format == OutputFormat::Text && ctx.config.monitor.enable_cost_tracking {
        println!();
        println!("{}", metrics.summary().display());
    }

    if let Some(path) = &options.output {
        write_outcome(&outcome, path)?;
        Output::new().info(&format!("Results written to {}", path.display()));
    }

    if !outcome.fully_persisted() {
        return Err(MonitorError::Storage(format!(
            "{} of {} reports were not stored",
            outcome.persistence_failures.len(),
            outcome.reports.len()
        )));
    }
    Ok(())
}

fn render(outcome: &BatchOutcome, format: OutputFormat, persisted: bool) -> Result<()> {
    match format {
        OutputFormat::Text => Output::new().outcome(outcome, persisted),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(outcome)?),
    }
    Ok(())
}

fn write_outcome(outcome: &BatchOutcome, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(outcome)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Query, QueryReport};

    #[test]
    fn test_write_outcome_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("batch.json");

        let outcome = BatchOutcome {
            reports: vec![QueryReport::assemble(Query::new("q"), "DataTobiz", Vec::new())],
            ..BatchOutcome::default()
        };
        write_outcome(&outcome, &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["reports"].as_array().unwrap().len(), 1);
        assert_eq!(json["summary"]["total_queries"], 0);
    }
}
