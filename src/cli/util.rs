//! CLI Common Utilities
//!
//! Shared setup for command handlers: config loading, query input and
//! output format parsing.

use std::path::{Path, PathBuf};

use crate::config::{Config, ConfigLoader};
use crate::types::{MonitorError, ProviderKind, Query, Result};

/// Command execution context
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: Config,
    /// Explicit `--config` path, if one was given
    pub config_path: Option<PathBuf>,
}

impl CommandContext {
    /// Load and validate the merged configuration
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Ok(Self {
            config: ConfigLoader::load(config_path)?,
            config_path: config_path.map(Path::to_path_buf),
        })
    }

    /// Restrict the run to `providers`, keeping their command-line order
    pub fn with_providers(mut self, providers: &[ProviderKind]) -> Result<Self> {
        if !providers.is_empty() {
            self.config.monitor.enabled_providers = providers.to_vec();
            self.config.validate()?;
        }
        Ok(self)
    }
}

/// Rendering for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            _ => Err(format!(
                "Invalid format '{}'. Valid values: text, json, yaml",
                s
            )),
        }
    }
}

/// Collect queries from positional arguments and an optional file.
///
/// The file holds one query per line; blank lines and `#` comments are
/// skipped. Argument queries come first.
pub fn collect_queries(args: &[String], file: Option<&Path>) -> Result<Vec<Query>> {
    let mut texts: Vec<String> = args
        .iter()
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect();

    if let Some(path) = file {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::Config(format!("Cannot read queries from {}: {}", path.display(), e))
        })?;
        texts.extend(parse_query_lines(&content));
    }

    if texts.is_empty() {
        return Err(MonitorError::config(
            "No queries given. Pass them as arguments or with --file",
        ));
    }

    Ok(texts.into_iter().map(Query::new).collect())
}

fn parse_query_lines(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}
