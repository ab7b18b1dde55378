//! Spreadsheet Row Format
//!
//! One row per provider result. Cells are plain strings so every backing
//! store (Sheets, SQLite, memory) holds exactly what a spreadsheet would.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{MonitorError, ProviderKind, ProviderResult, QueryReport, RankMethod, Result};

/// Header row written once per worksheet
pub const HEADERS: [&str; 12] = [
    "timestamp",
    "query_id",
    "query",
    "provider",
    "model",
    "success",
    "matches_found",
    "best_rank",
    "rank_method",
    "latency_ms",
    "cost_usd",
    "error",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetRow {
    pub timestamp: DateTime<Utc>,
    pub query_id: Uuid,
    pub query: String,
    pub provider: ProviderKind,
    pub model: String,
    pub success: bool,
    pub matches_found: usize,
    pub best_rank: Option<u32>,
    pub rank_method: Option<RankMethod>,
    pub latency_ms: u64,
    pub cost_usd: f64,
    /// `"<kind>: <message>"` for failed results
    pub error: Option<String>,
}

impl SheetRow {
    pub fn from_result(report: &QueryReport, result: &ProviderResult) -> Self {
        let rank = result.rank();
        Self {
            timestamp: report.timestamp(),
            query_id: report.query().id,
            query: report.query().text.clone(),
            provider: result.provider,
            model: result.model.clone(),
            success: result.is_success(),
            matches_found: result.matches().len(),
            best_rank: rank.and_then(|r| r.position),
            rank_method: rank.map(|r| r.method),
            latency_ms: result.latency_ms,
            cost_usd: result.cost_usd(),
            error: result.error().map(|e| format!("{}: {}", e.kind, e.message)),
        }
    }

    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.query_id.to_string(),
            self.query.clone(),
            self.provider.to_string(),
            self.model.clone(),
            if self.success { "TRUE" } else { "FALSE" }.to_string(),
            self.matches_found.to_string(),
            self.best_rank.map(|r| r.to_string()).unwrap_or_default(),
            self.rank_method
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            self.latency_ms.to_string(),
            format!("{:.6}", self.cost_usd),
            self.error.clone().unwrap_or_default(),
        ]
    }

    /// Parse a stored row. Missing trailing cells read as empty, since
    /// spreadsheets drop them.
    pub fn from_cells(cells: &[String]) -> Result<Self> {
        let cell = |idx: usize| cells.get(idx).map(|s| s.trim()).unwrap_or("");
        let bad = |column: &str, value: &str| {
            MonitorError::RowFormat(format!("invalid {} value '{}'", column, value))
        };

        let timestamp = DateTime::parse_from_rfc3339(cell(0))
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| bad("timestamp", cell(0)))?;
        let query_id = Uuid::parse_str(cell(1)).map_err(|_| bad("query_id", cell(1)))?;
        let provider = cell(3)
            .parse::<ProviderKind>()
            .map_err(|_| bad("provider", cell(3)))?;
        let success = match cell(5).to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            other => return Err(bad("success", other)),
        };
        let matches_found = cell(6)
            .parse::<usize>()
            .map_err(|_| bad("matches_found", cell(6)))?;
        let best_rank = optional(cell(7))
            .map(|v| v.parse::<u32>().map_err(|_| bad("best_rank", v)))
            .transpose()?;
        let rank_method = optional(cell(8))
            .map(|v| v.parse::<RankMethod>().map_err(|_| bad("rank_method", v)))
            .transpose()?;
        let latency_ms = optional(cell(9))
            .map(|v| v.parse::<u64>().map_err(|_| bad("latency_ms", v)))
            .transpose()?
            .unwrap_or(0);
        let cost_usd = optional(cell(10))
            .map(|v| v.parse::<f64>().map_err(|_| bad("cost_usd", v)))
            .transpose()?
            .unwrap_or(0.0);

        Ok(Self {
            timestamp,
            query_id,
            query: cells.get(2).cloned().unwrap_or_default(),
            provider,
            model: cell(4).to_string(),
            success,
            matches_found,
            best_rank,
            rank_method,
            latency_ms,
            cost_usd,
            error: optional(cell(11)).map(str::to_string),
        })
    }
}

fn optional(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

/// Rows for one report, in provider order
pub fn rows_for_report(report: &QueryReport) -> Vec<SheetRow> {
    report
        .results()
        .iter()
        .map(|result| SheetRow::from_result(report, result))
        .collect()
}

// =============================================================================
// Report Digest
// =============================================================================

/// What survives of a report after a trip through the row format
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportDigest {
    pub query_id: Uuid,
    pub query: String,
    pub providers: Vec<ProviderKind>,
    pub matches: Vec<usize>,
    pub ranks: Vec<Option<u32>>,
}

impl ReportDigest {
    pub fn of_report(report: &QueryReport) -> Self {
        Self {
            query_id: report.query().id,
            query: report.query().text.clone(),
            providers: report.results().iter().map(|r| r.provider).collect(),
            matches: report.results().iter().map(|r| r.matches().len()).collect(),
            ranks: report
                .results()
                .iter()
                .map(|r| r.rank().and_then(|rank| rank.position))
                .collect(),
        }
    }

    /// Regroup stored rows into reports.
    ///
    /// Each report is stored as a contiguous block, and a provider appears at
    /// most once per report, so a new digest starts when the query id changes
    /// or a provider repeats.
    pub fn from_rows(rows: &[SheetRow]) -> Vec<Self> {
        let mut digests: Vec<Self> = Vec::new();

        for row in rows {
            let continues = digests
                .last()
                .is_some_and(|d| d.query_id == row.query_id && !d.providers.contains(&row.provider));
            if !continues {
                digests.push(Self {
                    query_id: row.query_id,
                    query: row.query.clone(),
                    providers: Vec::new(),
                    matches: Vec::new(),
                    ranks: Vec::new(),
                });
            }
            if let Some(digest) = digests.last_mut() {
                digest.providers.push(row.provider);
                digest.matches.push(row.matches_found);
                digest.ranks.push(row.best_rank);
            }
        }

        digests
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn total_matches(&self) -> usize {
        self.matches.iter().sum()
    }
}
