use console::style;

use crate::monitor::{BatchOutcome, BatchSummary};
use crate::types::{ProviderResult, QueryReport};

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// One block per query: a line per provider with matches and rank
    pub fn report(&self, report: &QueryReport) {
        let verdict = if report.brand_found() {
            style("FOUND").green().bold()
        } else {
            style("not found").dim()
        };
        self.section(&format!("\"{}\"  {}", report.query().text, verdict));

        for result in report.results() {
            println!("  {}", provider_line(result));
        }

        if let Some(rank) = report.best_rank() {
            println!("  {} #{}", style("best rank").bold(), rank);
        }
    }

    pub fn summary(&self, summary: &BatchSummary) {
        self.header("Summary");
        println!("  Queries:          {}", summary.total_queries);
        println!(
            "  Brand mentioned:  {} ({:.0}%)",
            summary.brand_mentions_found,
            summary.brand_detection_rate * 100.0
        );
        println!("  Provider errors:  {}", summary.provider_failures);
        println!("  Cost:             ${:.4}", summary.total_cost_usd);
        println!(
            "  Elapsed:          {:.1}s",
            summary.execution_time_ms as f64 / 1000.0
        );
    }

    pub fn outcome(&self, outcome: &BatchOutcome, persisted: bool) {
        for report in &outcome.reports {
            self.report(report);
        }
        self.summary(&outcome.summary);

        if !persisted {
            self.warning("Results were not stored (--no-persist)");
            return;
        }
        if outcome.fully_persisted() {
            self.success(&format!("Stored {} rows", outcome.rows_persisted));
        } else {
            for failure in &outcome.persistence_failures {
                self.error(&format!(
                    "Not stored \"{}\" after {} attempt(s): {}",
                    failure.query, failure.error.attempts, failure.error.message
                ));
            }
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

fn provider_line(result: &ProviderResult) -> String {
    let name = format!("{:<11}", result.provider.as_str());
    match result.error() {
        Some(error) => format!(
            "{} {} {} ({} ms)",
            style("✗").red(),
            name,
            style(format!("{}: {}", error.kind, error.message)).red(),
            result.latency_ms
        ),
        None => {
            let rank = result
                .rank()
                .and_then(|r| r.position.map(|p| format!(", rank #{} via {}", p, r.method.as_str())))
                .unwrap_or_default();
            format!(
                "{} {} {} match(es){} ({} ms)",
                style("✓").green(),
                name,
                result.matches().len(),
                rank,
                result.latency_ms
            )
        }
    }
}
