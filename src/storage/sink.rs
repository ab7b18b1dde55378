//! Result Sink
//!
//! Appends each `QueryReport` to the row store as one contiguous block,
//! retrying transient failures with bounded exponential backoff.
//!
//! Persisting is not idempotent: persisting the same report twice stores it
//! twice. Callers that resubmit after an ambiguous failure should check the
//! worksheet first.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::row::{HEADERS, SheetRow, rows_for_report};
use super::{SharedStore, create_store};
use crate::config::StorageConfig;
use crate::constants::sink::BACKOFF_FACTOR;
use crate::types::{PersistenceError, QueryReport, Result};

/// Bounded exponential backoff for transient store failures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub limit: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            limit: config.retry_limit,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_secs(config.retry_max_delay_secs),
        }
    }

    /// No waiting between attempts; for tests and dry runs
    pub fn immediate(limit: usize) -> Self {
        Self {
            limit,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay.max(self.base_delay))
            .with_factor(BACKOFF_FACTOR)
            .with_max_times(self.limit)
            .with_jitter()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

/// Proof that a report reached the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistReceipt {
    pub query_id: Uuid,
    pub worksheet: String,
    pub rows_written: usize,
    /// Write attempts, including the successful one
    pub attempts: u32,
}

#[derive(Debug, Default)]
struct SinkState {
    worksheet_ready: bool,
}

pub struct ResultSink {
    store: SharedStore,
    worksheet: String,
    policy: RetryPolicy,
    state: Mutex<SinkState>,
}

impl ResultSink {
    pub fn new(store: SharedStore, worksheet: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            store,
            worksheet: worksheet.into(),
            policy,
            state: Mutex::new(SinkState::default()),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Ok(Self::new(
            create_store(config)?,
            config.worksheet_name.clone(),
            RetryPolicy::from_config(config),
        ))
    }

    pub fn worksheet(&self) -> &str {
        &self.worksheet
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Append one row per provider result.
    ///
    /// All rows go out in a single store call, so a report is either fully
    /// stored or absent. Concurrent calls are serialized. Permanent errors
    /// are returned after one attempt, transient ones once the retry limit
    /// is exhausted.
    #[instrument(skip_all, fields(query_id = %report.query().id, worksheet = %self.worksheet))]
    pub async fn persist(&self, report: &QueryReport) -> std::result::Result<PersistReceipt, PersistenceError> {
        // One writer at a time, so reports land in the order they were handed in
        let mut state = self.state.lock().await;
        self.ensure_worksheet(&mut state).await?;

        let cells: Vec<Vec<String>> = rows_for_report(report)
            .iter()
            .map(SheetRow::to_cells)
            .collect();

        if cells.is_empty() {
            return Ok(PersistReceipt {
                query_id: report.query().id,
                worksheet: self.worksheet.clone(),
                rows_written: 0,
                attempts: 0,
            });
        }

        let store = &self.store;
        let worksheet = self.worksheet.as_str();
        let rows = &cells;
        let ((), attempts) = self
            .retrying("append", move || async move {
                store.append_rows(worksheet, rows).await
            })
            .await?;

        debug!(rows = cells.len(), attempts, "Report persisted");
        Ok(PersistReceipt {
            query_id: report.query().id,
            worksheet: self.worksheet.clone(),
            rows_written: cells.len(),
            attempts,
        })
    }

    /// Stored rows decoded back into `SheetRow`s
    pub async fn load_rows(&self) -> Result<Vec<SheetRow>> {
        let raw = self.store.read_rows(&self.worksheet).await?;
        raw.iter().map(|cells| SheetRow::from_cells(cells)).collect()
    }

    pub async fn health_check(&self) -> std::result::Result<(), PersistenceError> {
        self.store.health_check().await
    }

    async fn ensure_worksheet(
        &self,
        state: &mut SinkState,
    ) -> std::result::Result<(), PersistenceError> {
        if state.worksheet_ready {
            return Ok(());
        }

        let store = &self.store;
        let worksheet = self.worksheet.as_str();
        self.retrying("ensure_worksheet", move || async move {
            store.ensure_worksheet(worksheet, &HEADERS).await
        })
        .await?;

        state.worksheet_ready = true;
        Ok(())
    }

    /// Run `op` under the retry policy, returning its value and the number
    /// of attempts made. Errors carry the attempt count.
    async fn retrying<T, F, Fut>(
        &self,
        operation: &'static str,
        mut op: F,
    ) -> std::result::Result<(T, u32), PersistenceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, PersistenceError>>,
    {
        let attempts = AtomicU32::new(0);
        let counted = || {
            attempts.fetch_add(1, Ordering::Relaxed);
            op()
        };

        let result = counted
            .retry(self.policy.backoff())
            .sleep(tokio::time::sleep)
            .when(|e: &PersistenceError| e.is_transient())
            .notify(|e: &PersistenceError, delay: Duration| {
                warn!(operation, error = %e.message, ?delay, "Transient store failure, retrying");
            })
            .await;

        let attempts = attempts.load(Ordering::Relaxed);
        match result {
            Ok(value) => Ok((value, attempts)),
            Err(e) => {
                warn!(operation, attempts, error = %e.message, "Store write failed");
                Err(e.with_attempts(attempts))
            }
        }
    }
}
