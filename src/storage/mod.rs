//! Result storage: spreadsheet-shaped row stores and the retrying sink.

pub mod database;
pub mod memory;
pub mod row;
pub mod sheets;
pub mod sink;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{StorageBackend, StorageConfig};
use crate::types::{PersistenceError, Result};

pub use database::{Database, PoolConfig, SharedDatabase};
pub use memory::MemoryStore;
pub use row::{HEADERS, ReportDigest, SheetRow, rows_for_report};
pub use sheets::GoogleSheetsStore;
pub use sink::{PersistReceipt, ResultSink, RetryPolicy};
pub use sqlite::SqliteSheetStore;

/// A spreadsheet-like destination for report rows.
///
/// `append_rows` must be all-or-nothing for the rows it is given: either
/// every row lands as one contiguous block or none do.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Create the worksheet with a header row if it does not exist yet
    async fn ensure_worksheet(&self, worksheet: &str, headers: &[&str])
    -> std::result::Result<(), PersistenceError>;

    async fn append_rows(
        &self,
        worksheet: &str,
        rows: &[Vec<String>],
    ) -> std::result::Result<(), PersistenceError>;

    /// Data rows in append order, header excluded
    async fn read_rows(&self, worksheet: &str)
    -> std::result::Result<Vec<Vec<String>>, PersistenceError>;

    async fn health_check(&self) -> std::result::Result<(), PersistenceError>;

    /// Human-readable location, for logs and status output
    fn describe(&self) -> String;
}

pub type SharedStore = Arc<dyn RowStore>;

/// Open the configured backend
pub fn create_store(config: &StorageConfig) -> Result<SharedStore> {
    match config.backend {
        StorageBackend::GoogleSheets => Ok(Arc::new(GoogleSheetsStore::from_config(config)?)),
        StorageBackend::Sqlite => Ok(Arc::new(SqliteSheetStore::open(&config.sqlite_path)?)),
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
