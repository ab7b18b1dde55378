//! Database Layer with Connection Pooling and Safe Transactions
//!
//! SQLite backing for the local worksheet store:
//! - Connection pooling via r2d2 for concurrent access
//! - Panic-safe transactions with automatic rollback
//! - WAL mode so readers never block the single writer

use std::path::Path;
use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};

use crate::types::{MonitorError, Result, ResultExt};

/// Shared database handle for async contexts.
pub type SharedDatabase = Arc<Database>;

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version, stored in `PRAGMA user_version`
const SCHEMA_VERSION: u32 = 1;

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_size: u32,
    pub min_idle: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        // Writes are serialized by the sink; a few readers is plenty
        Self {
            max_size: 4,
            min_idle: 1,
            connection_timeout_secs: 30,
        }
    }
}

/// Thread-safe database with connection pooling.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open (creating parent directories) and initialize the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| MonitorError::Storage(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database for testing or dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        // One connection: each in-memory connection is its own database
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| MonitorError::Storage(format!("Failed to create in-memory pool: {}", e)))?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            MonitorError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize database schema")?;

        let current_version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);
        if current_version > SCHEMA_VERSION {
            return Err(MonitorError::Storage(format!(
                "Database schema version {} is newer than supported version {}",
                current_version, SCHEMA_VERSION
            )));
        }
        if current_version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .with_context("Failed to set schema version")?;
        }
        Ok(())
    }

    /// Execute a function within a panic-safe database transaction.
    ///
    /// If the closure fails or panics, the transaction is rolled back and an
    /// error is returned instead of poisoning the connection pool.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + std::panic::UnwindSafe,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&tx)));

        match result {
            Ok(Ok(value)) => {
                tx.commit()?;
                Ok(value)
            }
            // Rolled back on drop
            Ok(Err(e)) => Err(e),
            Err(panic_payload) => {
                let panic_msg = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());

                tracing::error!("Transaction panicked: {}", panic_msg);
                Err(MonitorError::Storage(format!(
                    "Transaction panicked: {}",
                    panic_msg
                )))
            }
        }
    }

    // =========================================================================
    // Worksheets
    // =========================================================================

    /// Create the worksheet with `headers` unless it already exists.
    /// Returns true when it was created.
    pub fn ensure_worksheet(&self, name: &str, headers: &[&str]) -> Result<bool> {
        let headers_json = serde_json::to_string(headers)?;
        let now = chrono::Utc::now().to_rfc3339();

        let inserted = self.conn()?.execute(
            "INSERT OR IGNORE INTO worksheets (name, headers, created_at) VALUES (?1, ?2, ?3)",
            params![name, headers_json, now],
        )?;

        if inserted > 0 {
            tracing::info!(worksheet = name, "Created worksheet");
        }
        Ok(inserted > 0)
    }

    pub fn worksheet_headers(&self, name: &str) -> Result<Option<Vec<String>>> {
        let raw: Option<String> = self
            .conn()?
            .query_row(
                "SELECT headers FROM worksheets WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|json| serde_json::from_str(&json).map_err(MonitorError::from))
            .transpose()
    }

    /// Append all rows in one transaction
    pub fn append_rows(&self, name: &str, rows: &[Vec<String>]) -> Result<usize> {
        let encoded: Vec<String> = rows
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<_, _>>()?;
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.transaction(move |tx| {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM worksheets WHERE name = ?1)",
                params![name],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(MonitorError::Storage(format!(
                    "worksheet '{}' does not exist",
                    name
                )));
            }

            let mut stmt = tx.prepare_cached(
                "INSERT INTO sheet_rows (worksheet, cells, appended_at) VALUES (?1, ?2, ?3)",
            )?;
            for cells in &encoded {
                stmt.execute(params![name, cells, now])?;
            }
            Ok(encoded.len())
        })
    }

    /// Data rows of a worksheet in append order
    pub fn read_rows(&self, name: &str) -> Result<Vec<Vec<String>>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT cells FROM sheet_rows WHERE worksheet = ?1 ORDER BY id")?;
        let raw = stmt
            .query_map(params![name], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.iter()
            .map(|json| serde_json::from_str(json).map_err(MonitorError::from))
            .collect()
    }

    pub fn row_count(&self, name: &str) -> Result<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM sheet_rows WHERE worksheet = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Cheap liveness probe
    pub fn ping(&self) -> Result<()> {
        self.conn()?.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}
