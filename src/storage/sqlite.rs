//! Local worksheet store on SQLite.
//!
//! rusqlite is blocking, so every call hops onto the blocking pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::RowStore;
use super::database::{Database, SharedDatabase};
use crate::types::{MonitorError, PersistenceError, Result};

pub struct SqliteSheetStore {
    db: SharedDatabase,
    location: String,
}

impl SqliteSheetStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let location = path.as_ref().display().to_string();
        Ok(Self {
            db: Arc::new(Database::open(path)?),
            location,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            db: Arc::new(Database::open_in_memory()?),
            location: ":memory:".to_string(),
        })
    }

    async fn blocking<T, F>(&self, f: F) -> std::result::Result<T, PersistenceError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| PersistenceError::transient(format!("storage task failed: {}", e)))?
            .map_err(into_persistence)
    }
}

fn into_persistence(err: MonitorError) -> PersistenceError {
    match err {
        MonitorError::Database(e) => PersistenceError::from(e),
        // Pool exhaustion and connection timeouts clear up on their own
        MonitorError::Storage(msg) if msg.contains("acquire") => PersistenceError::transient(msg),
        other => PersistenceError::permanent(other.to_string()),
    }
}

#[async_trait]
impl RowStore for SqliteSheetStore {
    async fn ensure_worksheet(
        &self,
        worksheet: &str,
        headers: &[&str],
    ) -> std::result::Result<(), PersistenceError> {
        let name = worksheet.to_string();
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        self.blocking(move |db| {
            let refs: Vec<&str> = headers.iter().map(String::as_str).collect();
            db.ensure_worksheet(&name, &refs).map(|_| ())
        })
        .await
    }

    async fn append_rows(
        &self,
        worksheet: &str,
        rows: &[Vec<String>],
    ) -> std::result::Result<(), PersistenceError> {
        let name = worksheet.to_string();
        let rows = rows.to_vec();
        self.blocking(move |db| db.append_rows(&name, &rows).map(|_| ()))
            .await
    }

    async fn read_rows(
        &self,
        worksheet: &str,
    ) -> std::result::Result<Vec<Vec<String>>, PersistenceError> {
        let name = worksheet.to_string();
        self.blocking(move |db| db.read_rows(&name)).await
    }

    async fn health_check(&self) -> std::result::Result<(), PersistenceError> {
        self.blocking(|db| db.ping()).await
    }

    fn describe(&self) -> String {
        format!("sqlite ({})", self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSheetStore::open(dir.path().join("results.db")).unwrap();

        store.ensure_worksheet("Results", &["a", "b"]).await.unwrap();
        store
            .append_rows("Results", &[vec!["1".to_string(), "x".to_string()]])
            .await
            .unwrap();

        let rows = store.read_rows("Results").await.unwrap();
        assert_eq!(rows, vec![vec!["1".to_string(), "x".to_string()]]);
        assert!(store.health_check().await.is_ok());
        assert!(store.describe().starts_with("sqlite ("));
    }

    #[tokio::test]
    async fn test_missing_worksheet_is_permanent() {
        let store = SqliteSheetStore::in_memory().unwrap();
        let err = store
            .append_rows("Nope", &[vec!["1".to_string()]])
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }
}
