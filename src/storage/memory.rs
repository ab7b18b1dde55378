//! In-process row store for dry runs and tests.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::RowStore;
use crate::types::PersistenceError;

#[derive(Debug, Default, Clone)]
struct Worksheet {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    sheets: RwLock<BTreeMap<String, Worksheet>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Worksheet>> {
        self.sheets.read().unwrap_or_else(|poisoned| {
            tracing::error!("MemoryStore RwLock poisoned on read, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Worksheet>> {
        self.sheets.write().unwrap_or_else(|poisoned| {
            tracing::error!("MemoryStore RwLock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn headers(&self, worksheet: &str) -> Option<Vec<String>> {
        self.read().get(worksheet).map(|w| w.headers.clone())
    }

    pub fn row_count(&self, worksheet: &str) -> usize {
        self.read().get(worksheet).map(|w| w.rows.len()).unwrap_or(0)
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn ensure_worksheet(
        &self,
        worksheet: &str,
        headers: &[&str],
    ) -> Result<(), PersistenceError> {
        let mut sheets = self.write();
        let sheet = sheets.entry(worksheet.to_string()).or_default();
        if sheet.headers.is_empty() {
            sheet.headers = headers.iter().map(|h| h.to_string()).collect();
        }
        Ok(())
    }

    async fn append_rows(
        &self,
        worksheet: &str,
        rows: &[Vec<String>],
    ) -> Result<(), PersistenceError> {
        let mut sheets = self.write();
        let sheet = sheets.get_mut(worksheet).ok_or_else(|| {
            PersistenceError::permanent(format!("worksheet '{}' does not exist", worksheet))
        })?;
        sheet.rows.extend(rows.iter().cloned());
        Ok(())
    }

    async fn read_rows(&self, worksheet: &str) -> Result<Vec<Vec<String>>, PersistenceError> {
        Ok(self
            .read()
            .get(worksheet)
            .map(|w| w.rows.clone())
            .unwrap_or_default())
    }

    async fn health_check(&self) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory store".to_string()
    }
}
