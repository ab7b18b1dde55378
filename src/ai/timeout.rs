//! Timeout Helpers
//!
//! Wraps async operations in `tokio::time::timeout` and converts an elapsed
//! deadline into `MonitorError::Timeout`. Dropping the timed-out future
//! cancels only that operation.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::with_timeout;
//!
//! let rows = with_timeout(
//!     Duration::from_secs(10),
//!     async { store.read_rows("Sheet1").await },
//!     "read worksheet"
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::types::{MonitorError, Result};

/// Execute an async operation with a timeout
///
/// Returns a timeout error if the operation doesn't complete within the specified duration.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(MonitorError::timeout(operation_name, timeout)),
    }
}

/// Execute an async operation with a timeout, wrapping non-`Result` outputs
pub async fn with_timeout_map<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(MonitorError::timeout(operation_name, timeout)),
    }
}
