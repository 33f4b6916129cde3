//! Shared error handling for fallible operations.
//!
//! Components wrap their I/O in [`with_error_handling`] instead of repeating
//! the log-then-propagate-or-default dance at every call site.

use std::future::Future;

use tracing::error;

use crate::error::{Error, Result};

/// What to do once a failure has been logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnError<T> {
    /// Return the error to the caller.
    Propagate,
    /// Swallow the error and return this value instead.
    Fallback(T),
}

/// Runs `operation`, logging any failure under `name` and applying `policy`.
pub async fn with_error_handling<T, F>(name: &'static str, policy: OnError<T>, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match operation.await {
        Ok(value) => Ok(value),
        Err(e) => {
            error!(operation = name, error = %e, "Operation failed");
            match policy {
                OnError::Propagate => Err(e),
                OnError::Fallback(value) => Ok(value),
            }
        }
    }
}

/// Rejects an empty collection argument.
pub fn ensure_not_empty<T>(items: &[T], parameter: &str) -> Result<()> {
    if items.is_empty() {
        return Err(Error::validation(format!("'{parameter}' must not be empty")));
    }
    Ok(())
}
