/// Error Sink Module
///
/// The ergonomic layer does not return errors. Every failure is handed to the
/// sink's current callback together with the statement and its arguments,
/// which keeps failure policy (log, count, escalate) out of call sites.
///
/// Each `Sql` instance owns its own sink. Replacing the callback is safe at any
/// time, but operations already in flight may still report to the previous
/// callback; swap it during setup when the distinction matters.

use crate::core::SqlError;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::error;

/// Callback invoked with (query, rendered args, error)
pub type ErrorCallback = Arc<dyn Fn(&str, &[String], &SqlError) + Send + Sync>;

/// Wraps a closure as an [`ErrorCallback`]
pub fn on_error<F>(f: F) -> ErrorCallback
where
    F: Fn(&str, &[String], &SqlError) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Default policy: log the failure and carry on
pub fn log_error(query: &str, args: &[String], err: &SqlError) {
    error!(query, ?args, error = %err, "sql operation failed");
}

fn default_callback() -> ErrorCallback {
    Arc::new(log_error)
}

/// A single replaceable error callback
pub struct ErrorSink {
    slot: RwLock<ErrorCallback>,
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSink").finish_non_exhaustive()
    }
}

impl Default for ErrorSink {
    fn default() -> Self {
        ErrorSink::new(None)
    }
}

impl ErrorSink {
    /// Creates a sink; `None` installs [`log_error`]
    pub fn new(callback: Option<ErrorCallback>) -> Self {
        ErrorSink {
            slot: RwLock::new(callback.unwrap_or_else(default_callback)),
        }
    }

    /// Replaces the callback; `None` restores the default
    pub fn set(&self, callback: Option<ErrorCallback>) {
        let callback = callback.unwrap_or_else(default_callback);
        let mut slot = self.slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = callback;
    }

    /// Hands a failure to the current callback.
    ///
    /// The slot lock is released before the callback runs, so a callback may
    /// itself replace the sink.
    pub fn report(&self, query: &str, args: &[String], err: &SqlError) {
        let callback = {
            let slot = self.slot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(&slot)
        };
        callback(query, args, err);
    }
}
