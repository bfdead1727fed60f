//! Downstream collaborators of the event adapter
//!
//! The adapter never talks to a transport directly. It asks a
//! [`SinkProvider`] for one [`LogSink`] and one [`ErrorSink`] at construction
//! and hands them finished records afterwards. Sinks own buffering, delivery,
//! retry and flushing; submissions must return without waiting on the remote
//! side.
//!
//! # Implementation Requirements
//!
//! - Sinks must be `Send + Sync`; the adapter is shared across threads and
//!   calls them concurrently without locking.
//! - `log` and `report` never fail outward. Log sink failures are absorbed;
//!   error sink failures go to [`ErrorSinkConfig::on_error`].
//! - `close` flushes whatever is buffered and releases the sink.

use crate::entries::{ErrorReport, LogEntry};
use crate::errors::{HookError, HookResult};
use crate::instance::MonitoredResource;
use std::fmt;
use std::sync::Arc;

/// Callback an error sink uses to report local delivery failures.
pub type ErrorCallback = Arc<dyn Fn(&HookError) + Send + Sync>;

/// Sink for structured log records.
pub trait LogSink: Send + Sync {
    /// Queue one entry for delivery.
    fn log(&self, entry: LogEntry);

    /// Flush buffered entries and release the sink.
    fn close(&self) -> HookResult<()>;
}

/// Sink for error reports.
pub trait ErrorSink: Send + Sync {
    /// Queue one report for delivery.
    fn report(&self, report: ErrorReport);

    /// Flush buffered reports and release the sink.
    fn close(&self) -> HookResult<()>;
}

/// Settings for establishing an error sink.
#[derive(Clone)]
pub struct ErrorSinkConfig {
    pub service_name: String,
    pub on_error: ErrorCallback,
}

impl ErrorSinkConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            on_error: Arc::new(stderr_diagnostic),
        }
    }

    pub fn with_on_error(mut self, on_error: ErrorCallback) -> Self {
        self.on_error = on_error;
        self
    }
}

impl fmt::Debug for ErrorSinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSinkConfig")
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

/// Default failure callback: report on stderr and carry on.
pub fn stderr_diagnostic(err: &HookError) {
    eprintln!("Could not log error: {}", err);
}

/// Establishes sink handles scoped to a project.
pub trait SinkProvider {
    /// Open a log sink writing to `log_name`. `resource` overrides the
    /// provider's default resource when present.
    fn log_sink(
        &self,
        project_id: &str,
        log_name: &str,
        resource: Option<&MonitoredResource>,
    ) -> HookResult<Box<dyn LogSink>>;

    /// Open an error sink for the project.
    fn error_sink(&self, project_id: &str, config: ErrorSinkConfig)
        -> HookResult<Box<dyn ErrorSink>>;
}
