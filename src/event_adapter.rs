//! Event adapter: translates host log events into log records and error reports
//!
//! The adapter is the single point every host facility bridge calls into. It
//! owns a log sink, an error sink and the static instance metadata; all of it
//! is read-only after construction, so `handle` can be called from any number
//! of threads at once.
//!
//! Per event the adapter:
//!
//! 1. replaces an error object stored under [`ERROR_KEY`] with its message text,
//! 2. builds an [`OutboundLogPayload`] sharing the instance metadata,
//! 3. maps the host level to a [`Severity`],
//! 4. queues a [`LogEntry`] on the log sink,
//! 5. for severities at or above [`Severity::ESCALATION_THRESHOLD`], queues an
//!    [`ErrorReport`] with a filtered stack trace on the error sink.
//!
//! Handling never fails outward. Delivery problems are the sinks' business.

use crate::entries::{ErrorReport, LogEntry, OutboundLogPayload};
use crate::errors::HookResult;
use crate::event::{FieldValue, Fields, Level, LogEvent, ERROR_KEY};
use crate::instance::InstanceMetadata;
use crate::sinks::{ErrorCallback, ErrorSink, ErrorSinkConfig, LogSink, SinkProvider};
use crate::stack_trace::StackCapture;
use std::sync::Arc;
use tracing::{info, warn};

/// Capability a host facility needs from the thing it hands events to.
pub trait EventSink: Send + Sync {
    /// Levels this sink wants to receive.
    fn accepted_levels(&self) -> &[Level];

    /// Process one event.
    fn handle(&self, event: &LogEvent) -> HookResult<()>;

    /// Wait for queued work. Sinks flush on their own, so this may do nothing.
    fn drain(&self) {}
}

/// Optional construction settings beyond the required identifiers.
#[derive(Clone, Default)]
pub struct AdapterOptions {
    /// Service name for the error sink; defaults to the project identifier.
    pub service_name: Option<String>,
    /// Replaces the default stderr failure callback of the error sink.
    pub on_error: Option<ErrorCallback>,
    pub stack_capture: StackCapture,
}

pub struct EventAdapter {
    log_sink: Box<dyn LogSink>,
    error_sink: Box<dyn ErrorSink>,
    instance: Option<Arc<InstanceMetadata>>,
    stack_capture: StackCapture,
}

impl EventAdapter {
    /// Establish both sinks for `project_id` and build the adapter.
    ///
    /// The instance identifiers collapse to "no metadata" when all three are
    /// empty. Construction is all-or-nothing: if either sink cannot be
    /// established no adapter is returned.
    pub fn new<P: SinkProvider + ?Sized>(
        provider: &P,
        project_id: &str,
        log_name: &str,
        instance_id: &str,
        instance_name: &str,
        instance_zone: &str,
    ) -> HookResult<Self> {
        Self::with_options(
            provider,
            project_id,
            log_name,
            InstanceMetadata::from_parts(instance_id, instance_name, instance_zone),
            AdapterOptions::default(),
        )
    }

    pub fn with_options<P: SinkProvider + ?Sized>(
        provider: &P,
        project_id: &str,
        log_name: &str,
        instance: Option<InstanceMetadata>,
        options: AdapterOptions,
    ) -> HookResult<Self> {
        let resource = instance.as_ref().map(InstanceMetadata::resource);
        let log_sink = provider.log_sink(project_id, log_name, resource.as_ref())?;

        let mut error_config = ErrorSinkConfig::new(
            options
                .service_name
                .unwrap_or_else(|| project_id.to_string()),
        );
        if let Some(on_error) = options.on_error {
            error_config = error_config.with_on_error(on_error);
        }

        let error_sink = match provider.error_sink(project_id, error_config) {
            Ok(sink) => sink,
            Err(e) => {
                if let Err(close_err) = log_sink.close() {
                    warn!("Failed to release log sink after setup error: {}", close_err);
                }
                return Err(e);
            }
        };

        info!(
            "Event adapter ready: project={}, log={}, instance={}",
            project_id,
            log_name,
            instance.as_ref().map(|i| i.name.as_str()).unwrap_or("-")
        );

        Ok(Self {
            log_sink,
            error_sink,
            instance: instance.map(Arc::new),
            stack_capture: options.stack_capture,
        })
    }

    pub fn instance(&self) -> Option<&InstanceMetadata> {
        self.instance.as_deref()
    }

    /// Build the payload for an event, returning the text of the reserved
    /// error field when it held an error object.
    pub fn assemble_payload(&self, event: &LogEvent) -> (OutboundLogPayload, Option<String>) {
        let (fields, error) = extract_error(&event.fields);
        let payload = OutboundLogPayload {
            message: event.message.clone(),
            fields,
            instance: self.instance.clone(),
        };
        (payload, error)
    }

    /// Release both sinks. Both are always closed; the log sink's failure wins
    /// when both fail.
    pub fn close(&self) -> HookResult<()> {
        let log_result = self.log_sink.close();
        let error_result = self.error_sink.close();

        match (&log_result, &error_result) {
            (Ok(()), Ok(())) => info!("Event adapter closed"),
            _ => warn!("Event adapter closed with errors"),
        }

        log_result.and(error_result)
    }
}

impl EventSink for EventAdapter {
    fn accepted_levels(&self) -> &[Level] {
        &Level::ALL
    }

    fn handle(&self, event: &LogEvent) -> HookResult<()> {
        let (payload, error) = self.assemble_payload(event);
        let severity = event.level.severity();

        self.log_sink
            .log(LogEntry::new(payload, severity, event.timestamp));

        if severity.escalates() {
            let error = error.unwrap_or_else(|| event.message.clone());
            self.error_sink.report(ErrorReport {
                error,
                stack_trace: self.stack_capture.capture(),
            });
        }

        Ok(())
    }
}

/// Copy `fields`, replacing an error object under the reserved key by its text.
fn extract_error(fields: &Fields) -> (Fields, Option<String>) {
    let mut fields = fields.clone();
    let error = match fields.get(ERROR_KEY) {
        Some(FieldValue::Error(err)) => Some(err.message()),
        _ => None,
    };
    if let Some(text) = &error {
        fields.insert(ERROR_KEY.to_string(), FieldValue::String(text.clone()));
    }
    (fields, error)
}
