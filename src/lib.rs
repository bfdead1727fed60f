//! Library root for the `sigil_loghook` crate
//! Forwards host log events to a log sink and escalates errors to an error sink

// Core error handling
pub mod errors;

// Event model
pub mod entries;
pub mod event;
pub mod instance;

// Adapter & collaborators
pub mod event_adapter;
pub mod sinks;
pub mod stack_trace;

// Concrete JSON-lines sinks
pub mod telemetry_sink;

// Host facility bridges
pub mod log_bridge;
pub mod tracing_bridge;

// Configuration
pub mod config_loader;


pub use entries::{ErrorReport, LogEntry, OutboundLogPayload};
pub use errors::{HookError, HookResult};
pub use event::{ErrorValue, FieldValue, Level, LogEvent, Severity, ERROR_KEY};
pub use event_adapter::{AdapterOptions, EventAdapter, EventSink};
pub use instance::{InstanceMetadata, MonitoredResource};
pub use sinks::{ErrorSink, ErrorSinkConfig, LogSink, SinkProvider};
