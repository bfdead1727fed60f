// log_bridge.rs
// Purpose: Register an event sink as the global `log` facade backend

use crate::event::{ErrorValue, FieldValue, Fields, Level, LogEvent};
use crate::event_adapter::EventSink;
use log::kv::{self, VisitSource};
use std::sync::Arc;

/// Target prefix of this crate's own records; those never reach the sink.
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// `log::Log` implementation forwarding every record to an [`EventSink`].
pub struct LogBridge {
    sink: Arc<dyn EventSink>,
}

impl LogBridge {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Install as the process-wide logger, accepting every level.
    pub fn install(sink: Arc<dyn EventSink>) -> Result<(), log::SetLoggerError> {
        log::set_boxed_logger(Box::new(Self::new(sink)))?;
        log::set_max_level(log::LevelFilter::Trace);
        Ok(())
    }

    /// Translate a `log` record into a log event.
    pub fn to_event(record: &log::Record<'_>) -> LogEvent {
        let mut collector = FieldCollector::default();
        // A failing source only loses the remaining key/values.
        let _ = record.key_values().visit(&mut collector);

        let mut event = LogEvent::new(map_level(record.level()), record.args().to_string());
        event.fields = collector.fields;
        event
    }
}

pub fn map_level(level: log::Level) -> Level {
    match level {
        log::Level::Error => Level::Error,
        log::Level::Warn => Level::Warn,
        log::Level::Info => Level::Info,
        log::Level::Debug => Level::Debug,
        log::Level::Trace => Level::Trace,
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        !metadata.target().starts_with(OWN_TARGET)
            && self
                .sink
                .accepted_levels()
                .contains(&map_level(metadata.level()))
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = self.sink.handle(&Self::to_event(record));
    }

    fn flush(&self) {
        self.sink.drain();
    }
}

#[derive(Default)]
struct FieldCollector {
    fields: Fields,
}

impl<'kvs> VisitSource<'kvs> for FieldCollector {
    fn visit_pair(&mut self, key: kv::Key<'kvs>, value: kv::Value<'kvs>) -> Result<(), kv::Error> {
        self.fields.insert(key.as_str().to_string(), field_value(&value));
        Ok(())
    }
}

fn field_value(value: &kv::Value<'_>) -> FieldValue {
    if let Some(err) = value.to_borrowed_error() {
        return FieldValue::Error(ErrorValue::captured(err));
    }
    if let Some(text) = value.to_borrowed_str() {
        return FieldValue::String(text.to_string());
    }
    if let Some(flag) = value.to_bool() {
        return FieldValue::Other(flag.into());
    }
    if let Some(n) = value.to_i64() {
        return FieldValue::Other(n.into());
    }
    if let Some(n) = value.to_u64() {
        return FieldValue::Other(n.into());
    }
    if let Some(n) = value.to_f64() {
        return FieldValue::Other(n.into());
    }
    FieldValue::String(value.to_string())
}
