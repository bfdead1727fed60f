//! `tracing` integration
//!
//! [`EventLayer`] is a `tracing_subscriber` layer that turns every tracing
//! event into a [`LogEvent`] for an [`EventSink`]. Events emitted by this
//! crate itself are skipped so internal diagnostics cannot loop back.

use crate::event::{ErrorValue, FieldValue, Fields, Level, LogEvent};
use crate::event_adapter::EventSink;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

pub struct EventLayer {
    sink: Arc<dyn EventSink>,
}

impl EventLayer {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }
}

pub fn map_level(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warn,
        tracing::Level::INFO => Level::Info,
        tracing::Level::DEBUG => Level::Debug,
        _ => Level::Trace,
    }
}

impl<S: Subscriber> Layer<S> for EventLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(OWN_TARGET) {
            return;
        }

        let level = map_level(metadata.level());
        if !self.sink.accepted_levels().contains(&level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut log_event = LogEvent::new(level, visitor.message.unwrap_or_default());
        log_event.fields = visitor.fields;
        let _ = self.sink.handle(&log_event);
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Fields,
}

impl FieldVisitor {
    fn text(&mut self, field: &Field, text: String) {
        if field.name() == "message" {
            self.message = Some(text);
        } else {
            self.fields
                .insert(field.name().to_string(), FieldValue::String(text));
        }
    }

    fn other(&mut self, field: &Field, value: serde_json::Value) {
        self.fields
            .insert(field.name().to_string(), FieldValue::Other(value));
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.text(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.other(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.other(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.other(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.other(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields.insert(
            field.name().to_string(),
            FieldValue::Error(ErrorValue::captured(value)),
        );
    }
}
