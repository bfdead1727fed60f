use crate::event::{FieldValue, Level, ERROR_KEY};
use crate::event_adapter::{EventAdapter, EventSink};
use crate::log_bridge::LogBridge;
use crate::tests::test_utils::RecordingProvider;
use crate::tracing_bridge::EventLayer;
use log::kv::Value;
use log::Log;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;

fn shared_adapter(provider: &RecordingProvider) -> Arc<dyn EventSink> {
    Arc::new(EventAdapter::new(provider, "test-project", "app-log", "", "", "").unwrap())
}

#[test]
fn log_record_becomes_event_with_fields() {
    let provider = RecordingProvider::new();
    let bridge = LogBridge::new(shared_adapter(&provider));

    let kvs: &[(&str, &str)] = &[("user", "ada"), ("route", "/orders")];
    bridge.log(
        &log::Record::builder()
            .level(log::Level::Info)
            .target("app::orders")
            .args(format_args!("order {} placed", 17))
            .key_values(&kvs)
            .build(),
    );

    let recorded = provider.recorded();
    assert_eq!(recorded.entries.len(), 1);
    let payload = &recorded.entries[0].payload;
    assert_eq!(payload.message, "order 17 placed");
    assert_eq!(payload.fields.get("user"), Some(&FieldValue::from("ada")));
    assert_eq!(payload.fields.get("route"), Some(&FieldValue::from("/orders")));
    assert!(recorded.reports.is_empty());
}

#[test]
fn log_error_value_is_extracted_and_escalated() {
    let provider = RecordingProvider::new();
    let bridge = LogBridge::new(shared_adapter(&provider));

    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume");
    let kvs: &[(&str, Value<'_>)] = &[(ERROR_KEY, Value::from_dyn_error(&io_err))];
    bridge.log(
        &log::Record::builder()
            .level(log::Level::Error)
            .target("app::storage")
            .args(format_args!("snapshot failed"))
            .key_values(&kvs)
            .build(),
    );

    let recorded = provider.recorded();
    assert_eq!(
        recorded.entries[0].payload.fields.get(ERROR_KEY),
        Some(&FieldValue::String("read-only volume".into()))
    );
    assert_eq!(recorded.reports.len(), 1);
    assert_eq!(recorded.reports[0].error, "read-only volume");
}

#[test]
fn log_bridge_report_stack_starts_below_the_bridge() {
    let provider = RecordingProvider::new();
    let bridge = LogBridge::new(shared_adapter(&provider));

    bridge.log(
        &log::Record::builder()
            .level(log::Level::Error)
            .target("app::billing")
            .args(format_args!("invoice rejected"))
            .build(),
    );

    let recorded = provider.recorded();
    let stack = recorded.reports[0].stack_trace_text();
    for leaked in [
        "as log::Log",
        "sigil_loghook::",
        "log_bridge.rs",
        "event_adapter.rs",
        "stack_trace.rs",
    ] {
        assert!(!stack.contains(leaked), "{leaked} leaked into:\n{stack}");
    }
}

#[test]
fn log_bridge_ignores_own_records() {
    let provider = RecordingProvider::new();
    let bridge = LogBridge::new(shared_adapter(&provider));

    let metadata = log::Metadata::builder()
        .level(log::Level::Error)
        .target("sigil_loghook::telemetry_sink")
        .build();
    assert!(!bridge.enabled(&metadata));

    bridge.log(
        &log::Record::builder()
            .level(log::Level::Error)
            .target("sigil_loghook::telemetry_sink")
            .args(format_args!("internal"))
            .build(),
    );
    assert!(provider.recorded().entries.is_empty());
}

#[test]
fn log_levels_map_onto_host_levels() {
    use crate::log_bridge::map_level;
    assert_eq!(map_level(log::Level::Error), Level::Error);
    assert_eq!(map_level(log::Level::Warn), Level::Warn);
    assert_eq!(map_level(log::Level::Info), Level::Info);
    assert_eq!(map_level(log::Level::Debug), Level::Debug);
    assert_eq!(map_level(log::Level::Trace), Level::Trace);
}

#[test]
fn tracing_event_becomes_event() {
    let provider = RecordingProvider::new();
    let subscriber =
        tracing_subscriber::registry().with(EventLayer::new(shared_adapter(&provider)));

    tracing::subscriber::with_default(subscriber, || {
        tracing::warn!(target: "app::cache", hits = 3u64, region = "eu", "cache nearly full");
    });

    let recorded = provider.recorded();
    assert_eq!(recorded.entries.len(), 1);
    let payload = &recorded.entries[0].payload;
    assert_eq!(payload.message, "cache nearly full");
    assert_eq!(
        payload.fields.get("hits"),
        Some(&FieldValue::Other(serde_json::json!(3)))
    );
    assert_eq!(payload.fields.get("region"), Some(&FieldValue::from("eu")));
    assert!(recorded.reports.is_empty());
}

#[test]
fn tracing_error_field_is_extracted_and_escalated() {
    let provider = RecordingProvider::new();
    let subscriber =
        tracing_subscriber::registry().with(EventLayer::new(shared_adapter(&provider)));

    let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(
            target: "app::export",
            error = &io_err as &(dyn std::error::Error + 'static),
            "export aborted"
        );
    });

    let recorded = provider.recorded();
    assert_eq!(
        recorded.entries[0].payload.fields.get(ERROR_KEY),
        Some(&FieldValue::String("disk full".into()))
    );
    assert_eq!(recorded.reports.len(), 1);
    assert_eq!(recorded.reports[0].error, "disk full");
}

#[test]
fn tracing_layer_skips_own_target() {
    let provider = RecordingProvider::new();
    let subscriber =
        tracing_subscriber::registry().with(EventLayer::new(shared_adapter(&provider)));

    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(target: "sigil_loghook::telemetry_sink", "writer stopped");
    });

    assert!(provider.recorded().entries.is_empty());
}
