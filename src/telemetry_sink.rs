// telemetry_sink.rs
// Purpose: JSON-lines log and error sinks backed by a background writer thread

use crate::entries::{ErrorReport, LogEntry};
use crate::errors::{HookError, HookResult, SafeLock, SafeReadLock, SafeWriteLock};
use crate::instance::MonitoredResource;
use crate::sinks::{ErrorCallback, ErrorSink, ErrorSinkConfig, LogSink, SinkProvider};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tracing::{debug, warn};

/// Where a sink writes its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryTarget {
    Stdout,
    Stderr,
    File(PathBuf),
    Discard,
}

impl TelemetryTarget {
    fn open(&self) -> HookResult<Box<dyn Write + Send>> {
        match self {
            TelemetryTarget::Stdout => Ok(Box::new(io::stdout())),
            TelemetryTarget::Stderr => Ok(Box::new(io::stderr())),
            TelemetryTarget::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| HookError::io(format!("open {}", path.display()), e))?;
                Ok(Box::new(io::BufWriter::new(file)))
            }
            TelemetryTarget::Discard => Ok(Box::new(io::sink())),
        }
    }
}

impl FromStr for TelemetryTarget {
    type Err = HookError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim() {
            "" => Err(HookError::config("telemetry target cannot be empty")),
            "stdout" | "-" => Ok(TelemetryTarget::Stdout),
            "stderr" => Ok(TelemetryTarget::Stderr),
            "discard" => Ok(TelemetryTarget::Discard),
            path => Ok(TelemetryTarget::File(PathBuf::from(path))),
        }
    }
}

/// Entries a sink buffers ahead of its writer before it starts dropping them.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

type Encoder<T> = Box<dyn Fn(&T) -> serde_json::Result<Vec<u8>> + Send>;
type FailureHandler = Box<dyn Fn(HookError) + Send>;

/// Bounded queue feeding a dedicated writer thread. Submitting never touches
/// I/O and never blocks: a full queue rejects the item.
struct BufferedWriter<T> {
    name: String,
    sender: RwLock<Option<Sender<T>>>,
    worker: Mutex<Option<JoinHandle<io::Result<()>>>>,
}

impl<T: Send + 'static> BufferedWriter<T> {
    fn spawn(
        name: &str,
        target: &TelemetryTarget,
        capacity: usize,
        encode: Encoder<T>,
        on_failure: FailureHandler,
    ) -> HookResult<Self> {
        let out = target.open()?;
        let writer = Self::spawn_on(name, out, capacity, encode, on_failure)?;
        debug!("Started {} writer for {:?}", name, target);
        Ok(writer)
    }

    fn spawn_on(
        name: &str,
        out: Box<dyn Write + Send>,
        capacity: usize,
        encode: Encoder<T>,
        on_failure: FailureHandler,
    ) -> HookResult<Self> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        let worker = std::thread::Builder::new()
            .name(format!("loghook-{}", name))
            .spawn(move || write_lines(receiver, out, encode, on_failure))
            .map_err(|e| HookError::io("spawn writer thread", e))?;

        Ok(Self {
            name: name.to_string(),
            sender: RwLock::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    fn submit(&self, item: T) -> HookResult<()> {
        let sender = self.sender.safe_read()?;
        let Some(tx) = sender.as_ref() else {
            return Err(HookError::sink_closed(self.name.clone()));
        };
        tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => HookError::sink_full(self.name.clone()),
            TrySendError::Closed(_) => HookError::sink_closed(self.name.clone()),
        })
    }

    /// Disconnect, then wait for the writer to drain and flush.
    fn close(&self) -> HookResult<()> {
        drop(self.sender.safe_write()?.take());

        let worker = self.worker.safe_lock()?.take();
        let Some(worker) = worker else {
            return Ok(());
        };

        match worker.join() {
            Ok(Ok(())) => {
                debug!("Stopped {} writer", self.name);
                Ok(())
            }
            Ok(Err(e)) => Err(HookError::io(format!("flush {}", self.name), e)),
            Err(_) => Err(HookError::shutdown(
                self.name.clone(),
                "writer thread panicked",
            )),
        }
    }
}

fn write_lines<T>(
    mut receiver: Receiver<T>,
    mut out: Box<dyn Write + Send>,
    encode: Encoder<T>,
    on_failure: FailureHandler,
) -> io::Result<()> {
    while let Some(item) = receiver.blocking_recv() {
        let line = match encode(&item) {
            Ok(line) => line,
            Err(e) => {
                on_failure(HookError::serialization("encode line", e));
                continue;
            }
        };

        let written = out
            .write_all(&line)
            .and_then(|_| out.write_all(b"\n"))
            .and_then(|_| out.flush());
        if let Err(e) = written {
            on_failure(HookError::io("write line", e));
        }
    }
    out.flush()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogLine<'a> {
    log_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource: Option<&'a MonitoredResource>,
    #[serde(flatten)]
    entry: &'a LogEntry,
}

/// Log sink writing one JSON object per entry.
pub struct JsonLogSink {
    writer: BufferedWriter<LogEntry>,
    failed_writes: Arc<AtomicU64>,
}

impl JsonLogSink {
    pub fn open(
        target: &TelemetryTarget,
        log_name: &str,
        resource: Option<MonitoredResource>,
    ) -> HookResult<Self> {
        Self::with_capacity(target, log_name, resource, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        target: &TelemetryTarget,
        log_name: &str,
        resource: Option<MonitoredResource>,
        capacity: usize,
    ) -> HookResult<Self> {
        let failed_writes = Arc::new(AtomicU64::new(0));
        let log_name = log_name.to_string();

        let encode: Encoder<LogEntry> = Box::new(move |entry| {
            serde_json::to_vec(&LogLine {
                log_name: &log_name,
                resource: resource.as_ref(),
                entry,
            })
        });

        let counter = Arc::clone(&failed_writes);
        let on_failure: FailureHandler = Box::new(move |e| {
            counter.fetch_add(1, Ordering::Relaxed);
            debug!("Dropped log entry: {}", e);
        });

        Ok(Self {
            writer: BufferedWriter::spawn("log-sink", target, capacity, encode, on_failure)?,
            failed_writes,
        })
    }

    /// Entries that were dropped on a full or closed queue, or could not be
    /// encoded or written.
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }
}

impl LogSink for JsonLogSink {
    fn log(&self, entry: LogEntry) {
        if let Err(e) = self.writer.submit(entry) {
            self.failed_writes.fetch_add(1, Ordering::Relaxed);
            debug!("Dropped log entry: {}", e);
        }
    }

    fn close(&self) -> HookResult<()> {
        self.writer.close()
    }
}

/// Error report as written to the error target.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorLine {
    event_time: DateTime<Utc>,
    message: String,
    stack_trace: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorLineContext<'a> {
    project: &'a str,
    service: &'a str,
    #[serde(flatten)]
    line: &'a ErrorLine,
}

/// Error sink writing one JSON object per report.
pub struct JsonErrorSink {
    writer: BufferedWriter<ErrorLine>,
    on_error: ErrorCallback,
}

impl JsonErrorSink {
    pub fn open(
        target: &TelemetryTarget,
        project_id: &str,
        config: ErrorSinkConfig,
    ) -> HookResult<Self> {
        Self::with_capacity(target, project_id, config, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        target: &TelemetryTarget,
        project_id: &str,
        config: ErrorSinkConfig,
        capacity: usize,
    ) -> HookResult<Self> {
        let project = project_id.to_string();
        let service = config.service_name.clone();

        let encode: Encoder<ErrorLine> = Box::new(move |line| {
            serde_json::to_vec(&ErrorLineContext {
                project: &project,
                service: &service,
                line,
            })
        });

        let callback = Arc::clone(&config.on_error);
        let on_failure: FailureHandler = Box::new(move |e| callback(&e));

        Ok(Self {
            writer: BufferedWriter::spawn("error-sink", target, capacity, encode, on_failure)?,
            on_error: config.on_error,
        })
    }
}

impl ErrorSink for JsonErrorSink {
    fn report(&self, report: ErrorReport) {
        let line = ErrorLine {
            event_time: Utc::now(),
            stack_trace: report.stack_trace_text(),
            message: report.error,
        };
        if let Err(e) = self.writer.submit(line) {
            (self.on_error)(&e);
        }
    }

    fn close(&self) -> HookResult<()> {
        self.writer.close()
    }
}

/// Opens [`JsonLogSink`] and [`JsonErrorSink`] handles on fixed targets.
#[derive(Debug, Clone)]
pub struct JsonLinesProvider {
    pub log_target: TelemetryTarget,
    pub error_target: TelemetryTarget,
    pub queue_capacity: usize,
}

impl JsonLinesProvider {
    pub fn new(log_target: TelemetryTarget, error_target: TelemetryTarget) -> Self {
        Self {
            log_target,
            error_target,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }
}

impl Default for JsonLinesProvider {
    fn default() -> Self {
        Self::new(TelemetryTarget::Stdout, TelemetryTarget::Stderr)
    }
}

impl SinkProvider for JsonLinesProvider {
    fn log_sink(
        &self,
        project_id: &str,
        log_name: &str,
        resource: Option<&MonitoredResource>,
    ) -> HookResult<Box<dyn LogSink>> {
        validate_project_id(project_id)?;
        if log_name.trim().is_empty() {
            return Err(HookError::sink_unavailable(
                "log-sink",
                "log name cannot be empty",
            ));
        }
        let sink = JsonLogSink::with_capacity(
            &self.log_target,
            log_name,
            resource.cloned(),
            self.queue_capacity,
        )?;
        Ok(Box::new(sink))
    }

    fn error_sink(
        &self,
        project_id: &str,
        config: ErrorSinkConfig,
    ) -> HookResult<Box<dyn ErrorSink>> {
        validate_project_id(project_id)?;
        let sink = JsonErrorSink::with_capacity(
            &self.error_target,
            project_id,
            config,
            self.queue_capacity,
        )?;
        Ok(Box::new(sink))
    }
}

/// Project identifiers: 6 to 30 characters of lowercase letters, digits and
/// hyphens, starting with a letter and not ending with a hyphen.
pub fn validate_project_id(project_id: &str) -> HookResult<()> {
    let len = project_id.chars().count();
    if !(6..=30).contains(&len) {
        return Err(HookError::invalid_project(
            project_id,
            "must be 6 to 30 characters long",
        ));
    }
    if !project_id.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(HookError::invalid_project(
            project_id,
            "must start with a lowercase letter",
        ));
    }
    if project_id.ends_with('-') {
        return Err(HookError::invalid_project(
            project_id,
            "must not end with a hyphen",
        ));
    }
    if let Some(bad) = project_id
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        warn!("Rejected project identifier {:?}", project_id);
        return Err(HookError::invalid_project(
            project_id,
            format!("invalid character {:?}", bad),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::OutboundLogPayload;
    use crate::event::{Fields, Severity};
    use std::sync::atomic::AtomicUsize;

    /// Writer whose every write waits until the paired sender is dropped.
    struct StalledWriter {
        release: std::sync::mpsc::Receiver<()>,
    }

    impl Write for StalledWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let _ = self.release.recv();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn target_parsing() {
        assert_eq!("stdout".parse::<TelemetryTarget>().unwrap(), TelemetryTarget::Stdout);
        assert_eq!("-".parse::<TelemetryTarget>().unwrap(), TelemetryTarget::Stdout);
        assert_eq!("stderr".parse::<TelemetryTarget>().unwrap(), TelemetryTarget::Stderr);
        assert_eq!("discard".parse::<TelemetryTarget>().unwrap(), TelemetryTarget::Discard);
        assert_eq!(
            "/var/log/app.jsonl".parse::<TelemetryTarget>().unwrap(),
            TelemetryTarget::File(PathBuf::from("/var/log/app.jsonl"))
        );
        assert!("  ".parse::<TelemetryTarget>().is_err());
    }

    #[test]
    fn project_id_rules() {
        assert!(validate_project_id("my-project-42").is_ok());
        assert!(validate_project_id("short").is_err());
        assert!(validate_project_id("9starts-with-digit").is_err());
        assert!(validate_project_id("ends-with-hyphen-").is_err());
        assert!(validate_project_id("Has-Upper-Case").is_err());
        assert!(validate_project_id("under_score_id").is_err());
        assert!(validate_project_id(&"a".repeat(31)).is_err());
    }

    #[test]
    fn provider_rejects_invalid_project() {
        let provider = JsonLinesProvider::new(TelemetryTarget::Discard, TelemetryTarget::Discard);
        let result = provider.log_sink("BAD", "app", None);
        assert!(matches!(result, Err(HookError::InvalidProject { .. })));
    }

    #[test]
    fn provider_rejects_empty_log_name() {
        let provider = JsonLinesProvider::new(TelemetryTarget::Discard, TelemetryTarget::Discard);
        let result = provider.log_sink("my-project", " ", None);
        assert!(matches!(result, Err(HookError::SinkUnavailable { .. })));
    }

    #[test]
    fn unopenable_file_target_fails_construction() {
        let target = TelemetryTarget::File(PathBuf::from("/nonexistent-dir/for/sure/log.jsonl"));
        assert!(JsonLogSink::open(&target, "app", None).is_err());
    }

    #[test]
    fn log_after_close_is_absorbed_and_counted() {
        let sink = JsonLogSink::open(&TelemetryTarget::Discard, "app", None).unwrap();
        sink.close().unwrap();
        sink.close().unwrap();

        let payload = OutboundLogPayload {
            message: "late".into(),
            fields: Fields::new(),
            instance: None,
        };
        sink.log(LogEntry::new(payload, Severity::Info, Utc::now()));
        assert_eq!(sink.failed_writes(), 1);
    }

    #[test]
    fn report_after_close_invokes_callback() {
        let failures = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&failures);
        let config = ErrorSinkConfig::new("svc").with_on_error(Arc::new(move |e| {
            assert!(matches!(e, HookError::SinkClosed { .. }));
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let sink = JsonErrorSink::open(&TelemetryTarget::Discard, "my-project", config).unwrap();
        sink.close().unwrap();
        sink.report(ErrorReport {
            error: "boom".into(),
            stack_trace: Vec::new(),
        });

        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stalled_writer_bounds_the_queue_and_rejects_overflow() {
        let (release, gate) = std::sync::mpsc::channel::<()>();
        let failures = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&failures);
        let encode: Encoder<u32> = Box::new(|n| serde_json::to_vec(n));
        let on_failure: FailureHandler = Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let writer = BufferedWriter::spawn_on(
            "log-sink",
            Box::new(StalledWriter { release: gate }),
            2,
            encode,
            on_failure,
        )
        .unwrap();

        let mut accepted = 0;
        let mut rejected = 0;
        for n in 0..10u32 {
            match writer.submit(n) {
                Ok(()) => accepted += 1,
                Err(HookError::SinkFull { sink }) => {
                    assert_eq!(sink, "log-sink");
                    rejected += 1;
                }
                Err(other) => panic!("unexpected submit error: {other}"),
            }
        }

        // Two queued plus at most one held by the stalled writer.
        assert!((2..=3).contains(&accepted), "accepted {accepted}");
        assert_eq!(accepted + rejected, 10);

        drop(release);
        writer.close().unwrap();
        assert_eq!(failures.load(Ordering::SeqCst), 0);
        assert!(matches!(writer.submit(99), Err(HookError::SinkClosed { .. })));
    }

    #[test]
    fn zero_capacity_provider_still_delivers() {
        let provider = JsonLinesProvider::new(TelemetryTarget::Discard, TelemetryTarget::Discard)
            .with_queue_capacity(0);
        let sink = provider.log_sink("my-project", "app", None).unwrap();
        let payload = OutboundLogPayload {
            message: "hello".into(),
            fields: Fields::new(),
            instance: None,
        };
        sink.log(LogEntry::new(payload, Severity::Info, Utc::now()));
        sink.close().unwrap();
    }
}
