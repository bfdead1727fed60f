// stack_trace.rs
// Purpose: Capture the calling thread's stack for error reports, minus logging plumbing

use std::backtrace::Backtrace;

/// Upper bound on the size of a captured stack trace.
pub const DEFAULT_MAX_STACK_BYTES: usize = 8192;

/// Paths identifying frames that belong to the logging facilities or to this
/// crate rather than to the application. A path that starts with an
/// identifier only matches at the start of a path segment, so
/// `app::catalog::log_entry` is not mistaken for `log::`.
pub const FACILITY_FRAME_MARKERS: &[&str] = &[
    concat!(env!("CARGO_CRATE_NAME"), "::"),
    "log::",
    "tracing::",
    "tracing_core::",
    "tracing_subscriber::",
    "std::backtrace",
    "/log-0.",
    "/tracing-core-",
    "/tracing-subscriber-",
];

/// Bounded, filtered stack capture.
#[derive(Debug, Clone)]
pub struct StackCapture {
    max_bytes: usize,
    markers: Vec<String>,
}

impl Default for StackCapture {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_STACK_BYTES,
            markers: FACILITY_FRAME_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl StackCapture {
    pub fn new(max_bytes: usize, markers: Vec<String>) -> Self {
        Self { max_bytes, markers }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Capture the current thread's stack.
    pub fn capture(&self) -> Vec<u8> {
        let trace = Backtrace::force_capture().to_string();
        self.sanitize(&trace)
    }

    /// Drop facility frames from a trace, then cap it at the byte bound.
    pub fn sanitize(&self, trace: &str) -> Vec<u8> {
        let filtered = filter_frames(trace, &self.markers);
        truncate_at_line(&filtered, self.max_bytes).as_bytes().to_vec()
    }
}

/// Remove every line mentioning one of `markers`, terminator included, along
/// with the `at <file>:<line>` lines that belong to a removed frame.
/// Remaining lines keep their original order.
pub fn filter_frames<M: AsRef<str>>(trace: &str, markers: &[M]) -> String {
    let mut kept = String::with_capacity(trace.len());
    let mut dropping = false;

    for line in trace.split_inclusive('\n') {
        if dropping && is_location_line(line) {
            continue;
        }
        dropping = markers.iter().any(|m| mentions(line, m.as_ref()));
        if !dropping {
            kept.push_str(line);
        }
    }
    kept
}

/// Whether `marker` occurs in `line` as a path of its own rather than as the
/// tail of a longer identifier or path.
pub fn mentions(line: &str, marker: &str) -> bool {
    if marker.is_empty() {
        return false;
    }
    if !marker.starts_with(is_ident_char) {
        return line.contains(marker);
    }
    line.match_indices(marker).any(|(at, _)| {
        !line[..at].ends_with(|c: char| is_ident_char(c) || c == ':')
    })
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_location_line(line: &str) -> bool {
    line.trim_start().starts_with("at ")
}

/// Longest prefix of `text` within `max_bytes`, cut after the last full line
/// when there is one.
fn truncate_at_line(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }

    let head = &text.as_bytes()[..max_bytes];
    if let Some(pos) = head.iter().rposition(|b| *b == b'\n') {
        return &text[..=pos];
    }

    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}
