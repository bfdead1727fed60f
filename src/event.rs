// event.rs
// Purpose: Log event model (host levels, output severities, field values) shared by the host bridges and the event adapter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Reserved field key under which a host attaches the error of an event.
pub const ERROR_KEY: &str = "error";

/// Level is the severity of an event as the host facility reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl Level {
    /// Every level a host may emit, lowest first.
    pub const ALL: [Level; 7] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
        Level::Panic,
    ];

    /// Map a host level onto the normalized output severity.
    pub fn severity(self) -> Severity {
        match self {
            Level::Trace => Severity::Default,
            Level::Debug => Severity::Debug,
            Level::Info => Severity::Info,
            Level::Warn => Severity::Warning,
            Level::Error => Severity::Error,
            Level::Fatal | Level::Panic => Severity::Critical,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
            Level::Panic => "panic",
        }
    }
}

impl FromStr for Level {
    type Err = ();

    fn from_str(input: &str) -> Result<Level, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            "panic" => Ok(Level::Panic),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity is the normalized classification attached to outbound records.
///
/// Declaration order is the ordering used for escalation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Default,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Records at or above this severity are also sent to the error sink.
    pub const ESCALATION_THRESHOLD: Severity = Severity::Error;

    /// Resolve a host level name; unknown names fall back to the lowest severity.
    pub fn from_level_name(name: &str) -> Severity {
        name.parse::<Level>()
            .map(Level::severity)
            .unwrap_or(Severity::Default)
    }

    pub fn escalates(self) -> bool {
        self >= Self::ESCALATION_THRESHOLD
    }

    /// Numeric code understood by the remote logging service.
    pub fn code(self) -> u16 {
        match self {
            Severity::Default => 0,
            Severity::Debug => 100,
            Severity::Info => 200,
            Severity::Warning => 400,
            Severity::Error => 500,
            Severity::Critical => 600,
        }
    }
}

/// Error carried by a borrowed host error once the host record is gone.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CapturedError {
    message: String,
}

/// An error attached to an event. Only its message text leaves the process.
#[derive(Clone)]
pub struct ErrorValue(Arc<dyn std::error::Error + Send + Sync>);

impl ErrorValue {
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(err))
    }

    /// Snapshot an error the host only lends for the duration of a call.
    pub fn captured(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(CapturedError {
            message: err.to_string(),
        })
    }

    pub fn message(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorValue").field(&self.message()).finish()
    }
}

impl PartialEq for ErrorValue {
    fn eq(&self, other: &Self) -> bool {
        self.message() == other.message()
    }
}

/// Value of a structured field on a log event.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Error(ErrorValue),
    Other(serde_json::Value),
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::String(text) => serializer.serialize_str(text),
            FieldValue::Error(err) => serializer.serialize_str(&err.message()),
            FieldValue::Other(value) => value.serialize(serializer),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<ErrorValue> for FieldValue {
    fn from(value: ErrorValue) -> Self {
        FieldValue::Error(value)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        FieldValue::Other(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Other(value.into())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Other(value.into())
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

/// LogEvent is one record handed over by the host facility.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub level: Level,
    pub message: String,
    pub fields: Fields,
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            fields: Fields::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach a structured field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Attach an error under the reserved error key
    pub fn with_error<E>(self, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.with_field(ERROR_KEY, ErrorValue::new(err))
    }

    /// Override the creation timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
