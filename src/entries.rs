//! Outbound records built by the event adapter
//!
//! A [`LogEntry`] goes to the log sink for every event; an [`ErrorReport`]
//! goes to the error sink only when the event's severity escalates.

use crate::instance::InstanceMetadata;
use crate::event::{Fields, Severity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Structured payload of one log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundLogPayload {
    pub message: String,
    pub fields: Fields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<Arc<InstanceMetadata>>,
}

/// A payload together with the metadata the log sink needs to store it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub insert_id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    #[serde(rename = "jsonPayload")]
    pub payload: OutboundLogPayload,
}

impl LogEntry {
    pub fn new(payload: OutboundLogPayload, severity: Severity, timestamp: DateTime<Utc>) -> Self {
        Self {
            insert_id: Uuid::new_v4().to_string(),
            timestamp,
            severity,
            payload,
        }
    }
}

/// Report submitted to the error sink for escalated events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub error: String,
    pub stack_trace: Vec<u8>,
}

impl ErrorReport {
    pub fn stack_trace_text(&self) -> String {
        String::from_utf8_lossy(&self.stack_trace).into_owned()
    }
}
