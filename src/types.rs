// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core record and context types shared by the logger, tracer and subscribers.
//!
//! These are plain data shapes with no behavior beyond construction,
//! ordering and serialization.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DiagnosticsError;
use crate::ids::{SpanId, TraceId};

// ============================================================================
// Field Types
// ============================================================================

/// A single structured field value.
///
/// Restricted to the JSON value kinds: null, bool, number, string,
/// sequence and mapping.
pub type FieldValue = serde_json::Value;

/// Ordered mapping of field names to values.
pub type Fields = serde_json::Map<String, FieldValue>;

/// Build a [`Fields`] map from a `json!`-style object literal.
///
/// Non-object values produce an empty map.
pub fn fields(value: FieldValue) -> Fields {
    match value {
        FieldValue::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Shallow-merge `patch` into `base`; keys in `patch` win.
pub fn merge_fields(base: &Fields, patch: &Fields) -> Fields {
    let mut merged = base.clone();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

// ============================================================================
// Log Levels
// ============================================================================

/// Severity of a log record. Ordered `Trace < Debug < Info < Warn < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    /// All levels in ascending order.
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
    ];

    /// Fixed token used by the console formatter.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// Numeric value of the level.
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Level for a numeric value, `None` if out of range.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

/// Console token for a raw numeric level; out-of-range values render as `UNKNOWN`.
pub fn level_label(value: u8) -> &'static str {
    LogLevel::from_u8(value).map_or("UNKNOWN", |level| level.as_str())
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = DiagnosticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(DiagnosticsError::InvalidLevel(s.to_string())),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

// ============================================================================
// Span Context
// ============================================================================

/// Identity and static description of a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanContext {
    pub span_id: SpanId,
    pub trace_id: TraceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub name: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Fields>,
}

impl SpanContext {
    /// Context for a new root span with fresh span and trace ids.
    pub fn root(name: impl Into<String>, metadata: Option<Fields>) -> Self {
        Self {
            span_id: SpanId::new(),
            trace_id: TraceId::new(),
            parent_span_id: None,
            name: name.into(),
            start_time: Utc::now(),
            metadata,
        }
    }

    /// Context for a child of `parent`: fresh span id, inherited trace id.
    pub fn child_of(parent: &SpanContext, name: impl Into<String>, metadata: Option<Fields>) -> Self {
        Self {
            span_id: SpanId::new(),
            trace_id: parent.trace_id,
            parent_span_id: Some(parent.span_id),
            name: name.into(),
            start_time: Utc::now(),
            metadata,
        }
    }

    /// Whether this context has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }
}

// ============================================================================
// Log Records
// ============================================================================

/// A single emitted log record. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Fields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<SpanContext>,
}

impl LogRecord {
    /// Create a record stamped with the current time.
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            target: target.into(),
            message: message.into(),
            fields: None,
            span: None,
        }
    }

    /// Attach fields; an empty map is stored as `None`.
    pub fn with_fields(mut self, fields: Option<Fields>) -> Self {
        self.fields = fields.filter(|f| !f.is_empty());
        self
    }

    /// Attach a span context.
    pub fn with_span(mut self, span: Option<SpanContext>) -> Self {
        self.span = span;
        self
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.as_ref().and_then(|f| f.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_level_labels() {
        assert_eq!(LogLevel::Warn.as_str(), "WARN");
        assert_eq!(level_label(4), "ERROR");
        assert_eq!(level_label(9), "UNKNOWN");
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!(" warning ".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!(matches!(
            "loud".parse::<LogLevel>(),
            Err(DiagnosticsError::InvalidLevel(_))
        ));
    }

    #[test]
    fn test_level_serde() {
        assert_eq!(serde_json::to_string(&LogLevel::Trace).unwrap(), "\"trace\"");
        let level: LogLevel = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(level, LogLevel::Error);
    }

    #[test]
    fn test_child_context_inherits_trace() {
        let root = SpanContext::root("checkout", None);
        let child = SpanContext::child_of(&root, "charge-card", None);

        assert!(root.is_root());
        assert_eq!(child.trace_id, root.trace_id);
        assert_eq!(child.parent_span_id, Some(root.span_id));
        assert_ne!(child.span_id, root.span_id);
    }

    #[test]
    fn test_merge_fields_patch_wins() {
        let base = fields(json!({"a": 1, "keep": true}));
        let patch = fields(json!({"a": 2, "b": 3}));
        let merged = merge_fields(&base, &patch);

        assert_eq!(FieldValue::Object(merged), json!({"a": 2, "keep": true, "b": 3}));
    }

    #[test]
    fn test_record_drops_empty_fields() {
        let record = LogRecord::new(LogLevel::Info, "default", "hello").with_fields(Some(Fields::new()));
        assert!(record.fields.is_none());
    }

    #[test]
    fn test_record_serialization_omits_absent_parts() {
        let record = LogRecord::new(LogLevel::Info, "db", "connected");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["level"], "info");
        assert!(value.get("span").is_none());
        assert!(value.get("fields").is_none());
    }
}
