// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Console rendering of log records.
//!
//! Line layout, each bracketed segment separated by one space:
//!
//! ```text
//! [<timestamp>] [<target>] [<span name>:<span id prefix>] [<LEVEL>] <message>
//! ```
//!
//! The timestamp and span segments are dropped independently when disabled
//! or absent. Non-empty fields follow the line as compact JSON, separated by
//! a single space. Log scrapers depend on this layout; keep it stable.

use chrono::{DateTime, SecondsFormat, Utc};
use colored::{ColoredString, Colorize};

use crate::types::{Fields, LogLevel, LogRecord};

/// ISO-8601 UTC timestamp with millisecond precision, e.g. `2026-01-02T03:04:05.678Z`.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render the line without fields and without color.
pub fn format_line(record: &LogRecord, with_timestamps: bool) -> String {
    build_line(record, with_timestamps, &format!("[{}]", record.level.as_str()))
}

/// Render non-empty fields as compact JSON.
pub fn format_fields(fields: &Fields) -> Option<String> {
    if fields.is_empty() {
        return None;
    }
    Some(serde_json::Value::Object(fields.clone()).to_string())
}

/// Render the complete console output for a record, fields included.
pub fn render(record: &LogRecord, with_timestamps: bool, with_colors: bool) -> String {
    let level = if with_colors {
        colorize_level(record.level).to_string()
    } else {
        format!("[{}]", record.level.as_str())
    };

    let mut output = build_line(record, with_timestamps, &level);
    if let Some(fields) = record.fields.as_ref().and_then(format_fields) {
        output.push(' ');
        output.push_str(&fields);
    }
    output
}

/// Print a record to the console. WARN and ERROR go to stderr.
pub fn write_console(record: &LogRecord, with_timestamps: bool, with_colors: bool) {
    let output = render(record, with_timestamps, with_colors);
    if record.level >= LogLevel::Warn {
        eprintln!("{output}");
    } else {
        println!("{output}");
    }
}

fn build_line(record: &LogRecord, with_timestamps: bool, level: &str) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(5);

    if with_timestamps {
        parts.push(format!("[{}]", format_timestamp(&record.timestamp)));
    }
    parts.push(format!("[{}]", record.target));
    if let Some(span) = &record.span {
        parts.push(format!("[{}:{}]", span.name, span.span_id.short()));
    }
    parts.push(level.to_string());
    parts.push(record.message.clone());

    parts.join(" ")
}

fn colorize_level(level: LogLevel) -> ColoredString {
    let token = format!("[{}]", level.as_str());
    match level {
        LogLevel::Trace => token.dimmed(),
        LogLevel::Debug => token.cyan(),
        LogLevel::Info => token.green(),
        LogLevel::Warn => token.yellow(),
        LogLevel::Error => token.red().bold(),
    }
}
