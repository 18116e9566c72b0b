// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Leveled, structured logging for one logical target.
//!
//! A [`Logger`] filters records by level, writes them to its sink (the
//! console formatter or a custom callback) and fans them out to its
//! subscribers in registration order.
//!
//! Derivations (`with_span`, `with_fields`, `with_target`) return a new
//! logger and leave the original untouched:
//!
//! ```rust,ignore
//! use spanlog::{fields, Logger};
//! use serde_json::json;
//!
//! let base = Logger::with_defaults("payments");
//! let scoped = base.with_fields(fields(json!({"order": 17})));
//! scoped.info("charged card", fields(json!({"amount": 42})));
//! ```

pub mod format;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::DiagnosticsError;
use crate::subscriber::{panic_message, SharedSubscriber, SubscriberList};
use crate::types::{merge_fields, Fields, LogLevel, LogRecord, SpanContext};

/// Callback receiving every emitted record in place of the console sink.
pub type CustomOutput = Arc<dyn Fn(&LogRecord) + Send + Sync>;

/// Primary output path for emitted records.
#[derive(Clone, Default)]
pub enum LogOutput {
    /// Formatted lines on stdout/stderr.
    #[default]
    Console,
    /// A caller-supplied callback.
    Custom(CustomOutput),
}

impl LogOutput {
    /// Wrap a closure as a custom sink.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    pub fn is_console(&self) -> bool {
        matches!(self, Self::Console)
    }
}

impl fmt::Debug for LogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Console => f.write_str("Console"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl FromStr for LogOutput {
    type Err = DiagnosticsError;

    /// Only the console sink can be named; custom sinks are built in code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" => Ok(Self::Console),
            _ => Err(DiagnosticsError::UnknownOutput(s.to_string())),
        }
    }
}

/// Per-logger settings.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum level that is emitted.
    pub level: LogLevel,
    /// Label attached to every record.
    pub target: String,
    /// Prefix console lines with an ISO-8601 timestamp.
    pub with_timestamps: bool,
    /// Color the level token on the console.
    pub with_colors: bool,
    pub output: LogOutput,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            target: "default".to_string(),
            with_timestamps: true,
            with_colors: true,
            output: LogOutput::Console,
        }
    }
}

impl LoggerConfig {
    /// Default settings for `target`.
    pub fn for_target(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.with_timestamps = enabled;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.with_colors = enabled;
        self
    }
}

/// Handle to a logger. Clones share the same logger; use the `with_*`
/// methods to derive an independent one.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    config: RwLock<LoggerConfig>,
    subscribers: RwLock<SubscriberList>,
    span: Option<SpanContext>,
    base_fields: Option<Fields>,
}

impl Logger {
    /// Create a logger with the given settings and no subscribers.
    pub fn new(config: LoggerConfig) -> Self {
        Self::from_parts(config, SubscriberList::new(), None, None)
    }

    /// Create a console logger for `target` with default settings.
    pub fn with_defaults(target: impl Into<String>) -> Self {
        Self::new(LoggerConfig::for_target(target))
    }

    fn from_parts(
        config: LoggerConfig,
        subscribers: SubscriberList,
        span: Option<SpanContext>,
        base_fields: Option<Fields>,
    ) -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                config: RwLock::new(config),
                subscribers: RwLock::new(subscribers),
                span,
                base_fields,
            }),
        }
    }

    pub fn set_level(&self, level: LogLevel) {
        self.inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .level = level;
    }

    pub fn level(&self) -> LogLevel {
        self.read_config().level
    }

    /// Whether a record at `level` would be emitted.
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level()
    }

    pub fn target(&self) -> String {
        self.read_config().target.clone()
    }

    /// Snapshot of the current settings.
    pub fn config(&self) -> LoggerConfig {
        self.read_config().clone()
    }

    /// The span bound by [`Logger::with_span`], if any.
    pub fn span(&self) -> Option<&SpanContext> {
        self.inner.span.as_ref()
    }

    /// Base fields merged into every record, if any.
    pub fn base_fields(&self) -> Option<&Fields> {
        self.inner.base_fields.as_ref()
    }

    /// Add a fan-out target. Registering the same instance twice is a no-op.
    pub fn subscribe(&self, subscriber: SharedSubscriber) {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(subscriber);
    }

    /// Remove a fan-out target. Unknown subscribers are ignored.
    pub fn unsubscribe(&self, subscriber: &SharedSubscriber) {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(subscriber);
    }

    pub fn subscribers(&self) -> SubscriberList {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn trace(&self, message: impl Into<String>, fields: impl Into<Option<Fields>>) {
        self.log(LogLevel::Trace, message, fields);
    }

    pub fn debug(&self, message: impl Into<String>, fields: impl Into<Option<Fields>>) {
        self.log(LogLevel::Debug, message, fields);
    }

    pub fn info(&self, message: impl Into<String>, fields: impl Into<Option<Fields>>) {
        self.log(LogLevel::Info, message, fields);
    }

    pub fn warn(&self, message: impl Into<String>, fields: impl Into<Option<Fields>>) {
        self.log(LogLevel::Warn, message, fields);
    }

    pub fn error(&self, message: impl Into<String>, fields: impl Into<Option<Fields>>) {
        self.log(LogLevel::Error, message, fields);
    }

    /// Emit a record at `level` if it passes the threshold.
    ///
    /// The record goes to the sink first, then to every subscriber in
    /// registration order. Never panics outward: sink and subscriber
    /// failures are isolated and reported through `tracing`.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, fields: impl Into<Option<Fields>>) {
        let config = self.config();
        if level < config.level {
            return;
        }

        let fields = match (&self.inner.base_fields, fields.into()) {
            (Some(base), Some(call)) => Some(merge_fields(base, &call)),
            (Some(base), None) => Some(base.clone()),
            (None, call) => call,
        };

        let record = LogRecord::new(level, config.target.as_str(), message)
            .with_fields(fields)
            .with_span(self.inner.span.clone());

        write_to_sink(&config, &record);
        self.subscribers().notify_log(&record);
    }

    /// Derive a logger whose records carry `span`.
    pub fn with_span(&self, span: SpanContext) -> Logger {
        Self::from_parts(
            self.config(),
            self.subscribers(),
            Some(span),
            self.inner.base_fields.clone(),
        )
    }

    /// Derive a logger that merges `extra` into every record.
    ///
    /// Fields passed to an individual call win over `extra` on key conflict.
    pub fn with_fields(&self, extra: Fields) -> Logger {
        let base_fields = match &self.inner.base_fields {
            Some(existing) => merge_fields(existing, &extra),
            None => extra,
        };
        Self::from_parts(
            self.config(),
            self.subscribers(),
            self.inner.span.clone(),
            Some(base_fields),
        )
    }

    /// Derive a logger with a different target label.
    pub fn with_target(&self, target: impl Into<String>) -> Logger {
        let config = LoggerConfig {
            target: target.into(),
            ..self.config()
        };
        Self::from_parts(
            config,
            self.subscribers(),
            self.inner.span.clone(),
            self.inner.base_fields.clone(),
        )
    }

    /// Whether both handles refer to the same logger.
    pub fn ptr_eq(&self, other: &Logger) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn read_config(&self) -> std::sync::RwLockReadGuard<'_, LoggerConfig> {
        self.inner
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("config", &*self.read_config())
            .field("span", &self.inner.span.as_ref().map(|s| &s.name))
            .field("subscribers", &self.subscribers().len())
            .finish()
    }
}

fn write_to_sink(config: &LoggerConfig, record: &LogRecord) {
    match &config.output {
        LogOutput::Console => {
            format::write_console(record, config.with_timestamps, config.with_colors)
        }
        LogOutput::Custom(callback) => {
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(record)));
            if let Err(payload) = result {
                tracing::warn!(
                    target = %record.target,
                    error = %panic_message(payload.as_ref()),
                    "Custom log output panicked"
                );
            }
        }
    }
}
