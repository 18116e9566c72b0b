// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The diagnostics orchestrator.
//!
//! A [`Diagnostics`] value owns one [`Tracer`], a cache of [`Logger`]s keyed
//! by target, the globally registered subscribers and the instrumentation
//! metrics. It is constructed once at startup and handed to collaborators;
//! clones share the same state.
//!
//! # Usage
//!
//! ```rust,ignore
//! use spanlog::{Diagnostics, DiagnosticsConfig};
//!
//! let diagnostics = Diagnostics::new(DiagnosticsConfig::default());
//! let user = diagnostics.instrument("load-user", Some("users"), None, |log| {
//!     log.info("querying", None);
//!     find_user(42)
//! })?;
//! diagnostics.shutdown();
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::json;

use crate::config::DiagnosticsConfig;
use crate::logger::Logger;
use crate::metrics::Metrics;
use crate::subscriber::{SharedSubscriber, SubscriberList};
use crate::tracer::{Span, Tracer};
use crate::types::{fields, Fields, LogLevel};

/// Shared tracer, cached loggers and global subscribers.
#[derive(Clone)]
pub struct Diagnostics {
    inner: Arc<DiagnosticsInner>,
}

struct DiagnosticsInner {
    config: DiagnosticsConfig,
    tracer: Tracer,
    loggers: RwLock<BTreeMap<String, Logger>>,
    subscribers: RwLock<SubscriberList>,
    metrics: Metrics,
}

impl Diagnostics {
    /// Create an orchestrator whose new loggers start from `config`.
    pub fn new(config: DiagnosticsConfig) -> Self {
        Self {
            inner: Arc::new(DiagnosticsInner {
                config,
                tracer: Tracer::new(),
                loggers: RwLock::new(BTreeMap::new()),
                subscribers: RwLock::new(SubscriberList::new()),
                metrics: Metrics::new(),
            }),
        }
    }

    /// Baseline settings for new loggers.
    pub fn config(&self) -> &DiagnosticsConfig {
        &self.inner.config
    }

    pub fn tracer(&self) -> &Tracer {
        &self.inner.tracer
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// The cached logger for `target`, created on first request with every
    /// global subscriber attached.
    pub fn logger(&self, target: &str) -> Logger {
        if let Some(logger) = self.read_loggers().get(target) {
            return logger.clone();
        }

        let mut loggers = self.write_loggers();
        loggers
            .entry(target.to_string())
            .or_insert_with(|| {
                let logger = Logger::new(self.inner.config.logger_config(target));
                for subscriber in self.subscribers().iter() {
                    logger.subscribe(subscriber.clone());
                }
                tracing::trace!(target_name = target, "Created logger");
                logger
            })
            .clone()
    }

    /// The logger for the configured default target.
    pub fn default_logger(&self) -> Logger {
        self.logger(&self.inner.config.default_target)
    }

    /// Targets with a cached logger, sorted.
    pub fn loggers(&self) -> Vec<String> {
        self.read_loggers().keys().cloned().collect()
    }

    /// Register `subscriber` globally: with the tracer, every cached logger
    /// and every logger created later. Spans that already exist do not
    /// receive it.
    pub fn subscribe(&self, subscriber: SharedSubscriber) {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(subscriber.clone());
        self.inner.tracer.subscribe(subscriber.clone());
        for logger in self.read_loggers().values() {
            logger.subscribe(subscriber.clone());
        }
    }

    /// Remove `subscriber` from the global list, the tracer and every cached
    /// logger. Unknown subscribers are ignored.
    pub fn unsubscribe(&self, subscriber: &SharedSubscriber) {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(subscriber);
        self.inner.tracer.unsubscribe(subscriber);
        for logger in self.read_loggers().values() {
            logger.unsubscribe(subscriber);
        }
    }

    pub fn subscribers(&self) -> SubscriberList {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Set the threshold of every cached logger. Loggers created afterwards
    /// start from the configured baseline.
    pub fn set_global_level(&self, level: LogLevel) {
        for logger in self.read_loggers().values() {
            logger.set_level(level);
        }
    }

    pub fn enable_debug_mode(&self) {
        self.set_global_level(LogLevel::Debug);
    }

    pub fn enable_trace_mode(&self) {
        self.set_global_level(LogLevel::Trace);
    }

    pub fn disable_debug_mode(&self) {
        self.set_global_level(LogLevel::Info);
    }

    /// Run `f` as an instrumented unit of work.
    ///
    /// Starts a span under the caller's current span, hands `f` a logger
    /// bound to it, logs the start, then either the completion with its
    /// duration or the error with its message and duration. The error is
    /// returned unchanged. The span is ended before this returns, and also
    /// if `f` panics.
    pub fn instrument<T, E, F>(
        &self,
        name: &str,
        target: Option<&str>,
        metadata: Option<Fields>,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&Logger) -> Result<T, E>,
        E: fmt::Display,
    {
        let run = self.begin(name, target, metadata);
        let result = {
            let _scope = self.tracer().enter(run.span.clone());
            f(&run.logger)
        };
        run.finish(&result);
        result
    }

    /// Asynchronous counterpart of [`Diagnostics::instrument`].
    ///
    /// The span is current for the task while the future runs. Dropping the
    /// returned future before it completes still ends the span.
    pub async fn instrument_async<T, E, F, Fut>(
        &self,
        name: &str,
        target: Option<&str>,
        metadata: Option<Fields>,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Logger) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let run = self.begin(name, target, metadata);
        let result = self.tracer().scope(run.span.clone(), f(run.logger.clone())).await;
        run.finish(&result);
        result
    }

    /// End every active span. Cached loggers are kept.
    pub fn shutdown(&self) {
        self.inner.tracer.finish_all();
    }

    /// Shut down and forget all loggers, global subscribers and metrics.
    pub fn reset(&self) {
        self.shutdown();
        let subscribers = self.subscribers();
        for subscriber in subscribers.iter() {
            self.inner.tracer.unsubscribe(subscriber);
        }
        self.write_loggers().clear();
        *self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner) = SubscriberList::new();
        self.inner.metrics.reset();
    }

    fn begin(&self, name: &str, target: Option<&str>, metadata: Option<Fields>) -> InstrumentedRun {
        let logger = match target {
            Some(target) => self.logger(target),
            None => self.default_logger(),
        };
        let tracer = self.inner.tracer.clone();
        let parent = tracer.current_span().map(|span| span.context());
        let span = tracer.start_span(name, parent.as_ref(), metadata);
        let logger = logger.with_span(span.context());

        logger.debug(format!("Starting {name}"), None);

        InstrumentedRun {
            diagnostics: self.clone(),
            name: name.to_string(),
            span,
            logger,
            finished: false,
        }
    }

    fn read_loggers(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Logger>> {
        self.inner
            .loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_loggers(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Logger>> {
        self.inner
            .loggers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(DiagnosticsConfig::default())
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("loggers", &self.loggers())
            .field("subscribers", &self.subscribers().len())
            .field("tracer", &self.inner.tracer)
            .finish()
    }
}

/// One in-flight instrumented unit of work.
///
/// If dropped without `finish` (panic or cancelled future) it logs the
/// abort and ends the span itself.
struct InstrumentedRun {
    diagnostics: Diagnostics,
    name: String,
    span: Span,
    logger: Logger,
    finished: bool,
}

impl InstrumentedRun {
    fn finish<T, E: fmt::Display>(mut self, result: &Result<T, E>) {
        let elapsed = self.span.elapsed();
        let duration = elapsed.as_secs_f64() * 1000.0;

        match result {
            Ok(_) => self.logger.debug(
                format!("Completed {}", self.name),
                fields(json!({ "duration": duration })),
            ),
            Err(err) => self.logger.error(
                format!("Failed {}", self.name),
                fields(json!({ "error": err.to_string(), "duration": duration })),
            ),
        }

        self.diagnostics
            .metrics()
            .record(&self.name, elapsed, result.is_ok());
        self.diagnostics.tracer().end_span(&self.span.span_id());
        self.finished = true;
    }
}

impl Drop for InstrumentedRun {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let elapsed = self.span.elapsed();
        let reason = if std::thread::panicking() {
            "panicked"
        } else {
            "cancelled"
        };
        self.logger.error(
            format!("Failed {}", self.name),
            fields(json!({ "error": reason, "duration": elapsed.as_secs_f64() * 1000.0 })),
        );
        self.diagnostics.metrics().record(&self.name, elapsed, false);
        self.diagnostics.tracer().end_span(&self.span.span_id());
    }
}
