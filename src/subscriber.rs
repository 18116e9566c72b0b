// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Fan-out subscriber bus.
//!
//! Loggers and the tracer push every emitted record and every span
//! start/end to their registered subscribers, synchronously and in
//! registration order. Each callback runs in isolation: a subscriber that
//! panics is reported through `tracing` and the remaining subscribers are
//! still notified.
//!
//! Registration is by reference. The same `Arc` passed to `subscribe` must
//! be passed to `unsubscribe`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::tracer::Span;
use crate::types::{LogLevel, LogRecord, SpanContext};

/// A fan-out target notified of log records and span lifecycle events.
///
/// Every method has an empty default so implementors only override what
/// they care about.
pub trait Subscriber: Send + Sync {
    /// Called once for every record that passed the logger's threshold.
    fn on_log(&self, _record: &LogRecord) {}

    /// Called when a span is started by the tracer.
    fn on_span_start(&self, _span: &Span) {}

    /// Called exactly once when a span ends.
    fn on_span_end(&self, _span: &Span) {}
}

/// Shared handle to a subscriber.
pub type SharedSubscriber = Arc<dyn Subscriber>;

/// Whether two handles point at the same subscriber instance.
pub fn same_subscriber(a: &SharedSubscriber, b: &SharedSubscriber) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Ordered list of subscribers with identity-based membership.
#[derive(Clone, Default)]
pub struct SubscriberList {
    entries: Vec<SharedSubscriber>,
}

impl SubscriberList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber. Returns `false` if it was already registered.
    pub fn add(&mut self, subscriber: SharedSubscriber) -> bool {
        if self.contains(&subscriber) {
            return false;
        }
        self.entries.push(subscriber);
        true
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn remove(&mut self, subscriber: &SharedSubscriber) -> bool {
        let before = self.entries.len();
        self.entries.retain(|s| !same_subscriber(s, subscriber));
        self.entries.len() != before
    }

    /// Whether the given instance is registered.
    pub fn contains(&self, subscriber: &SharedSubscriber) -> bool {
        self.entries.iter().any(|s| same_subscriber(s, subscriber))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedSubscriber> {
        self.entries.iter()
    }

    /// Notify every subscriber of a log record.
    pub fn notify_log(&self, record: &LogRecord) {
        dispatch(&self.entries, "log", |s| s.on_log(record));
    }

    /// Notify every subscriber that a span started.
    pub fn notify_span_start(&self, span: &Span) {
        dispatch(&self.entries, "span_start", |s| s.on_span_start(span));
    }

    /// Notify every subscriber that a span ended.
    pub fn notify_span_end(&self, span: &Span) {
        dispatch(&self.entries, "span_end", |s| s.on_span_end(span));
    }
}

impl std::fmt::Debug for SubscriberList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberList")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl FromIterator<SharedSubscriber> for SubscriberList {
    fn from_iter<I: IntoIterator<Item = SharedSubscriber>>(iter: I) -> Self {
        let mut list = Self::new();
        for subscriber in iter {
            list.add(subscriber);
        }
        list
    }
}

fn dispatch<F>(subscribers: &[SharedSubscriber], event: &'static str, notify: F)
where
    F: Fn(&dyn Subscriber),
{
    for (index, subscriber) in subscribers.iter().enumerate() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| notify(subscriber.as_ref())));
        if let Err(payload) = result {
            tracing::warn!(
                event,
                subscriber = index,
                error = %panic_message(payload.as_ref()),
                "Subscriber panicked, continuing fan-out"
            );
        }
    }
}

/// Best-effort extraction of a panic payload message.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// Built-in Subscribers
// ============================================================================

/// A span lifecycle event captured by [`MemorySubscriber`].
#[derive(Debug, Clone, PartialEq)]
pub enum SpanEvent {
    Started(SpanContext),
    Ended {
        context: SpanContext,
        duration: Option<Duration>,
    },
}

impl SpanEvent {
    /// Context of the span the event refers to.
    pub fn context(&self) -> &SpanContext {
        match self {
            SpanEvent::Started(context) => context,
            SpanEvent::Ended { context, .. } => context,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, SpanEvent::Ended { .. })
    }
}

/// Collects every record and span event in memory for later inspection.
#[derive(Debug, Default)]
pub struct MemorySubscriber {
    records: Mutex<Vec<LogRecord>>,
    span_events: Mutex<Vec<SpanEvent>>,
}

impl MemorySubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector already wrapped for registration.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// All captured records in emission order.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Captured records for one target.
    pub fn records_for(&self, target: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.target == target)
            .collect()
    }

    /// Captured records at exactly `level`.
    pub fn records_at(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .collect()
    }

    /// All captured span events in the order observed.
    pub fn span_events(&self) -> Vec<SpanEvent> {
        self.span_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop everything captured so far.
    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.span_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Subscriber for MemorySubscriber {
    fn on_log(&self, record: &LogRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }

    fn on_span_start(&self, span: &Span) {
        self.span_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SpanEvent::Started(span.context()));
    }

    fn on_span_end(&self, span: &Span) {
        self.span_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SpanEvent::Ended {
                context: span.context(),
                duration: span.duration(),
            });
    }
}

/// Re-emits records and span lifecycle events as `tracing` events.
///
/// Lets an application that already runs a `tracing` subscriber stack see
/// everything flowing through this engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingForwarder;

impl TracingForwarder {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl Subscriber for TracingForwarder {
    fn on_log(&self, record: &LogRecord) {
        let fields = record
            .fields
            .as_ref()
            .map(|f| serde_json::Value::Object(f.clone()).to_string())
            .unwrap_or_default();
        let span = record
            .span
            .as_ref()
            .map(|s| format!("{}:{}", s.name, s.span_id.short()))
            .unwrap_or_default();
        let target = record.target.as_str();
        let message = record.message.as_str();

        match record.level {
            LogLevel::Trace => tracing::trace!(target: "spanlog", log_target = target, span_label = %span, fields = %fields, "{message}"),
            LogLevel::Debug => tracing::debug!(target: "spanlog", log_target = target, span_label = %span, fields = %fields, "{message}"),
            LogLevel::Info => tracing::info!(target: "spanlog", log_target = target, span_label = %span, fields = %fields, "{message}"),
            LogLevel::Warn => tracing::warn!(target: "spanlog", log_target = target, span_label = %span, fields = %fields, "{message}"),
            LogLevel::Error => tracing::error!(target: "spanlog", log_target = target, span_label = %span, fields = %fields, "{message}"),
        }
    }

    fn on_span_start(&self, span: &Span) {
        tracing::debug!(
            target: "spanlog",
            span_name = %span.name(),
            span_id = %span.span_id(),
            trace_id = %span.trace_id(),
            "Span started"
        );
    }

    fn on_span_end(&self, span: &Span) {
        tracing::debug!(
            target: "spanlog",
            span_name = %span.name(),
            span_id = %span.span_id(),
            duration_ms = span.duration_ms().unwrap_or_default(),
            "Span ended"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    impl Subscriber for Counting {
        fn on_log(&self, _record: &LogRecord) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Exploding;

    impl Subscriber for Exploding {
        fn on_log(&self, _record: &LogRecord) {
            panic!("subscriber failure");
        }
    }

    fn record() -> LogRecord {
        LogRecord::new(LogLevel::Info, "default", "hello")
    }

    #[test]
    fn test_add_ignores_duplicates() {
        let sub: SharedSubscriber = Arc::new(Counting(AtomicUsize::new(0)));
        let mut list = SubscriberList::new();

        assert!(list.add(sub.clone()));
        assert!(!list.add(sub.clone()));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let registered: SharedSubscriber = Arc::new(Counting(AtomicUsize::new(0)));
        let stranger: SharedSubscriber = Arc::new(Counting(AtomicUsize::new(0)));
        let mut list = SubscriberList::new();
        list.add(registered.clone());

        assert!(!list.remove(&stranger));
        assert_eq!(list.len(), 1);
        assert!(list.remove(&registered));
        assert!(list.is_empty());
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let before = Arc::new(Counting(AtomicUsize::new(0)));
        let after = Arc::new(Counting(AtomicUsize::new(0)));
        let list: SubscriberList = vec![
            before.clone() as SharedSubscriber,
            Arc::new(Exploding) as SharedSubscriber,
            after.clone() as SharedSubscriber,
        ]
        .into_iter()
        .collect();

        list.notify_log(&record());
        list.notify_log(&record());

        assert_eq!(before.0.load(Ordering::SeqCst), 2);
        assert_eq!(after.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_memory_subscriber_collects() {
        let memory = MemorySubscriber::shared();
        let mut list = SubscriberList::new();
        list.add(memory.clone());

        list.notify_log(&record());
        list.notify_log(&LogRecord::new(LogLevel::Warn, "db", "slow"));

        assert_eq!(memory.records().len(), 2);
        assert_eq!(memory.records_for("db").len(), 1);
        assert_eq!(memory.records_at(LogLevel::Warn)[0].message, "slow");

        memory.clear();
        assert!(memory.records().is_empty());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_tracing_forwarder_emits_events() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let tracer = crate::tracer::Tracer::new();
            tracer.subscribe(TracingForwarder::shared());
            let span = tracer.start_span("checkout", None, None);

            let record = LogRecord::new(LogLevel::Info, "orders", "Reserved stock")
                .with_span(Some(span.context()))
                .with_fields(Some(crate::types::fields(serde_json::json!({ "items": 3 }))));
            TracingForwarder.on_log(&record);

            tracer.end_span(&span.span_id());
        });

        let output = capture.contents();
        assert!(output.contains("Reserved stock"));
        assert!(output.contains("log_target=\"orders\""));
        assert!(output.contains("span_label=checkout:"));
        assert!(output.contains("fields={\"items\":3}"));
        assert!(output.contains("Span started"));
        assert!(output.contains("span_name=checkout"));
        assert!(output.contains("Span ended"));
    }
}
