// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! A single traced operation.
//!
//! A [`Span`] is a cheap handle: clones refer to the same span. It moves
//! through exactly two states, created and ended. Ending happens at most
//! once; later calls to [`Span::end`] are ignored so the duration and the
//! `on_span_end` notification are fixed by the first call.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::ids::{SpanId, TraceId};
use crate::subscriber::{SharedSubscriber, SubscriberList};
use crate::types::{merge_fields, Fields, SpanContext};

/// Handle to a traced operation.
#[derive(Clone)]
pub struct Span {
    inner: Arc<SpanInner>,
}

struct SpanInner {
    context: RwLock<SpanContext>,
    started: Instant,
    state: Mutex<SpanState>,
    subscribers: RwLock<SubscriberList>,
}

#[derive(Default)]
struct SpanState {
    end_time: Option<DateTime<Utc>>,
    elapsed: Option<Duration>,
    children: Vec<Span>,
}

impl Span {
    fn from_context(context: SpanContext) -> Self {
        Self {
            inner: Arc::new(SpanInner {
                context: RwLock::new(context),
                started: Instant::now(),
                state: Mutex::new(SpanState::default()),
                subscribers: RwLock::new(SubscriberList::new()),
            }),
        }
    }

    /// Start a new root span with fresh span and trace ids.
    pub fn create_root(name: impl Into<String>, metadata: Option<Fields>) -> Self {
        Self::from_context(SpanContext::root(name, metadata))
    }

    /// Start a child of `parent`, inheriting its trace id.
    pub fn create_child(
        name: impl Into<String>,
        parent: &SpanContext,
        metadata: Option<Fields>,
    ) -> Self {
        Self::from_context(SpanContext::child_of(parent, name, metadata))
    }

    /// Snapshot of the span's context, including current metadata.
    pub fn context(&self) -> SpanContext {
        self.read_context().clone()
    }

    pub fn span_id(&self) -> SpanId {
        self.read_context().span_id
    }

    pub fn trace_id(&self) -> TraceId {
        self.read_context().trace_id
    }

    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.read_context().parent_span_id
    }

    pub fn name(&self) -> String {
        self.read_context().name.clone()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.read_context().start_time
    }

    pub fn metadata(&self) -> Option<Fields> {
        self.read_context().metadata.clone()
    }

    /// Shallow-merge `patch` into the metadata; patch keys win.
    pub fn set_metadata(&self, patch: Fields) {
        let mut context = self
            .inner
            .context
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let merged = match context.metadata.as_ref() {
            Some(existing) => merge_fields(existing, &patch),
            None => patch,
        };
        context.metadata = Some(merged);
    }

    /// Register a child for enumeration. Ending this span does not end it.
    pub fn add_child(&self, child: Span) {
        self.lock_state().children.push(child);
    }

    /// Children in registration order.
    pub fn children(&self) -> Vec<Span> {
        self.lock_state().children.clone()
    }

    /// Attach a subscriber to this span only.
    pub fn subscribe(&self, subscriber: SharedSubscriber) {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(subscriber);
    }

    /// Detach a subscriber from this span. Unknown subscribers are ignored.
    pub fn unsubscribe(&self, subscriber: &SharedSubscriber) {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(subscriber);
    }

    /// Subscribers attached to this span.
    pub fn subscribers(&self) -> SubscriberList {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn attach_subscribers(&self, subscribers: SubscriberList) {
        *self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner) = subscribers;
    }

    pub fn is_ended(&self) -> bool {
        self.lock_state().end_time.is_some()
    }

    /// Wall-clock end time, once ended.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.lock_state().end_time
    }

    /// Elapsed time between start and end, `None` while the span is open.
    ///
    /// Measured on the monotonic clock, so it is never negative.
    pub fn duration(&self) -> Option<Duration> {
        self.lock_state().elapsed
    }

    /// [`Span::duration`] in fractional milliseconds.
    pub fn duration_ms(&self) -> Option<f64> {
        self.duration().map(|d| d.as_secs_f64() * 1000.0)
    }

    /// Time since the span started, whether or not it has ended.
    pub fn elapsed(&self) -> Duration {
        self.duration()
            .unwrap_or_else(|| self.inner.started.elapsed())
    }

    /// End the span and notify its subscribers.
    ///
    /// Returns `false` without doing anything if the span already ended.
    pub fn end(&self) -> bool {
        {
            let mut state = self.lock_state();
            if state.end_time.is_some() {
                return false;
            }
            state.elapsed = Some(self.inner.started.elapsed());
            state.end_time = Some(Utc::now());
        }

        self.subscribers().notify_span_end(self);
        true
    }

    /// Whether both handles refer to the same span.
    pub fn ptr_eq(&self, other: &Span) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn read_context(&self) -> std::sync::RwLockReadGuard<'_, SpanContext> {
        self.inner
            .context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SpanState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let context = self.read_context();
        f.debug_struct("Span")
            .field("name", &context.name)
            .field("span_id", &context.span_id)
            .field("trace_id", &context.trace_id)
            .field("parent_span_id", &context.parent_span_id)
            .field("ended", &self.is_ended())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::{MemorySubscriber, SpanEvent};
    use crate::types::fields;
    use serde_json::json;

    #[test]
    fn test_child_inherits_trace_id() {
        let root = Span::create_root("checkout", None);
        let child = Span::create_child("charge-card", &root.context(), None);

        assert_eq!(child.trace_id(), root.trace_id());
        assert_eq!(child.parent_span_id(), Some(root.span_id()));
        assert_ne!(child.span_id(), root.span_id());
        assert!(root.parent_span_id().is_none());
    }

    #[test]
    fn test_duration_only_after_end() {
        let span = Span::create_root("work", None);
        assert!(span.duration().is_none());
        assert!(span.duration_ms().is_none());
        assert!(span.end_time().is_none());

        assert!(span.end());

        assert!(span.duration().is_some());
        assert!(span.duration_ms().unwrap() >= 0.0);
        assert!(span.end_time().unwrap() >= span.start_time());
    }

    #[test]
    fn test_second_end_is_ignored() {
        let memory = MemorySubscriber::shared();
        let span = Span::create_root("work", None);
        span.subscribe(memory.clone());

        assert!(span.end());
        let first_end = span.end_time();
        let first_duration = span.duration();
        std::thread::sleep(Duration::from_millis(2));

        assert!(!span.end());
        assert_eq!(span.end_time(), first_end);
        assert_eq!(span.duration(), first_duration);

        let ends = memory
            .span_events()
            .into_iter()
            .filter(SpanEvent::is_end)
            .count();
        assert_eq!(ends, 1);
    }

    #[test]
    fn test_set_metadata_merges() {
        let span = Span::create_root("work", Some(fields(json!({"user": "u1", "attempt": 1}))));
        span.set_metadata(fields(json!({"attempt": 2, "region": "eu"})));

        assert_eq!(
            serde_json::Value::Object(span.metadata().unwrap()),
            json!({"user": "u1", "attempt": 2, "region": "eu"})
        );
    }

    #[test]
    fn test_set_metadata_without_existing() {
        let span = Span::create_root("work", None);
        span.set_metadata(fields(json!({"k": "v"})));
        assert_eq!(span.metadata().unwrap()["k"], "v");
    }

    #[test]
    fn test_children_are_not_ended_with_parent() {
        let parent = Span::create_root("parent", None);
        let child = Span::create_child("child", &parent.context(), None);
        parent.add_child(child.clone());

        parent.end();

        assert_eq!(parent.children().len(), 1);
        assert!(parent.children()[0].ptr_eq(&child));
        assert!(!child.is_ended());
    }

    #[test]
    fn test_clone_is_same_span() {
        let span = Span::create_root("work", None);
        let handle = span.clone();
        handle.end();
        assert!(span.is_ended());
        assert!(span.ptr_eq(&handle));
    }
}
