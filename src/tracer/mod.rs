// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Span creation, the active-span registry and scoped execution.
//!
//! The [`Tracer`] owns every span that has been started and not yet ended
//! through it. Spans remain usable after they leave the registry, so callers
//! can still inspect durations and metadata.
//!
//! # Usage
//!
//! ```rust,ignore
//! use spanlog::tracer::Tracer;
//!
//! let tracer = Tracer::new();
//! let total = tracer.in_span("sum", None, None, |span| {
//!     span.set_metadata(spanlog::fields(serde_json::json!({"items": 3})));
//!     1 + 2 + 3
//! });
//! assert!(tracer.active_spans().is_empty());
//! ```

pub mod context;
mod span;

pub use span::Span;

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use crate::ids::SpanId;
use crate::subscriber::{SharedSubscriber, SubscriberList};
use crate::types::{Fields, SpanContext};

/// Creates and tracks spans.
///
/// Cloning a `Tracer` yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

#[derive(Default)]
struct TracerInner {
    /// Active spans in insertion order.
    active: RwLock<Vec<Span>>,
    subscribers: RwLock<SubscriberList>,
}

impl Tracer {
    /// Create a tracer with no subscribers and no active spans.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for spans started from now on.
    pub fn subscribe(&self, subscriber: SharedSubscriber) {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(subscriber);
    }

    /// Remove a subscriber. Spans that already carry it keep it.
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

    /// Start a span, as a child of `parent` when given, otherwise as a root.
    ///
    /// The new span carries the tracer's current subscribers, which are
    /// notified of the start before the span enters the registry. If the
    /// parent is still active the new span is registered as its child.
    pub fn start_span(
        &self,
        name: impl Into<String>,
        parent: Option<&SpanContext>,
        metadata: Option<Fields>,
    ) -> Span {
        let span = match parent {
            Some(parent) => Span::create_child(name, parent, metadata),
            None => Span::create_root(name, metadata),
        };

        let subscribers = self.subscribers();
        span.attach_subscribers(subscribers.clone());
        subscribers.notify_span_start(&span);

        let parent_span = {
            let mut active = self.write_active();
            active.push(span.clone());
            parent.and_then(|p| active.iter().find(|s| s.span_id() == p.span_id).cloned())
        };
        if let Some(parent_span) = parent_span {
            parent_span.add_child(span.clone());
        }

        tracing::trace!(span = %span.name(), span_id = %span.span_id(), "Span started");
        span
    }

    /// End the span with `span_id` if it is still open and drop it from the
    /// registry. Unknown ids are ignored.
    pub fn end_span(&self, span_id: &SpanId) {
        let removed = {
            let mut active = self.write_active();
            let index = active.iter().position(|s| s.span_id() == *span_id);
            index.map(|index| active.remove(index))
        };

        if let Some(span) = removed {
            span.end();
        }
    }

    /// Look up an active span by id.
    pub fn active_span(&self, span_id: &SpanId) -> Option<Span> {
        self.read_active()
            .iter()
            .find(|s| s.span_id() == *span_id)
            .cloned()
    }

    /// All active spans in the order they were started.
    pub fn active_spans(&self) -> Vec<Span> {
        self.read_active().clone()
    }

    /// The span of the innermost `in_span` / `in_span_async` scope
    /// enclosing the caller.
    pub fn current_span(&self) -> Option<Span> {
        context::current(self.scope_owner())
    }

    /// Make `span` current for this tracer until the guard is dropped.
    pub fn enter(&self, span: Span) -> context::SyncScope {
        context::enter(self.scope_owner(), span)
    }

    /// Run `future` with `span` current for this tracer within its task.
    pub async fn scope<F: Future>(&self, span: Span, future: F) -> F::Output {
        context::scope(self.scope_owner(), span, future).await
    }

    fn scope_owner(&self) -> context::ScopeOwner {
        context::ScopeOwner::new(Arc::as_ptr(&self.inner) as usize)
    }

    /// The most recently started span that is still open, regardless of
    /// which flow of execution started it.
    pub fn last_active_span(&self) -> Option<Span> {
        self.read_active()
            .iter()
            .rev()
            .find(|s| !s.is_ended())
            .cloned()
    }

    /// Run `f` inside a new span.
    ///
    /// The span is current for the duration of `f` and is ended and removed
    /// on every exit path, including `Err` results and panics.
    pub fn in_span<R>(
        &self,
        name: impl Into<String>,
        parent: Option<&SpanContext>,
        metadata: Option<Fields>,
        f: impl FnOnce(&Span) -> R,
    ) -> R {
        let span = self.start_span(name, parent, metadata);
        let _guard = SpanGuard::new(self.clone(), &span);
        let _scope = self.enter(span.clone());
        f(&span)
    }

    /// Run the future produced by `f` inside a new span.
    ///
    /// The span is current for the task while the future runs. It is ended
    /// and removed when the future completes, whatever its output, and also
    /// when the future is dropped before completing.
    pub async fn in_span_async<F, Fut, R>(
        &self,
        name: impl Into<String>,
        parent: Option<&SpanContext>,
        metadata: Option<Fields>,
        f: F,
    ) -> R
    where
        F: FnOnce(Span) -> Fut,
        Fut: Future<Output = R>,
    {
        let span = self.start_span(name, parent, metadata);
        let guard = SpanGuard::new(self.clone(), &span);
        let output = self.scope(span.clone(), f(span)).await;
        drop(guard);
        output
    }

    /// End every active span and clear the registry.
    pub fn finish_all(&self) {
        let drained: Vec<Span> = std::mem::take(&mut *self.write_active());
        let count = drained.len();
        for span in drained {
            span.end();
        }
        if count > 0 {
            tracing::debug!(count, "Finished all active spans");
        }
    }

    fn read_active(&self) -> std::sync::RwLockReadGuard<'_, Vec<Span>> {
        self.inner
            .active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_active(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Span>> {
        self.inner
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("active", &self.read_active().len())
            .field("subscribers", &self.subscribers().len())
            .finish()
    }
}

/// Ends a span through its tracer when dropped.
pub(crate) struct SpanGuard {
    tracer: Tracer,
    span_id: SpanId,
}

impl SpanGuard {
    pub(crate) fn new(tracer: Tracer, span: &Span) -> Self {
        Self {
            tracer,
            span_id: span.span_id(),
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.tracer.end_span(&self.span_id);
    }
}
