// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Current-span propagation.
//!
//! The current span follows the flow of execution instead of being a
//! process-wide lookup. Synchronous scopes push onto a thread-local stack;
//! asynchronous scopes bind a tokio task-local for the lifetime of the
//! future. The innermost synchronous scope wins over the task scope, since
//! a synchronous scope cannot yield while it is open.
//!
//! Every entry is tagged with the [`ScopeOwner`] of the tracer that opened
//! it, so independent tracers sharing a thread or task never see each
//! other's spans.

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;

use super::span::Span;

/// Identity of the tracer a scope belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeOwner(usize);

impl ScopeOwner {
    pub(crate) fn new(key: usize) -> Self {
        Self(key)
    }
}

type Entry = (ScopeOwner, Span);

thread_local! {
    static SYNC_SCOPES: RefCell<Vec<Entry>> = const { RefCell::new(Vec::new()) };
}

tokio::task_local! {
    static TASK_SCOPES: Vec<Entry>;
}

fn innermost(entries: &[Entry], owner: ScopeOwner) -> Option<Span> {
    entries
        .iter()
        .rev()
        .find(|(o, _)| *o == owner)
        .map(|(_, span)| span.clone())
}

/// The span of the innermost scope opened by `owner`, if any.
pub fn current(owner: ScopeOwner) -> Option<Span> {
    SYNC_SCOPES
        .with(|scopes| innermost(&scopes.borrow(), owner))
        .or_else(|| {
            TASK_SCOPES
                .try_with(|scopes| innermost(scopes, owner))
                .ok()
                .flatten()
        })
}

/// Guard that keeps a span current on this thread until dropped.
///
/// Not `Send`: the scope is tied to the thread that opened it.
pub struct SyncScope {
    owner: ScopeOwner,
    span: Span,
    _not_send: PhantomData<*const ()>,
}

/// Make `span` current for `owner` for the rest of the enclosing block.
pub fn enter(owner: ScopeOwner, span: Span) -> SyncScope {
    SYNC_SCOPES.with(|scopes| scopes.borrow_mut().push((owner, span.clone())));
    SyncScope {
        owner,
        span,
        _not_send: PhantomData,
    }
}

impl Drop for SyncScope {
    fn drop(&mut self) {
        SYNC_SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            if let Some(index) = scopes
                .iter()
                .rposition(|(o, s)| *o == self.owner && s.ptr_eq(&self.span))
            {
                scopes.remove(index);
            }
        });
    }
}

/// Run `future` with `span` as the current span of its task for `owner`.
///
/// Scopes opened by other owners in the enclosing task stay visible to them.
pub async fn scope<F>(owner: ScopeOwner, span: Span, future: F) -> F::Output
where
    F: Future,
{
    let mut entries = TASK_SCOPES.try_with(Vec::clone).unwrap_or_default();
    entries.push((owner, span));
    TASK_SCOPES.scope(entries, future).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: ScopeOwner = ScopeOwner(1);
    const OTHER: ScopeOwner = ScopeOwner(2);

    #[test]
    fn test_no_scope_means_no_current() {
        assert!(current(OWNER).is_none());
    }

    #[test]
    fn test_sync_scopes_nest() {
        let outer = Span::create_root("outer", None);
        let inner = Span::create_child("inner", &outer.context(), None);

        let _outer_scope = enter(OWNER, outer.clone());
        assert!(current(OWNER).unwrap().ptr_eq(&outer));
        {
            let _inner_scope = enter(OWNER, inner.clone());
            assert!(current(OWNER).unwrap().ptr_eq(&inner));
        }
        assert!(current(OWNER).unwrap().ptr_eq(&outer));
    }

    #[test]
    fn test_out_of_order_drop_removes_own_entry() {
        let outer = Span::create_root("outer", None);
        let inner = Span::create_child("inner", &outer.context(), None);

        let outer_scope = enter(OWNER, outer.clone());
        let inner_scope = enter(OWNER, inner.clone());

        drop(outer_scope);
        assert!(current(OWNER).unwrap().ptr_eq(&inner));

        drop(inner_scope);
        assert!(current(OWNER).is_none());
    }

    #[test]
    fn test_owners_do_not_see_each_other() {
        let mine = Span::create_root("mine", None);
        let theirs = Span::create_root("theirs", None);

        let _mine = enter(OWNER, mine.clone());
        assert!(current(OTHER).is_none());

        let _theirs = enter(OTHER, theirs.clone());
        assert!(current(OWNER).unwrap().ptr_eq(&mine));
        assert!(current(OTHER).unwrap().ptr_eq(&theirs));
    }

    #[tokio::test]
    async fn test_task_scope() {
        let span = Span::create_root("task", None);
        let seen = scope(OWNER, span.clone(), async { current(OWNER) }).await;

        assert!(seen.unwrap().ptr_eq(&span));
        assert!(current(OWNER).is_none());
    }

    #[tokio::test]
    async fn test_nested_task_scopes_keep_outer_owner() {
        let outer = Span::create_root("outer", None);
        let other = Span::create_root("other", None);

        scope(OWNER, outer.clone(), async {
            scope(OTHER, other.clone(), async {
                assert!(current(OWNER).unwrap().ptr_eq(&outer));
                assert!(current(OTHER).unwrap().ptr_eq(&other));
            })
            .await;
        })
        .await;
    }

    #[tokio::test]
    async fn test_sync_scope_inside_task_scope() {
        let task_span = Span::create_root("task", None);
        let sync_span = Span::create_child("sync", &task_span.context(), None);

        scope(OWNER, task_span.clone(), async {
            {
                let _guard = enter(OWNER, sync_span.clone());
                assert!(current(OWNER).unwrap().ptr_eq(&sync_span));
            }
            assert!(current(OWNER).unwrap().ptr_eq(&task_span));
        })
        .await;
    }
}
