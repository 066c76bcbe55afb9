//! Routing context
//!
//! Carries the resolved database and table keys from resolution time to
//! execution time. A context belongs to exactly one routed invocation.
//!
//! Two ambient scopes make the current context visible to collaborators
//! (data source selection, statement rewriting) without threading it through
//! every call:
//!
//! - [`enter`] installs a context for synchronous code on the current thread
//!   and returns a [`ContextScope`] guard that restores the previous state on
//!   drop, including during unwinding.
//! - [`scope`] runs a future with a task-local context. The context lives
//!   exactly as long as the future; dropping the future (cancellation)
//!   discards it. Spawned tasks do not inherit it.
//!
//! Scopes nest: an inner routed call sees only its own context, and the outer
//! one is visible again once the inner scope ends.

use std::cell::RefCell;
use std::future::{poll_fn, Future};
use std::marker::PhantomData;

use crate::types::{format_db_key, format_tb_key, ShardIndex, DATA_SOURCE_PREFIX};

/// Resolved shard keys of one routed invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingContext {
    db_key: Option<String>,
    tb_key: Option<String>,
}

impl RoutingContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context populated from a resolved index
    pub fn routed(index: ShardIndex) -> Self {
        let mut ctx = Self::new();
        ctx.set(index);
        ctx
    }

    /// Store both keys of a resolved index
    pub fn set(&mut self, index: ShardIndex) {
        self.set_db_index(index.db_index);
        self.set_tb_index(index.tb_index);
    }

    /// Select a database explicitly
    pub fn set_db_index(&mut self, db_index: u32) {
        self.db_key = Some(format_db_key(db_index));
    }

    /// Select a table explicitly
    pub fn set_tb_index(&mut self, tb_index: u32) {
        self.tb_key = Some(format_tb_key(tb_index));
    }

    /// Zero-padded database key, e.g. `"01"`
    pub fn db_key(&self) -> Option<&str> {
        self.db_key.as_deref()
    }

    /// Zero-padded table key, e.g. `"003"`
    pub fn tb_key(&self) -> Option<&str> {
        self.tb_key.as_deref()
    }

    /// Data source name of the selected database, e.g. `"db01"`
    pub fn data_source_name(&self) -> Option<String> {
        self.db_key
            .as_ref()
            .map(|key| format!("{}{}", DATA_SOURCE_PREFIX, key))
    }

    /// Forget both keys; calling it again is a no-op
    pub fn clear(&mut self) {
        self.db_key = None;
        self.tb_key = None;
    }

    pub fn is_empty(&self) -> bool {
        self.db_key.is_none() && self.tb_key.is_none()
    }
}

thread_local! {
    static SYNC_CONTEXT: RefCell<Option<RoutingContext>> = const { RefCell::new(None) };
}

tokio::task_local! {
    static TASK_CONTEXT: RefCell<RoutingContext>;
}

/// Guard of a synchronous routing scope
///
/// Not `Send`: the scope is bound to the thread that entered it and must not
/// be held across an `.await`; use [`scope`] for async code.
#[must_use = "the routing context is removed as soon as the scope is dropped"]
#[derive(Debug)]
pub struct ContextScope {
    previous: Option<RoutingContext>,
    active: bool,
    _not_send: PhantomData<*const ()>,
}

/// Install `ctx` as the current context of this thread
pub fn enter(ctx: RoutingContext) -> ContextScope {
    let previous = SYNC_CONTEXT
        .try_with(|cell| cell.borrow_mut().replace(ctx))
        .unwrap_or(None);

    ContextScope {
        previous,
        active: true,
        _not_send: PhantomData,
    }
}

impl ContextScope {
    /// End the scope now, restoring whatever was current before it
    pub fn finish(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        let previous = self.previous.take();
        // Thread may be tearing down; nothing left to restore then
        let _ = SYNC_CONTEXT.try_with(|cell| *cell.borrow_mut() = previous);
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Run `fut` with `ctx` as its task-local routing context
///
/// While `fut` is polled, a synchronous context entered outside of it is
/// hidden, so the task-local context is the innermost one. A synchronous
/// scope entered inside `fut` is parked between polls and reinstated on the
/// next one.
pub async fn scope<F>(ctx: RoutingContext, fut: F) -> F::Output
where
    F: Future,
{
    let fut = TASK_CONTEXT.scope(RefCell::new(ctx), fut);
    tokio::pin!(fut);

    let mut parked: Option<RoutingContext> = None;
    poll_fn(move |cx| {
        let _swap = SyncSwap {
            outer: swap_sync(parked.take()),
            parked: &mut parked,
        };
        fut.as_mut().poll(cx)
    })
    .await
}

/// Replace the synchronous context of this thread, returning the old one
fn swap_sync(ctx: Option<RoutingContext>) -> Option<RoutingContext> {
    SYNC_CONTEXT
        .try_with(|cell| std::mem::replace(&mut *cell.borrow_mut(), ctx))
        .unwrap_or(None)
}

/// Puts the outer synchronous context back after one poll, also on unwind
struct SyncSwap<'a> {
    outer: Option<RoutingContext>,
    parked: &'a mut Option<RoutingContext>,
}

impl Drop for SyncSwap<'_> {
    fn drop(&mut self) {
        *self.parked = swap_sync(self.outer.take());
    }
}

/// Read the innermost active context
///
/// A synchronous context visible here was entered by the code running right
/// now (outer ones are hidden by [`scope`]), so it takes precedence over the
/// task-local one.
pub fn with_current<R>(f: impl FnOnce(Option<&RoutingContext>) -> R) -> R {
    let sync = SYNC_CONTEXT
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten();
    if let Some(ctx) = sync {
        return f(Some(&ctx));
    }

    let task = TASK_CONTEXT.try_with(|cell| cell.borrow().clone()).ok();
    f(task.as_ref())
}

/// Snapshot of the innermost active context
pub fn current() -> Option<RoutingContext> {
    with_current(|ctx| ctx.cloned())
}

/// Database key of the innermost active context
pub fn current_db_key() -> Option<String> {
    with_current(|ctx| ctx.and_then(|c| c.db_key().map(str::to_string)))
}

/// Table key of the innermost active context
pub fn current_tb_key() -> Option<String> {
    with_current(|ctx| ctx.and_then(|c| c.tb_key().map(str::to_string)))
}

/// Modify the innermost active context
///
/// `f` works on a copy that is stored back once it returns; readers called
/// from inside `f` still see the unmodified context. Returns `false` when no
/// routing scope is active.
pub fn update_current(f: impl FnOnce(&mut RoutingContext)) -> bool {
    let sync = SYNC_CONTEXT
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten();
    if let Some(mut ctx) = sync {
        f(&mut ctx);
        let _ = SYNC_CONTEXT.try_with(|cell| *cell.borrow_mut() = Some(ctx));
        return true;
    }

    match TASK_CONTEXT.try_with(|cell| cell.borrow().clone()) {
        Ok(mut ctx) => {
            f(&mut ctx);
            let _ = TASK_CONTEXT.try_with(|cell| *cell.borrow_mut() = ctx);
            true
        }
        Err(_) => false,
    }
}
