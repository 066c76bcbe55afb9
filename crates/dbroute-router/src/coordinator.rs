//! Routing Coordinator
//!
//! Orchestrates one routed call:
//!
//! ```text
//! call(key attr?, args)
//!        │
//!        ▼
//! Key attribute name? ──No──► MissingRouteKeyConfig
//!        │ (per-call, else config default)
//!        ▼
//! Extract key value ──None──► MissingRouteKey
//!        │
//!        ▼
//! ShardStrategy::resolve ──blank──► InvalidKey
//!        │
//!        ▼
//! Install RoutingContext ──► run operation ──► clear (always)
//! ```
//!
//! Errors are raised before the wrapped operation runs. Once the context is
//! installed, removal is tied to a guard (sync) or to the lifetime of the
//! future (async), so it happens on success, on error, on panic and on
//! cancellation alike.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, debug_span, Instrument};
use uuid::Uuid;

use crate::attribute::{extract_route_key, CallArg};
use crate::config::RouterConfig;
use crate::context::{self, ContextScope, RoutingContext};
use crate::error::RouterError;
use crate::strategy::{HashSlotStrategy, ShardStrategy};
use crate::types::ShardIndex;

/// Routes calls to shards and scopes the resulting context
#[derive(Debug, Clone)]
pub struct RoutingCoordinator<S = HashSlotStrategy> {
    config: Arc<RouterConfig>,
    strategy: S,
}

impl RoutingCoordinator<HashSlotStrategy> {
    /// Create with the default hash slot strategy
    pub fn new(config: RouterConfig) -> Self {
        Self::with_strategy(config, HashSlotStrategy::new())
    }
}

impl<S: ShardStrategy> RoutingCoordinator<S> {
    /// Create with a custom strategy
    pub fn with_strategy(config: RouterConfig, strategy: S) -> Self {
        Self {
            config: Arc::new(config),
            strategy,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn db_count(&self) -> u32 {
        self.config.db_count()
    }

    pub fn tb_count(&self) -> u32 {
        self.config.tb_count()
    }

    /// Attribute name to route by: the per-call one, else the configured default
    pub fn key_attribute<'a>(&'a self, explicit: Option<&'a str>) -> Result<&'a str, RouterError> {
        explicit
            .filter(|attr| !attr.trim().is_empty())
            .or_else(|| self.config.default_router_key())
            .ok_or(RouterError::MissingRouteKeyConfig)
    }

    /// Resolve a routing-key value directly
    pub fn resolve_key(&self, key: &str) -> Result<ShardIndex, RouterError> {
        self.strategy.resolve(key, &self.config)
    }

    /// Resolve the shard of a call without installing a context
    pub fn resolve(
        &self,
        key_attr: Option<&str>,
        args: &[CallArg<'_>],
    ) -> Result<ShardIndex, RouterError> {
        let attr = self.key_attribute(key_attr)?;
        let key = extract_route_key(attr, args)?;
        let index = self.resolve_key(&key)?;

        debug!(
            strategy = self.strategy.name(),
            attr = %attr,
            db_index = index.db_index,
            tb_index = index.tb_index,
            "Resolved shard"
        );

        Ok(index)
    }

    /// Route a call on the current thread
    ///
    /// The context stays current until the returned guard is finished or dropped.
    pub fn route(
        &self,
        key_attr: Option<&str>,
        args: &[CallArg<'_>],
    ) -> Result<RouteGuard, RouterError> {
        let index = self.resolve(key_attr, args)?;
        Ok(RouteGuard::enter(RoutingContext::routed(index)))
    }

    /// Route to an explicit shard, bypassing key resolution
    ///
    /// For code that picks a shard itself, e.g. around a programmatic
    /// transaction block.
    pub fn route_to(&self, index: ShardIndex) -> Result<RouteGuard, RouterError> {
        self.check_range(index.db_index, Some(index.tb_index))?;
        Ok(RouteGuard::enter(RoutingContext::routed(index)))
    }

    /// Route to an explicit database only; no table key is set
    pub fn route_to_db(&self, db_index: u32) -> Result<RouteGuard, RouterError> {
        self.check_range(db_index, None)?;
        let mut ctx = RoutingContext::new();
        ctx.set_db_index(db_index);
        Ok(RouteGuard::enter(ctx))
    }

    fn check_range(&self, db_index: u32, tb_index: Option<u32>) -> Result<(), RouterError> {
        let db_ok = (1..=self.db_count()).contains(&db_index);
        let tb_ok = tb_index.map_or(true, |tb| (1..=self.tb_count()).contains(&tb));
        if db_ok && tb_ok {
            Ok(())
        } else {
            Err(RouterError::ShardOutOfRange { db_index, tb_index })
        }
    }

    /// Run `op` inside a routed scope on the current thread
    ///
    /// Routing errors are returned before `op` runs. The context is cleared
    /// after `op` returns, whatever the outcome.
    pub fn execute<T, E, F>(
        &self,
        key_attr: Option<&str>,
        args: &[CallArg<'_>],
        op: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&RoutingContext) -> Result<T, E>,
        E: From<RouterError>,
    {
        let guard = self.route(key_attr, args)?;
        let result = op(guard.context());
        guard.finish();
        result
    }

    /// Run the future produced by `op` inside a task-local routed scope
    ///
    /// Resolution happens eagerly, before the returned future is first polled,
    /// so the arguments need not outlive the call.
    pub fn execute_async<T, E, F, Fut>(
        &self,
        key_attr: Option<&str>,
        args: &[CallArg<'_>],
        op: F,
    ) -> impl Future<Output = Result<T, E>>
    where
        F: FnOnce(RoutingContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RouterError>,
    {
        let resolved = self.resolve(key_attr, args);
        let id = Uuid::new_v4();

        async move {
            let index = resolved?;
            let ctx = RoutingContext::routed(index);
            let span = debug_span!(
                "routed",
                id = %id,
                db = index.db_index,
                tb = index.tb_index
            );

            let result = context::scope(ctx.clone(), async move { op(ctx).await })
                .instrument(span)
                .await;

            debug!(id = %id, "Routing context cleared");
            result
        }
    }
}

/// Guard of one synchronous routed call
///
/// Dropping the guard (or calling [`RouteGuard::finish`]) clears the context.
#[must_use = "the call is unrouted as soon as the guard is dropped"]
#[derive(Debug)]
pub struct RouteGuard {
    id: Uuid,
    ctx: RoutingContext,
    scope: Option<ContextScope>,
}

impl RouteGuard {
    fn enter(ctx: RoutingContext) -> Self {
        let id = Uuid::new_v4();
        debug!(
            id = %id,
            db_key = ?ctx.db_key(),
            tb_key = ?ctx.tb_key(),
            "Routing context set"
        );

        Self {
            id,
            scope: Some(context::enter(ctx.clone())),
            ctx,
        }
    }

    /// Invocation id used in logs
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Context installed by this guard
    pub fn context(&self) -> &RoutingContext {
        &self.ctx
    }

    /// Clear the context now
    pub fn finish(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(scope) = self.scope.take() {
            scope.finish();
            self.ctx.clear();
            debug!(id = %self.id, "Routing context cleared");
        }
    }
}

impl Drop for RouteGuard {
    fn drop(&mut self) {
        self.release();
    }
}
