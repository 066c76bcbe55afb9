//! Data source selection from the routing context

use std::sync::Arc;

use dbroute_core::DataSourceRegistry;
use tracing::trace;

use crate::context::{self, RoutingContext};
use crate::error::RouterError;
use crate::types::DATA_SOURCE_PREFIX;

/// Trait for mapping a routing context to a data source lookup key
pub trait DataSourceSelector: Send + Sync {
    /// Lookup key of the target; `None` selects the default data source
    fn lookup_key(&self, ctx: Option<&RoutingContext>) -> Option<String>;
}

/// Prefixes the database key: `"01"` -> `"db01"`
#[derive(Debug, Clone)]
pub struct PrefixSelector {
    prefix: String,
}

impl PrefixSelector {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for PrefixSelector {
    fn default() -> Self {
        Self::new(DATA_SOURCE_PREFIX)
    }
}

impl DataSourceSelector for PrefixSelector {
    fn lookup_key(&self, ctx: Option<&RoutingContext>) -> Option<String> {
        ctx.and_then(RoutingContext::db_key)
            .map(|key| format!("{}{}", self.prefix, key))
    }
}

/// Data source that follows the current routing context
pub struct DynamicDataSource<T, S = PrefixSelector> {
    registry: DataSourceRegistry<T>,
    selector: S,
}

impl<T> DynamicDataSource<T, PrefixSelector> {
    pub fn new(registry: DataSourceRegistry<T>) -> Self {
        Self::with_selector(registry, PrefixSelector::default())
    }
}

impl<T, S: DataSourceSelector> DynamicDataSource<T, S> {
    pub fn with_selector(registry: DataSourceRegistry<T>, selector: S) -> Self {
        Self { registry, selector }
    }

    pub fn registry(&self) -> &DataSourceRegistry<T> {
        &self.registry
    }

    /// Lookup key for the innermost active routing context
    pub fn current_lookup_key(&self) -> Option<String> {
        let ctx = context::current();
        self.selector.lookup_key(ctx.as_ref())
    }

    /// Target for the innermost active routing context
    pub fn determine_target(&self) -> Result<Arc<T>, RouterError> {
        let ctx = context::current();
        self.target_for(ctx.as_ref())
    }

    /// Target for an explicit context
    ///
    /// Unrouted calls get the default target. A routed call whose database
    /// has no registered target is an error, never a silent fallback.
    pub fn target_for(&self, ctx: Option<&RoutingContext>) -> Result<Arc<T>, RouterError> {
        match self.selector.lookup_key(ctx) {
            Some(key) => {
                trace!(key = %key, "Selecting routed data source");
                self.registry
                    .get(&key)
                    .ok_or(RouterError::UnknownDataSource(key))
            }
            None => Ok(self.registry.default_target()),
        }
    }
}
