//! dbroute Router - Database and Table Sharding
//!
//! Routes logical data-access calls to a physical database and table.
//!
//! # Architecture
//!
//! ```text
//! Routed call (key attr, args)
//!     │
//!     ▼
//! ┌─────────────────────────┐
//! │   RoutingCoordinator    │  Extracts key, resolves shard,
//! │   (Which shard?)        │  scopes the RoutingContext
//! └───────────┬─────────────┘
//!             │  RoutingContext { db "01", tb "003" }
//!     ┌───────┴──────────────────────┐
//!     ▼                              ▼
//! ┌─────────────────────┐   ┌─────────────────────────┐
//! │  DynamicDataSource  │   │  StatementInterceptor   │
//! │  ("db" + db key)    │   │  (table_<tb key>)       │
//! └─────────────────────┘   └─────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use dbroute_router::{CallArg, RouterConfig, RoutingCoordinator, RouterError};
//!
//! let config = RouterConfig::new(2, 4)?.with_default_router_key("userId");
//! let coordinator = RoutingCoordinator::new(config);
//!
//! let rows = coordinator.execute(None, &[CallArg::from("10000")], |ctx| {
//!     // ctx.db_key() == Some("01"), ctx.tb_key() == Some("001")
//!     run_query(ctx)
//! })?;
//! ```

// Core modules
mod config;
mod error;
mod types;

// Routing context and scopes
pub mod context;

// Strategy module (shard resolution)
mod strategy;

// Routing and execution-side collaborators
mod attribute;
mod coordinator;
mod datasource;
mod interceptor;
mod rewrite;

// Re-exports: Error types
pub use error::{AttributeError, RouterError};

// Re-exports: Core types
pub use config::RouterConfig;
pub use types::{
    format_db_key, format_tb_key, ShardIndex, DATA_SOURCE_PREFIX, DB_KEY_WIDTH, TB_KEY_WIDTH,
};

// Re-exports: Context
pub use context::{current_db_key, current_tb_key, ContextScope, RoutingContext};

// Re-exports: Strategies
pub use strategy::{java_string_hash, HashSlotStrategy, KeyHasher, ShardStrategy};

// Re-exports: Routing
pub use attribute::{extract_route_key, CallArg, HasNamedAttribute};
pub use coordinator::{RouteGuard, RoutingCoordinator};

// Re-exports: Execution-side collaborators
pub use datasource::{DataSourceSelector, DynamicDataSource, PrefixSelector};
pub use interceptor::{RoutableEntity, StatementInterceptor};
pub use rewrite::{physical_table_name, TableNameRewriter};
