//! Error types for the router module

use dbroute_core::ConfigError;
use thiserror::Error;

/// Router error types
///
/// Every variant is fatal to the routed call: the wrapped operation is never
/// executed against a physical resource once one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// Neither the call nor the config names a routing-key attribute
    #[error("No routing key attribute configured for this call and no default routerKey set")]
    MissingRouteKeyConfig,

    /// No call argument yielded a value for the routing-key attribute
    #[error("No argument provides a value for routing key attribute '{attr}'")]
    MissingRouteKey { attr: String },

    /// Routing key value is empty or blank
    #[error("Routing key value must not be empty")]
    InvalidKey,

    /// Split-table statement without a recognisable table reference
    #[error("No table reference found after FROM/INTO/UPDATE in statement: {sql}")]
    TableNameNotFound { sql: String },

    /// Split-table statement referencing more than one distinct table
    #[error("Statement references several tables {tables:?}; only one split table per statement is supported")]
    AmbiguousTableReference { tables: Vec<String> },

    /// Occurrence pattern for a table name could not be built
    #[error("Cannot match occurrences of table '{table}': {reason}")]
    TablePattern { table: String, reason: String },

    /// Split-table statement executed outside a routed call
    #[error("Statement for split table requires a routed call but no table key is set")]
    NotRouted,

    /// Explicit or computed shard lies outside the configured layout
    #[error("Shard db={db_index} tb={tb_index:?} is outside the configured layout")]
    ShardOutOfRange { db_index: u32, tb_index: Option<u32> },

    /// Selected database shard has no physical data source
    #[error("No data source registered for '{0}'")]
    UnknownDataSource(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Settings could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failure to read a named attribute from one call argument
///
/// Recoverable: the coordinator logs it and moves to the next argument.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    /// Argument has no attribute with that name
    #[error("no attribute named '{0}'")]
    NotFound(String),

    /// Attribute exists but cannot be rendered as a string
    #[error("attribute '{name}' is not a scalar value: {detail}")]
    Unreadable { name: String, detail: String },
}
