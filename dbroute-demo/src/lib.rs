//! dbroute Demo - a routed data-access facade
//!
//! Wires the routing engine to its collaborators the way an application
//! would:
//! - resolve the shard of a call
//! - pick the physical data source of that shard
//! - rewrite the statement for split tables
//! - clear the routing context when the call ends

use std::future::Future;

use dbroute_core::{DataSourceDescriptor, DataSourceRegistry, RouterSettings};
use dbroute_router::{
    CallArg, DynamicDataSource, RoutableEntity, RouterConfig, RouterError, RoutingContext,
    RoutingCoordinator, ShardIndex, StatementInterceptor,
};
use tracing::info;

/// A statement ready for dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedStatement {
    /// Shard the call was routed to
    pub shard: Option<ShardIndex>,

    /// URL of the selected physical data source
    pub data_source: String,

    /// Statement text after table rewriting
    pub sql: String,
}

/// Routed data-access facade
pub struct RoutedDao {
    coordinator: RoutingCoordinator,
    data_source: DynamicDataSource<DataSourceDescriptor>,
    interceptor: StatementInterceptor,
}

impl RoutedDao {
    /// Build from loaded settings
    pub fn from_settings(settings: &RouterSettings) -> Result<Self, RouterError> {
        let config = RouterConfig::from_settings(settings)?;
        let registry = DataSourceRegistry::from_settings(settings, |_, d| d.clone());

        info!(
            db_count = config.db_count(),
            tb_count = config.tb_count(),
            data_sources = ?registry.names(),
            "Routed DAO created"
        );

        Ok(Self {
            coordinator: RoutingCoordinator::new(config),
            data_source: DynamicDataSource::new(registry),
            interceptor: StatementInterceptor::new(),
        })
    }

    /// Register routing metadata of an entity
    pub fn with_entity(mut self, entity: RoutableEntity) -> Self {
        self.interceptor.register(entity);
        self
    }

    pub fn coordinator(&self) -> &RoutingCoordinator {
        &self.coordinator
    }

    /// Prepare a statement in the current (possibly unrouted) context
    pub fn prepare(&self, statement_id: &str, sql: &str) -> Result<RoutedStatement, RouterError> {
        let ctx = dbroute_router::context::current();
        self.prepare_in(ctx.as_ref(), statement_id, sql)
    }

    fn prepare_in(
        &self,
        ctx: Option<&RoutingContext>,
        statement_id: &str,
        sql: &str,
    ) -> Result<RoutedStatement, RouterError> {
        let target = self.data_source.target_for(ctx)?;
        let entity = self.interceptor.entity_for_statement(statement_id);
        let sql = self.interceptor.prepare_in(ctx, entity, sql)?;

        Ok(RoutedStatement {
            shard: None,
            data_source: target.url.clone(),
            sql: sql.into_owned(),
        })
    }

    /// Route a call and prepare its statement
    pub fn plan(
        &self,
        key_attr: Option<&str>,
        args: &[CallArg<'_>],
        statement_id: &str,
        sql: &str,
    ) -> Result<RoutedStatement, RouterError> {
        self.coordinator.execute(key_attr, args, |ctx| {
            let mut statement = self.prepare_in(Some(ctx), statement_id, sql)?;
            statement.shard = shard_of(ctx);
            Ok(statement)
        })
    }

    /// Route an async call; `dispatch` receives the prepared statement
    pub fn plan_async<'a, T, F, Fut>(
        &'a self,
        key_attr: Option<&str>,
        args: &[CallArg<'_>],
        statement_id: &'a str,
        sql: &'a str,
        dispatch: F,
    ) -> impl Future<Output = Result<T, RouterError>> + 'a
    where
        F: FnOnce(RoutedStatement) -> Fut + 'a,
        Fut: Future<Output = Result<T, RouterError>> + 'a,
        T: 'a,
    {
        self.coordinator
            .execute_async(key_attr, args, move |ctx| async move {
                // Collaborators read the ambient task-local context
                let mut statement = self.prepare(statement_id, sql)?;
                statement.shard = shard_of(&ctx);
                dispatch(statement).await
            })
    }
}

fn shard_of(ctx: &RoutingContext) -> Option<ShardIndex> {
    let db = ctx.db_key()?.parse().ok()?;
    let tb = ctx.tb_key()?.parse().ok()?;
    Some(ShardIndex::new(db, tb))
}
