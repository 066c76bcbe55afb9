//! Statement interception for split tables
//!
//! The execution layer hands every outgoing statement to a
//! [`StatementInterceptor`] before dispatch. Statements of entities flagged
//! `split_table` are rewritten to the physical table selected by the current
//! routing context; everything else passes through untouched.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{self, RoutingContext};
use crate::error::RouterError;
use crate::rewrite::TableNameRewriter;

/// Routing metadata of a logical entity (or the mapper that serves it)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoutableEntity {
    /// Entity or mapper name, e.g. `com.example.UserMapper`
    pub name: String,

    /// Rows are additionally partitioned across tables within a database
    #[serde(default)]
    pub split_table: bool,
}

impl RoutableEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            split_table: false,
        }
    }

    pub fn split(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            split_table: true,
        }
    }
}

/// Rewrites outgoing statements of split-table entities
#[derive(Debug, Clone, Default)]
pub struct StatementInterceptor {
    rewriter: TableNameRewriter,
    entities: HashMap<String, RoutableEntity>,
}

impl StatementInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register entity metadata, keyed by entity name
    pub fn with_entity(mut self, entity: RoutableEntity) -> Self {
        self.register(entity);
        self
    }

    pub fn register(&mut self, entity: RoutableEntity) {
        self.entities.insert(entity.name.clone(), entity);
    }

    pub fn entity(&self, name: &str) -> Option<&RoutableEntity> {
        self.entities.get(name)
    }

    /// Entity owning a statement id of the form `<entity>.<statement>`
    pub fn entity_for_statement(&self, statement_id: &str) -> Option<&RoutableEntity> {
        let (owner, _) = statement_id.rsplit_once('.')?;
        self.entity(owner)
    }

    /// Prepare a statement against the innermost active routing context
    pub fn prepare<'a>(
        &self,
        entity: Option<&RoutableEntity>,
        sql: &'a str,
    ) -> Result<Cow<'a, str>, RouterError> {
        let ctx = context::current();
        self.prepare_in(ctx.as_ref(), entity, sql)
    }

    /// Prepare a statement identified by `<entity>.<statement>`
    pub fn prepare_statement<'a>(
        &self,
        statement_id: &str,
        sql: &'a str,
    ) -> Result<Cow<'a, str>, RouterError> {
        self.prepare(self.entity_for_statement(statement_id), sql)
    }

    /// Prepare a statement against an explicitly passed context
    pub fn prepare_in<'a>(
        &self,
        ctx: Option<&RoutingContext>,
        entity: Option<&RoutableEntity>,
        sql: &'a str,
    ) -> Result<Cow<'a, str>, RouterError> {
        let entity = match entity {
            Some(entity) if entity.split_table => entity,
            _ => return Ok(Cow::Borrowed(sql)),
        };

        let tb_key = ctx
            .and_then(RoutingContext::tb_key)
            .ok_or(RouterError::NotRouted)?;

        debug!(entity = %entity.name, tb_key = %tb_key, "Routing split-table statement");
        self.rewriter.rewrite(sql, tb_key).map(Cow::Owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::enter;
    use crate::types::ShardIndex;

    fn interceptor() -> StatementInterceptor {
        StatementInterceptor::new()
            .with_entity(RoutableEntity::split("app.OrderMapper"))
            .with_entity(RoutableEntity::new("app.UserMapper"))
    }

    #[test]
    fn test_split_entity_is_rewritten() {
        let interceptor = interceptor();
        let _scope = enter(RoutingContext::routed(ShardIndex::new(1, 3)));

        let sql = interceptor
            .prepare_statement("app.OrderMapper.queryById", "select * from order where id = ?")
            .unwrap();
        assert_eq!(sql, "select * from order_003 where id = ?");
    }

    #[test]
    fn test_unsplit_and_unknown_entities_pass_through() {
        let interceptor = interceptor();
        let _scope = enter(RoutingContext::routed(ShardIndex::new(1, 3)));

        let sql = interceptor
            .prepare_statement("app.UserMapper.queryById", "select * from user")
            .unwrap();
        assert!(matches!(sql, Cow::Borrowed("select * from user")));

        let sql = interceptor
            .prepare_statement("app.Unknown.find", "select * from thing")
            .unwrap();
        assert_eq!(sql, "select * from thing");

        // Not split, so no table reference is needed at all
        assert!(interceptor.prepare(None, "select 1").is_ok());
    }

    #[test]
    fn test_split_statement_outside_route_fails() {
        let interceptor = interceptor();
        let entity = RoutableEntity::split("app.OrderMapper");

        let err = interceptor
            .prepare(Some(&entity), "select * from order")
            .unwrap_err();
        assert_eq!(err, RouterError::NotRouted);

        // A database-only route does not select a table either
        let mut ctx = RoutingContext::new();
        ctx.set_db_index(1);
        let err = interceptor
            .prepare_in(Some(&ctx), Some(&entity), "select * from order")
            .unwrap_err();
        assert_eq!(err, RouterError::NotRouted);
    }

    #[test]
    fn test_explicit_context() {
        let interceptor = StatementInterceptor::new();
        let entity = RoutableEntity::split("Order");
        let ctx = RoutingContext::routed(ShardIndex::new(2, 4));

        let sql = interceptor
            .prepare_in(Some(&ctx), Some(&entity), "update order set s = ? where id = ?")
            .unwrap();
        assert_eq!(sql, "update order_004 set s = ? where id = ?");
    }

    #[test]
    fn test_statement_id_without_owner() {
        let interceptor = interceptor();
        assert!(interceptor.entity_for_statement("queryById").is_none());
        assert_eq!(
            interceptor
                .entity_for_statement("app.OrderMapper.insert")
                .map(|e| e.split_table),
            Some(true)
        );
    }

    #[test]
    fn test_entity_metadata_from_json() {
        let entity: RoutableEntity =
            serde_json::from_str(r#"{ "name": "app.OrderMapper", "split_table": true }"#).unwrap();
        assert!(entity.split_table);

        let entity: RoutableEntity = serde_json::from_str(r#"{ "name": "app.UserMapper" }"#).unwrap();
        assert!(!entity.split_table);
    }
}
