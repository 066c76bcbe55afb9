//! dbroute Core - settings and physical data sources
//!
//! This crate provides the pieces of the routing layer that belong
//! to the environment rather than to the routing engine itself.

pub mod config;
pub mod datasource;

pub use config::{ConfigError, DataSourceDescriptor, RouterSettings, ENV_PREFIX, PROPERTY_PREFIX};
pub use datasource::DataSourceRegistry;
