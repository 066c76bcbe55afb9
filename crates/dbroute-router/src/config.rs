//! Immutable router configuration

use dbroute_core::RouterSettings;
use tracing::warn;

use crate::error::RouterError;

/// Shard layout and default routing-key attribute
///
/// Built once at startup and shared read-only (typically behind an `Arc`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    db_count: u32,
    tb_count: u32,
    default_router_key: Option<String>,
}

impl RouterConfig {
    /// Create a config for `db_count` databases of `tb_count` tables each
    pub fn new(db_count: u32, tb_count: u32) -> Result<Self, RouterError> {
        if db_count == 0 || tb_count == 0 {
            return Err(RouterError::InvalidConfig(format!(
                "dbCount and tbCount must be at least 1 (got {} and {})",
                db_count, tb_count
            )));
        }

        let slots = db_count.checked_mul(tb_count).ok_or_else(|| {
            RouterError::InvalidConfig(format!(
                "shard slot space overflows ({} * {})",
                db_count, tb_count
            ))
        })?;

        if !slots.is_power_of_two() {
            warn!(
                db_count,
                tb_count,
                slots,
                "Shard slot count is not a power of two; falling back to modulo placement"
            );
        }

        Ok(Self {
            db_count,
            tb_count,
            default_router_key: None,
        })
    }

    /// Set the routing-key attribute used when a call does not name one
    pub fn with_default_router_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.default_router_key = if key.trim().is_empty() { None } else { Some(key) };
        self
    }

    /// Build from loaded settings
    pub fn from_settings(settings: &RouterSettings) -> Result<Self, RouterError> {
        settings.validate()?;
        let config = Self::new(settings.db_count, settings.tb_count)?;
        Ok(match &settings.router_key {
            Some(key) => config.with_default_router_key(key.clone()),
            None => config,
        })
    }

    pub fn db_count(&self) -> u32 {
        self.db_count
    }

    pub fn tb_count(&self) -> u32 {
        self.tb_count
    }

    pub fn default_router_key(&self) -> Option<&str> {
        self.default_router_key.as_deref()
    }

    /// Total number of (database, table) slots
    pub fn slot_count(&self) -> u32 {
        // Checked in `new`
        self.db_count * self.tb_count
    }

    /// Whether slot selection can use a bit mask
    pub fn has_power_of_two_slots(&self) -> bool {
        self.slot_count().is_power_of_two()
    }
}
