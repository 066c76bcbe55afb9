//! Shard resolution strategies
//!
//! A strategy maps a routing-key value onto a `(db_index, tb_index)` pair:
//!
//! ```text
//! routing key ("10000")
//!     │
//!     ▼
//! ┌─────────────────────────┐
//! │   Key hashing           │  (KeyHasher: JavaCompat / Blake3)
//! └───────────┬─────────────┘
//!             │  spread hash
//!             ▼
//! ┌─────────────────────────┐
//! │   Slot selection        │  (mask or modulo over dbCount * tbCount)
//! └───────────┬─────────────┘
//!             │
//!             ▼
//!     ShardIndex { db, tb }
//! ```

mod hash_slot;

pub use hash_slot::{java_string_hash, HashSlotStrategy, KeyHasher};

use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::types::ShardIndex;

/// Trait for shard resolution strategies
pub trait ShardStrategy: Send + Sync {
    /// Resolve a routing-key value to a shard
    ///
    /// Must be deterministic for a fixed config and fail with
    /// [`RouterError::InvalidKey`] for a blank key.
    fn resolve(&self, key: &str, config: &RouterConfig) -> Result<ShardIndex, RouterError>;

    /// Strategy name for logging
    fn name(&self) -> &'static str;
}
