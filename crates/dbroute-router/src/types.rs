//! Common types for the router module
//!
//! Centralizes shard identifiers and their textual formats.

use serde::{Deserialize, Serialize};

/// Width of the zero-padded database key (`01`)
pub const DB_KEY_WIDTH: usize = 2;

/// Width of the zero-padded table key (`003`)
pub const TB_KEY_WIDTH: usize = 3;

/// Prefix joining a database key to a data source name (`db` + `01`)
pub const DATA_SOURCE_PREFIX: &str = "db";

/// Format a 1-based database index as a database key
pub fn format_db_key(db_index: u32) -> String {
    format!("{:0width$}", db_index, width = DB_KEY_WIDTH)
}

/// Format a 1-based table index as a table key
pub fn format_tb_key(tb_index: u32) -> String {
    format!("{:0width$}", tb_index, width = TB_KEY_WIDTH)
}

/// Resolved shard position of a routing key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardIndex {
    /// Database index, 1-based
    pub db_index: u32,

    /// Table index within the database, 1-based
    pub tb_index: u32,
}

impl ShardIndex {
    pub fn new(db_index: u32, tb_index: u32) -> Self {
        Self { db_index, tb_index }
    }

    /// Zero-padded database key
    pub fn db_key(&self) -> String {
        format_db_key(self.db_index)
    }

    /// Zero-padded table key
    pub fn tb_key(&self) -> String {
        format_tb_key(self.tb_index)
    }
}

impl std::fmt::Display for ShardIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}/{}", DATA_SOURCE_PREFIX, self.db_key(), self.tb_key())
    }
}
