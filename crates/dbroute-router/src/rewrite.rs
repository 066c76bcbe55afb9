//! Table name rewriting for split tables
//!
//! A pure text transform: the logical table named after the first
//! `FROM`/`INTO`/`UPDATE` keyword is replaced by its physical name
//! `<table>_<tbKey>` everywhere it appears as a whole word, in any letter
//! case. The statement is not parsed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::{Captures, Regex, RegexBuilder};
use tracing::{debug, trace};

use crate::error::RouterError;

/// Keyword, whitespace, optionally quoted identifier
static TABLE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\b(from|into|update)\s+[`"]?(\w+)"#).unwrap());

/// Text ending in `KEY` or `FOR`: the `UPDATE` that follows is a clause
/// (`ON DUPLICATE KEY UPDATE`, `FOR UPDATE`), not a table reference
static CLAUSE_BEFORE_UPDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:key|for)\s+$").unwrap());

/// Physical name of a logical table in table partition `tb_key`
pub fn physical_table_name(table: &str, tb_key: &str) -> String {
    format!("{}_{}", table, tb_key)
}

fn is_update_clause(sql: &str, caps: &Captures<'_>) -> bool {
    let keyword = match caps.get(1) {
        Some(keyword) => keyword,
        None => return false,
    };
    keyword.as_str().eq_ignore_ascii_case("update")
        && CLAUSE_BEFORE_UPDATE.is_match(&sql[..keyword.start()])
}

/// Rewrites statements of split-table entities to their physical table
///
/// Clones share the compiled occurrence patterns.
#[derive(Debug, Clone, Default)]
pub struct TableNameRewriter {
    /// Whole-word occurrence patterns, keyed by lowercased table name
    patterns: Arc<RwLock<HashMap<String, Arc<Regex>>>>,
}

impl TableNameRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All distinct tables referenced after FROM/INTO/UPDATE, in order of appearance
    ///
    /// Names differing only in letter case are one table; the first spelling is kept.
    pub fn table_references(&self, sql: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        TABLE_REF
            .captures_iter(sql)
            .filter(|caps| !is_update_clause(sql, caps))
            .filter_map(|caps| caps.get(2))
            .map(|m| m.as_str().to_string())
            .filter(|table| seen.insert(table.to_lowercase()))
            .collect()
    }

    /// The single logical table targeted by a statement
    ///
    /// Statements naming several distinct tables are rejected rather than
    /// routing only the first one and leaving the others on logical names.
    pub fn table_name(&self, sql: &str) -> Result<String, RouterError> {
        let mut tables = self.table_references(sql);
        match tables.len() {
            0 => Err(RouterError::TableNameNotFound {
                sql: sql.to_string(),
            }),
            1 => Ok(tables.remove(0)),
            _ => Err(RouterError::AmbiguousTableReference { tables }),
        }
    }

    /// Rewrite `sql` so its table points at table partition `tb_key`
    ///
    /// Every occurrence keeps its own spelling: `ORDER` becomes `ORDER_003`,
    /// `order` becomes `order_003`.
    pub fn rewrite(&self, sql: &str, tb_key: &str) -> Result<String, RouterError> {
        let table = self.table_name(sql)?;
        let occurrences = self.occurrences(&table)?;

        let rewritten = occurrences
            .replace_all(sql, |caps: &Captures<'_>| physical_table_name(&caps[0], tb_key))
            .into_owned();

        debug!(table = %table, tb_key = %tb_key, "Rewrote split table");
        trace!(from = %sql, to = %rewritten, "Statement rewrite");

        Ok(rewritten)
    }

    /// Number of compiled occurrence patterns held
    pub fn cached_patterns(&self) -> usize {
        self.patterns.read().len()
    }

    fn occurrences(&self, table: &str) -> Result<Arc<Regex>, RouterError> {
        let key = table.to_lowercase();
        if let Some(pattern) = self.patterns.read().get(&key) {
            return Ok(Arc::clone(pattern));
        }

        let compiled = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(table)))
            .case_insensitive(true)
            .build()
            .map_err(|e| RouterError::TablePattern {
                table: table.to_string(),
                reason: e.to_string(),
            })?;
        let compiled = Arc::new(compiled);

        self.patterns.write().insert(key, Arc::clone(&compiled));
        Ok(compiled)
    }
}
