//! Hash Slot Strategy for Shard Resolution
//!
//! Hashes the routing key, spreads the high bits into the low bits and picks
//! one of `dbCount * tbCount` slots. The slot is then split into a database
//! index and a table index within that database.

use blake3::Hasher;
use tracing::trace;

use super::ShardStrategy;
use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::types::ShardIndex;

/// 32-bit polynomial string hash over UTF-16 code units
///
/// Matches `java.lang.String#hashCode`, so placements agree with
/// deployments that were sharded by a JVM router.
pub fn java_string_hash(key: &str) -> i32 {
    key.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Key hashing function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyHasher {
    /// `String#hashCode` compatible hash
    #[default]
    JavaCompat,
    /// First 4 bytes of the blake3 digest
    Blake3,
}

impl KeyHasher {
    /// Raw 32-bit hash of a key
    pub fn hash(&self, key: &str) -> u32 {
        match self {
            KeyHasher::JavaCompat => java_string_hash(key) as u32,
            KeyHasher::Blake3 => {
                let mut hasher = Hasher::new();
                hasher.update(key.as_bytes());
                let hash = hasher.finalize();
                let bytes = hash.as_bytes();
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
            }
        }
    }
}

/// Hash-based slot strategy
#[derive(Debug, Clone, Default)]
pub struct HashSlotStrategy {
    hasher: KeyHasher,
}

impl HashSlotStrategy {
    /// Create with the Java-compatible hasher
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a custom hasher
    pub fn with_hasher(hasher: KeyHasher) -> Self {
        Self { hasher }
    }

    pub fn hasher(&self) -> KeyHasher {
        self.hasher
    }

    /// XOR the high half into the low half
    fn spread(hash: u32) -> u32 {
        hash ^ (hash >> 16)
    }

    /// Pick a slot in `0..slots`
    ///
    /// A mask is only equivalent to modulo when `slots` is a power of two;
    /// other sizes use true modulo so the distribution stays even.
    fn slot(spread: u32, slots: u32) -> u32 {
        if slots.is_power_of_two() {
            spread & (slots - 1)
        } else {
            spread % slots
        }
    }
}

impl ShardStrategy for HashSlotStrategy {
    fn resolve(&self, key: &str, config: &RouterConfig) -> Result<ShardIndex, RouterError> {
        if key.trim().is_empty() {
            return Err(RouterError::InvalidKey);
        }

        let tb_count = config.tb_count();
        let hash = self.hasher.hash(key);
        let spread = Self::spread(hash);
        let slot = Self::slot(spread, config.slot_count());

        let db_index = slot / tb_count + 1;
        let tb_index = slot - (db_index - 1) * tb_count + 1;

        trace!(key = %key, hash, spread, slot, db_index, tb_index, "Hash slot lookup");

        if !(1..=config.db_count()).contains(&db_index) || !(1..=tb_count).contains(&tb_index) {
            return Err(RouterError::ShardOutOfRange {
                db_index,
                tb_index: Some(tb_index),
            });
        }

        Ok(ShardIndex::new(db_index, tb_index))
    }

    fn name(&self) -> &'static str {
        match self.hasher {
            KeyHasher::JavaCompat => "HashSlot",
            KeyHasher::Blake3 => "HashSlot(blake3)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(db: u32, tb: u32) -> RouterConfig {
        RouterConfig::new(db, tb).unwrap()
    }

    #[test]
    fn test_java_string_hash_vectors() {
        assert_eq!(java_string_hash(""), 0);
        assert_eq!(java_string_hash("a"), 97);
        assert_eq!(java_string_hash("hello"), 99_162_322);
        assert_eq!(java_string_hash("10000"), 46_730_161);
        assert_eq!(java_string_hash("user-42"), -147_182_656);
        assert_eq!(java_string_hash("polygenelubricants"), i32::MIN);
        // Non-ASCII keys hash by UTF-16 code unit, not by byte
        assert_eq!(java_string_hash("中文"), 646_394);
        // Well-known collision
        assert_eq!(java_string_hash("Aa"), java_string_hash("BB"));
    }

    #[test]
    fn test_known_placements() {
        let strategy = HashSlotStrategy::new();

        let cases = [
            ("10000", (2, 4), (1, 1)),
            ("hello", (2, 4), (1, 4)),
            ("user-42", (2, 4), (1, 3)),
            ("10000", (4, 8), (4, 1)),
            ("中文", (4, 8), (3, 4)),
            ("user-42", (4, 8), (4, 3)),
        ];

        for (key, (db, tb), (want_db, want_tb)) in cases {
            let index = strategy.resolve(key, &config(db, tb)).unwrap();
            assert_eq!(
                (index.db_index, index.tb_index),
                (want_db, want_tb),
                "key={} layout={}x{}",
                key,
                db,
                tb
            );
        }
    }

    #[test]
    fn test_example_key_formats() {
        let strategy = HashSlotStrategy::new();
        let index = strategy.resolve("10000", &config(2, 4)).unwrap();

        assert!((1..=2).contains(&index.db_index));
        assert!((1..=4).contains(&index.tb_index));
        assert_eq!(index.db_key().len(), 2);
        assert_eq!(index.tb_key().len(), 3);
        assert_eq!(index.db_key(), "01");
        assert_eq!(index.tb_key(), "001");
    }

    #[test]
    fn test_modulo_fallback() {
        let strategy = HashSlotStrategy::new();
        let config = config(3, 4);

        // spread("10000") % 12 == 8 -> db 3, table 1
        let index = strategy.resolve("10000", &config).unwrap();
        assert_eq!(index, ShardIndex::new(3, 1));

        // i32::MIN spreads to 0x80008000 which is 4 mod 12
        let index = strategy.resolve("polygenelubricants", &config).unwrap();
        assert_eq!(index, ShardIndex::new(2, 1));
    }

    #[test]
    fn test_range_for_many_layouts() {
        for hasher in [KeyHasher::JavaCompat, KeyHasher::Blake3] {
            let strategy = HashSlotStrategy::with_hasher(hasher);
            for (db, tb) in [(1, 1), (1, 8), (2, 4), (4, 4), (8, 32), (3, 5), (7, 1)] {
                let config = config(db, tb);
                for i in 0..500 {
                    let index = strategy.resolve(&format!("key-{}", i), &config).unwrap();
                    assert!((1..=db).contains(&index.db_index), "{:?} in {}x{}", index, db, tb);
                    assert!((1..=tb).contains(&index.tb_index), "{:?} in {}x{}", index, db, tb);
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let strategy = HashSlotStrategy::with_hasher(KeyHasher::Blake3);
        let config = config(4, 8);

        let first = strategy.resolve("account:alice", &config).unwrap();
        let second = strategy.resolve("account:alice", &config).unwrap();
        assert_eq!(first, second, "Same key should route to same shard");
    }

    #[test]
    fn test_distribution() {
        for hasher in [KeyHasher::JavaCompat, KeyHasher::Blake3] {
            let strategy = HashSlotStrategy::with_hasher(hasher);
            let config = config(2, 4);
            let mut distribution: HashMap<ShardIndex, u32> = HashMap::new();

            for i in 0..8000 {
                let key = format!("order-{}", 100_000 + i * 7);
                let index = strategy.resolve(&key, &config).unwrap();
                *distribution.entry(index).or_insert(0) += 1;
            }

            // All 8 slots receive traffic, each roughly 1/8
            assert_eq!(distribution.len(), 8, "{:?}", hasher);
            for count in distribution.values() {
                assert!(
                    *count > 500 && *count < 1500,
                    "count={} is outside expected range for {:?}",
                    count,
                    hasher
                );
            }
        }
    }

    #[test]
    fn test_blank_key_rejected() {
        let strategy = HashSlotStrategy::new();
        assert_eq!(strategy.resolve("", &config(2, 4)), Err(RouterError::InvalidKey));
        assert_eq!(strategy.resolve("  \t", &config(2, 4)), Err(RouterError::InvalidKey));
    }

    #[test]
    fn test_single_slot() {
        let strategy = HashSlotStrategy::new();
        let index = strategy.resolve("anything", &config(1, 1)).unwrap();
        assert_eq!(index, ShardIndex::new(1, 1));
    }
}
