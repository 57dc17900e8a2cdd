//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random items and operation
//! sequences that stay within the default size policy, so every
//! generated mutation is actually applied.

use proptest::prelude::*;

/// Strategy for array indices within a small, collision-friendly range.
pub fn array_index_strategy() -> impl Strategy<Value = u32> {
    0u32..32
}

/// Strategy for payloads small enough to pass the default item cap.
pub fn small_value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=2)
}

/// Strategy for map keys; short keys keep mask splits well-exercised.
pub fn map_key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..4)
}

/// A single array mutation or observation.
#[derive(Debug, Clone)]
pub enum ArrayOp {
    /// Insert (or replace) an item.
    Insert {
        /// Target index.
        index: u32,
        /// Payload bytes.
        value: Vec<u8>,
    },
    /// Remove the item at an index.
    Remove {
        /// Target index.
        index: u32,
    },
    /// Append a single-byte item past the last index.
    Append {
        /// Payload byte.
        value: u8,
    },
}

/// Strategy for generating array operations.
pub fn array_op_strategy() -> impl Strategy<Value = ArrayOp> {
    prop_oneof![
        3 => (array_index_strategy(), small_value_strategy())
            .prop_map(|(index, value)| ArrayOp::Insert { index, value }),
        2 => array_index_strategy().prop_map(|index| ArrayOp::Remove { index }),
        2 => any::<u8>().prop_map(|value| ArrayOp::Append { value }),
    ]
}

/// Strategy for generating a sequence of array operations.
pub fn array_op_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<ArrayOp>> {
    prop::collection::vec(array_op_strategy(), min_ops..max_ops)
}

/// A single map mutation or observation.
#[derive(Debug, Clone)]
pub enum MapOp {
    /// Insert (or replace) an item.
    Insert {
        /// Target key.
        key: Vec<u8>,
        /// Payload bytes.
        value: Vec<u8>,
    },
    /// Remove the item under a key.
    Remove {
        /// Target key.
        key: Vec<u8>,
    },
    /// Look up a key.
    Get {
        /// Target key.
        key: Vec<u8>,
    },
}

/// Strategy for generating map operations.
pub fn map_op_strategy() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        3 => (map_key_strategy(), small_value_strategy())
            .prop_map(|(key, value)| MapOp::Insert { key, value }),
        1 => map_key_strategy().prop_map(|key| MapOp::Remove { key }),
        2 => map_key_strategy().prop_map(|key| MapOp::Get { key }),
    ]
}

/// Strategy for generating a sequence of map operations.
pub fn map_op_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<MapOp>> {
    prop::collection::vec(map_op_strategy(), min_ops..max_ops)
}

/// Map operations restricted to a three-key pool, so the collection
/// never crosses the split threshold and stays model-comparable.
pub fn small_map_op_strategy() -> impl Strategy<Value = MapOp> {
    let key = prop::sample::select(vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    prop_oneof![
        3 => (key.clone(), small_value_strategy())
            .prop_map(|(key, value)| MapOp::Insert { key, value }),
        1 => key.clone().prop_map(|key| MapOp::Remove { key }),
        2 => key.prop_map(|key| MapOp::Get { key }),
    ]
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
