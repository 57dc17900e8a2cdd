//! Fixtures for fresh in-memory collections.

use segdb_core::{Array, Config, Map, SegmentData};
use segdb_ledger::{InMemoryLedger, SegmentIdAllocator};
use std::sync::Arc;

/// The ledger type used by all fixtures.
pub type TestLedger = InMemoryLedger<SegmentData>;

/// A fresh array together with the ledger and allocator behind it.
pub struct ArrayFixture {
    /// The ledger every segment lives in.
    pub ledger: Arc<TestLedger>,
    /// The shared identifier allocator.
    pub ids: Arc<SegmentIdAllocator>,
    /// The array under test.
    pub array: Array<TestLedger>,
}

impl ArrayFixture {
    /// Creates a fixture with the default size policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a fixture with an explicit size policy.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let ids = Arc::new(SegmentIdAllocator::new());
        let array = Array::create_with_config(Arc::clone(&ledger), Arc::clone(&ids), config);
        Self { ledger, ids, array }
    }
}

impl Default for ArrayFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A fresh map together with the ledger and allocator behind it.
pub struct MapFixture {
    /// The ledger every segment lives in.
    pub ledger: Arc<TestLedger>,
    /// The shared identifier allocator.
    pub ids: Arc<SegmentIdAllocator>,
    /// The map under test.
    pub map: Map<TestLedger>,
}

impl MapFixture {
    /// Creates a fixture with the default size policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a fixture with an explicit size policy.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let ids = Arc::new(SegmentIdAllocator::new());
        let map = Map::create_with_config(Arc::clone(&ledger), Arc::clone(&ids), config);
        Self { ledger, ids, map }
    }
}

impl Default for MapFixture {
    fn default() -> Self {
        Self::new()
    }
}
