//! In-memory segment ledger.

use crate::id::SegmentId;
use crate::ledger::{Segment, SegmentLedger};
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory segment ledger.
///
/// Stores segments by value in a hash map. Suitable for:
/// - Unit and integration tests
/// - Ephemeral collections that don't need persistence
///
/// # Thread Safety
///
/// The ledger is `Send + Sync`; reads hand out clones, so callers never
/// observe a segment mid-mutation.
#[derive(Debug, Default)]
pub struct InMemoryLedger<S> {
    segments: RwLock<HashMap<SegmentId, S>>,
}

impl<S> InMemoryLedger<S> {
    /// Creates a new empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            segments: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the number of segments currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.read().len()
    }

    /// Returns `true` if the ledger holds no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.read().is_empty()
    }

    /// Returns `true` if a segment is stored under `id`.
    #[must_use]
    pub fn contains(&self, id: SegmentId) -> bool {
        self.segments.read().contains_key(&id)
    }
}

impl<S> SegmentLedger<S> for InMemoryLedger<S>
where
    S: Segment + Clone + Send + Sync,
{
    fn get(&self, id: SegmentId) -> Option<S> {
        self.segments.read().get(&id).cloned()
    }

    fn put(&self, segment: S) {
        self.segments.write().insert(segment.id(), segment);
    }

    fn remove(&self, id: SegmentId) {
        self.segments.write().remove(&id);
    }
}
