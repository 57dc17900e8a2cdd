//! Ledger trait definitions.

use crate::error::LedgerResult;
use crate::id::SegmentId;

/// A unit of storage owned by a [`SegmentLedger`].
///
/// Segments expose three capabilities: a unique identifier, a byte-encoded
/// form, and reconstruction from bytes. The ledger itself never interprets
/// the encoded form - it exists so that a persistent ledger implementation
/// can serialise segments without knowing their structure.
pub trait Segment {
    /// Returns the unique identifier of this segment.
    fn id(&self) -> SegmentId;

    /// Produces the encoded form of this segment for storage.
    fn encoded(&self) -> Vec<u8>;

    /// Replaces this segment's state with the one encoded in `bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not a valid encoding.
    fn load(&mut self, bytes: &[u8]) -> LedgerResult<()>;
}

/// An associative store from [`SegmentId`] to segments.
///
/// # Invariants
///
/// - `put` inserts or overwrites, keyed by the segment's own identifier
/// - `get` returns a value snapshot; mutations to it are invisible to the
///   ledger until it is `put` back
/// - `remove` of an absent identifier is a no-op
///
/// There is no ordering, no iteration, and no persistence semantics at this
/// layer.
pub trait SegmentLedger<S: Segment>: Send + Sync {
    /// Returns a snapshot of the segment stored under `id`, if any.
    fn get(&self, id: SegmentId) -> Option<S>;

    /// Inserts `segment`, overwriting any segment with the same identifier.
    fn put(&self, segment: S);

    /// Removes the segment stored under `id`, if any.
    fn remove(&self, id: SegmentId);
}
