//! Segmented Array collection.
//!
//! An [`Array`] stores items keyed by dense `u32` indices across a list of
//! bounded-size leaf segments. The meta segment holds one routing header
//! per leaf; every mutation re-puts the touched segments, so the façade
//! itself carries nothing but the meta identifier.

mod segment;

pub use segment::{ArrayMeta, ArraySegment, ArraySegmentHeader};

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::item::ArrayItem;
use crate::segment::SegmentData;
use segdb_ledger::{SegmentId, SegmentIdAllocator, SegmentLedger};
use std::fmt;
use std::sync::Arc;

/// A segmented, self-balancing array.
///
/// Each top-level operation is a logical transaction against the ledger:
/// the façade reads the meta segment, routes to one leaf, mutates it,
/// applies the split or merge policy, and writes all modified segments
/// back. Callers must not hold segment snapshots across façade calls -
/// a split or merge may replace them.
pub struct Array<L> {
    meta_segment_id: SegmentId,
    ledger: Arc<L>,
    ids: Arc<SegmentIdAllocator>,
    config: Config,
}

impl<L> Array<L>
where
    L: SegmentLedger<SegmentData>,
{
    /// Creates a new empty array, registering an initial leaf and its
    /// meta segment in the ledger.
    #[must_use]
    pub fn create(ledger: Arc<L>, ids: Arc<SegmentIdAllocator>) -> Self {
        Self::create_with_config(ledger, ids, Config::default())
    }

    /// Creates a new empty array with an explicit size policy.
    #[must_use]
    pub fn create_with_config(
        ledger: Arc<L>,
        ids: Arc<SegmentIdAllocator>,
        config: Config,
    ) -> Self {
        let leaf = ArraySegment::new(ids.next());
        let meta = ArrayMeta::new(ids.next(), leaf.header());
        let meta_segment_id = meta.id();
        ledger.put(SegmentData::ArrayLeaf(leaf));
        ledger.put(SegmentData::ArrayMeta(meta));
        Self {
            meta_segment_id,
            ledger,
            ids,
            config,
        }
    }

    /// Rehydrates an array from a known meta-segment identifier.
    ///
    /// # Errors
    ///
    /// Fails when the identifier does not resolve, or resolves to a
    /// different segment variant.
    pub fn fetch(
        meta_segment_id: SegmentId,
        ledger: Arc<L>,
        ids: Arc<SegmentIdAllocator>,
    ) -> CoreResult<Self> {
        Self::fetch_with_config(meta_segment_id, ledger, ids, Config::default())
    }

    /// Rehydrates an array with an explicit size policy.
    ///
    /// # Errors
    ///
    /// Fails when the identifier does not resolve, or resolves to a
    /// different segment variant.
    pub fn fetch_with_config(
        meta_segment_id: SegmentId,
        ledger: Arc<L>,
        ids: Arc<SegmentIdAllocator>,
        config: Config,
    ) -> CoreResult<Self> {
        let array = Self {
            meta_segment_id,
            ledger,
            ids,
            config,
        };
        array.meta()?;
        Ok(array)
    }

    /// Returns the identifier of this array's meta segment.
    #[must_use]
    pub fn meta_segment_id(&self) -> SegmentId {
        self.meta_segment_id
    }

    /// Returns the total size of all stored items.
    ///
    /// # Errors
    ///
    /// Fails when the meta segment no longer resolves.
    pub fn size(&self) -> CoreResult<u32> {
        Ok(self.meta()?.size())
    }

    /// Returns the number of leaf segments.
    ///
    /// # Errors
    ///
    /// Fails when the meta segment no longer resolves.
    pub fn segment_count(&self) -> CoreResult<usize> {
        Ok(self.meta()?.headers().len())
    }

    /// Inserts `item`, replacing any item at the same index.
    ///
    /// Splits the owning leaf when it grows past the upper threshold.
    ///
    /// # Errors
    ///
    /// Fails when a routed segment does not resolve to an array leaf.
    pub fn insert(&self, item: ArrayItem) -> CoreResult<()> {
        let meta = self.meta()?;
        let seg_index = meta.route(item.index());
        let leaf = self.leaf(meta.headers[seg_index].seg_id)?;
        self.add_to_leaf(meta, seg_index, leaf, item);
        Ok(())
    }

    /// Appends a single-byte item one past the last stored index.
    ///
    /// # Errors
    ///
    /// Fails when the last leaf does not resolve to an array leaf.
    pub fn append_byte(&self, value: u8) -> CoreResult<()> {
        let meta = self.meta()?;
        let seg_index = meta.headers.len() - 1;
        let leaf = self.leaf(meta.headers[seg_index].seg_id)?;
        let item = ArrayItem::byte(leaf.last_index() + 1, value);
        self.add_to_leaf(meta, seg_index, leaf, item);
        Ok(())
    }

    /// Looks up the item stored at `index`.
    ///
    /// # Errors
    ///
    /// Fails when the routed segment does not resolve to an array leaf.
    pub fn get(&self, index: u32) -> CoreResult<Option<ArrayItem>> {
        let meta = self.meta()?;
        let leaf = self.leaf(meta.headers[meta.route(index)].seg_id)?;
        Ok(leaf.get(index).cloned())
    }

    /// Removes the item stored at `index`; no-op when absent.
    ///
    /// Merges the owning leaf with a neighbour when it shrinks below the
    /// lower threshold: the first leaf absorbs its right neighbour, the
    /// last folds into its left, and an interior leaf pairs with the
    /// smaller-sized neighbour (ties go right). A merge whose combined
    /// size would exceed the upper threshold is abandoned.
    ///
    /// # Errors
    ///
    /// Fails when a routed segment does not resolve to an array leaf.
    pub fn remove(&self, index: u32) -> CoreResult<()> {
        let mut meta = self.meta()?;
        let seg_index = meta.route(index);
        let mut leaf = self.leaf(meta.headers[seg_index].seg_id)?;

        let old_total = leaf.total_size();
        leaf.remove(index);
        let new_total = leaf.total_size();
        meta.size = meta.size - old_total + new_total;
        meta.headers[seg_index] = leaf.header();

        if new_total < self.config.min_threshold && meta.headers.len() > 1 {
            let last = meta.headers.len() - 1;
            let merge_right = if seg_index == 0 {
                true
            } else if seg_index == last {
                false
            } else {
                meta.headers[seg_index - 1].size >= meta.headers[seg_index + 1].size
            };

            if merge_right {
                let neighbour = self.leaf(meta.headers[seg_index + 1].seg_id)?;
                if leaf.total_size() + neighbour.total_size() <= self.config.max_threshold {
                    self.ledger.remove(neighbour.id());
                    leaf.merge(neighbour);
                    meta.headers[seg_index] = leaf.header();
                    meta.headers.remove(seg_index + 1);
                }
                self.ledger.put(SegmentData::ArrayLeaf(leaf));
            } else {
                let mut neighbour = self.leaf(meta.headers[seg_index - 1].seg_id)?;
                if leaf.total_size() + neighbour.total_size() <= self.config.max_threshold {
                    self.ledger.remove(leaf.id());
                    neighbour.merge(leaf);
                    meta.headers[seg_index - 1] = neighbour.header();
                    meta.headers.remove(seg_index);
                    self.ledger.put(SegmentData::ArrayLeaf(neighbour));
                } else {
                    self.ledger.put(SegmentData::ArrayLeaf(leaf));
                }
            }
        } else {
            self.ledger.put(SegmentData::ArrayLeaf(leaf));
        }

        self.ledger.put(SegmentData::ArrayMeta(meta));
        Ok(())
    }

    /// Checks the stored state against an expected byte stream.
    ///
    /// Walks every leaf in header order and reports `false` on any size
    /// mismatch, non-monotone index sequence, stale routing header, or a
    /// payload stream differing from `expected`. Never mutates.
    ///
    /// # Errors
    ///
    /// Fails when a routed segment does not resolve to an array leaf.
    pub fn validate(&self, expected: &[u8]) -> CoreResult<bool> {
        let meta = self.meta()?;
        let mut stream = Vec::new();
        let mut previous_index = 0u32;
        let mut leaves_total = 0u32;

        for header in meta.headers() {
            let leaf = self.leaf(header.seg_id)?;
            // stale routing header
            if header.start_index != leaf.start_index() || header.size != leaf.total_size() {
                return Ok(false);
            }

            let mut segment_total = 0u32;
            for item in leaf.items() {
                // non-monotone index sequence
                if item.index() < previous_index {
                    return Ok(false);
                }
                stream.extend_from_slice(item.encoded());
                segment_total += item.size();
                previous_index = item.index();
            }

            // claimed segment size out of sync with contents
            if segment_total != leaf.total_size() {
                return Ok(false);
            }
            leaves_total += segment_total;
        }

        if leaves_total != meta.size() {
            return Ok(false);
        }
        Ok(stream == expected)
    }

    /// Adds `item` to the routed leaf, splits if the leaf overflows, and
    /// writes everything back. The meta size delta is taken before the
    /// split, since a split only moves bytes between leaves.
    fn add_to_leaf(
        &self,
        mut meta: ArrayMeta,
        seg_index: usize,
        mut leaf: ArraySegment,
        item: ArrayItem,
    ) {
        let old_total = leaf.total_size();
        leaf.add(item, self.config.max_item_size);
        let new_total = leaf.total_size();
        meta.size = meta.size - old_total + new_total;

        // A refused split (fewer than two items) leaves the leaf
        // over-filled until a later mutation can divide it.
        let split_leaf = if new_total > self.config.max_threshold {
            leaf.split(self.ids.next())
        } else {
            None
        };
        meta.headers[seg_index] = leaf.header();
        if let Some(new_leaf) = split_leaf {
            meta.headers.insert(seg_index + 1, new_leaf.header());
            self.ledger.put(SegmentData::ArrayLeaf(new_leaf));
        }

        self.ledger.put(SegmentData::ArrayLeaf(leaf));
        self.ledger.put(SegmentData::ArrayMeta(meta));
    }

    fn meta(&self) -> CoreResult<ArrayMeta> {
        self.ledger
            .get(self.meta_segment_id)
            .ok_or(CoreError::SegmentNotFound {
                id: self.meta_segment_id,
            })?
            .into_array_meta()
    }

    fn leaf(&self, id: SegmentId) -> CoreResult<ArraySegment> {
        self.ledger
            .get(id)
            .ok_or(CoreError::SegmentNotFound { id })?
            .into_array_leaf()
    }
}

impl<L> fmt::Debug for Array<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("meta_segment_id", &self.meta_segment_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
