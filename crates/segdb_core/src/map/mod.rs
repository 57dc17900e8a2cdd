//! Segmented Map collection.
//!
//! A [`Map`] stores items keyed by arbitrary byte strings across a list
//! of bounded-size leaf segments. Instead of comparing keys numerically,
//! routing is by bit-prefix [`Mask`](crate::Mask) membership: each leaf's
//! mask delimits the keys it may hold, and sibling masks produced by a
//! split differ at a single deciding bit.

mod segment;

pub use segment::{MapMeta, MapSegment, MapSegmentHeader};

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::item::MapItem;
use crate::segment::SegmentData;
use segdb_ledger::{SegmentId, SegmentIdAllocator, SegmentLedger};
use std::fmt;
use std::sync::Arc;

/// A segmented, self-balancing map.
///
/// Mirrors [`Array`](crate::Array) in shape: the façade holds only the
/// meta-segment identifier and reaches everything else through the
/// ledger. Leaf headers stay in creation order, which pairs split
/// siblings at adjacent (even, odd) positions - the merge policy below
/// relies on that pairing.
pub struct Map<L> {
    meta_segment_id: SegmentId,
    ledger: Arc<L>,
    ids: Arc<SegmentIdAllocator>,
    config: Config,
}

impl<L> Map<L>
where
    L: SegmentLedger<SegmentData>,
{
    /// Creates a new empty map, registering an initial leaf and its meta
    /// segment in the ledger.
    #[must_use]
    pub fn create(ledger: Arc<L>, ids: Arc<SegmentIdAllocator>) -> Self {
        Self::create_with_config(ledger, ids, Config::default())
    }

    /// Creates a new empty map with an explicit size policy.
    #[must_use]
    pub fn create_with_config(
        ledger: Arc<L>,
        ids: Arc<SegmentIdAllocator>,
        config: Config,
    ) -> Self {
        let leaf = MapSegment::new(ids.next());
        let meta = MapMeta::new(ids.next(), leaf.header());
        let meta_segment_id = meta.id();
        ledger.put(SegmentData::MapLeaf(leaf));
        ledger.put(SegmentData::MapMeta(meta));
        Self {
            meta_segment_id,
            ledger,
            ids,
            config,
        }
    }

    /// Rehydrates a map from a known meta-segment identifier.
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

    /// Rehydrates a map with an explicit size policy.
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
        let map = Self {
            meta_segment_id,
            ledger,
            ids,
            config,
        };
        map.meta()?;
        Ok(map)
    }

    /// Returns the identifier of this map's meta segment.
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

    /// Inserts `item`, replacing any item under the same key.
    ///
    /// Splits the owning leaf when it grows past the upper threshold;
    /// the new sibling's header is placed immediately after the old one,
    /// preserving the creation order of leaves.
    ///
    /// # Errors
    ///
    /// Fails when a routed segment does not resolve to a map leaf.
    pub fn insert(&self, item: MapItem) -> CoreResult<()> {
        let mut meta = self.meta()?;
        let seg_index = meta.route(item.key());
        let mut leaf = self.leaf(meta.headers[seg_index].seg_id)?;

        let old_total = leaf.total_size();
        leaf.add(item, self.config.max_item_size);
        let new_total = leaf.total_size();
        meta.size = meta.size - old_total + new_total;

        // A refused split (too few keys, or an unsplittable mask)
        // leaves the leaf over-filled.
        let split_leaf = if new_total > self.config.max_threshold {
            leaf.split(self.ids.next())
        } else {
            None
        };
        meta.headers[seg_index] = leaf.header();
        if let Some(new_leaf) = split_leaf {
            meta.headers.insert(seg_index + 1, new_leaf.header());
            self.ledger.put(SegmentData::MapLeaf(new_leaf));
        }

        self.ledger.put(SegmentData::MapLeaf(leaf));
        self.ledger.put(SegmentData::MapMeta(meta));
        Ok(())
    }

    /// Looks up the item stored under `key`.
    ///
    /// # Errors
    ///
    /// Fails when the routed segment does not resolve to a map leaf.
    pub fn get(&self, key: &[u8]) -> CoreResult<Option<MapItem>> {
        let meta = self.meta()?;
        let leaf = self.leaf(meta.headers[meta.route(key)].seg_id)?;
        Ok(leaf.get(key).cloned())
    }

    /// Removes the item stored under `key`; no-op when absent.
    ///
    /// When the owning leaf shrinks below the lower threshold, a merge
    /// with its split sibling is attempted: leaves at even header
    /// positions pair with the header after them, odd positions with the
    /// one before. A merge is abandoned when the partner is missing, is
    /// not a sibling, or the combined size would exceed the upper
    /// threshold; the shrunken leaf is still written back.
    ///
    /// # Errors
    ///
    /// Fails when a routed segment does not resolve to a map leaf.
    pub fn remove(&self, key: &[u8]) -> CoreResult<()> {
        let mut meta = self.meta()?;
        let seg_index = meta.route(key);
        let mut leaf = self.leaf(meta.headers[seg_index].seg_id)?;

        let old_total = leaf.total_size();
        leaf.remove(key);
        let new_total = leaf.total_size();
        meta.size = meta.size - old_total + new_total;
        meta.headers[seg_index] = leaf.header();

        if new_total < self.config.min_threshold && meta.headers.len() > 1 {
            if seg_index % 2 == 0 {
                // Even position: the split sibling sits right after.
                if seg_index + 1 < meta.headers.len() {
                    let neighbour = self.leaf(meta.headers[seg_index + 1].seg_id)?;
                    if leaf.total_size() + neighbour.total_size() <= self.config.max_threshold {
                        let neighbour_id = neighbour.id();
                        if leaf.merge(neighbour).is_ok() {
                            self.ledger.remove(neighbour_id);
                            meta.headers[seg_index] = leaf.header();
                            meta.headers.remove(seg_index + 1);
                        }
                    }
                }
                self.ledger.put(SegmentData::MapLeaf(leaf));
            } else {
                // Odd position: fold into the sibling before.
                let mut neighbour = self.leaf(meta.headers[seg_index - 1].seg_id)?;
                if leaf.total_size() + neighbour.total_size() <= self.config.max_threshold {
                    let leaf_id = leaf.id();
                    match neighbour.merge(leaf) {
                        Ok(()) => {
                            self.ledger.remove(leaf_id);
                            meta.headers[seg_index - 1] = neighbour.header();
                            meta.headers.remove(seg_index);
                            self.ledger.put(SegmentData::MapLeaf(neighbour));
                        }
                        Err(rejected) => {
                            self.ledger.put(SegmentData::MapLeaf(rejected));
                        }
                    }
                } else {
                    self.ledger.put(SegmentData::MapLeaf(leaf));
                }
            }
        } else {
            self.ledger.put(SegmentData::MapLeaf(leaf));
        }

        self.ledger.put(SegmentData::MapMeta(meta));
        Ok(())
    }

    fn meta(&self) -> CoreResult<MapMeta> {
        self.ledger
            .get(self.meta_segment_id)
            .ok_or(CoreError::SegmentNotFound {
                id: self.meta_segment_id,
            })?
            .into_map_meta()
    }

    fn leaf(&self, id: SegmentId) -> CoreResult<MapSegment> {
        self.ledger
            .get(id)
            .ok_or(CoreError::SegmentNotFound { id })?
            .into_map_leaf()
    }
}

impl<L> fmt::Debug for Map<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("meta_segment_id", &self.meta_segment_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segdb_ledger::InMemoryLedger;

    fn new_map() -> Map<InMemoryLedger<SegmentData>> {
        Map::create(
            Arc::new(InMemoryLedger::new()),
            Arc::new(SegmentIdAllocator::new()),
        )
    }

    /// Keys whose high bit splits cleanly at the accept-all boundary.
    fn boundary_item(key: u8) -> MapItem {
        MapItem::new(vec![key], "vvvvv")
    }

    #[test]
    fn create_registers_leaf_and_meta() {
        let ledger = Arc::new(InMemoryLedger::new());
        let map = Map::create(Arc::clone(&ledger), Arc::new(SegmentIdAllocator::new()));

        assert_eq!(ledger.len(), 2);
        assert_eq!(map.segment_count().unwrap(), 1);
        assert_eq!(map.size().unwrap(), 0);
    }

    #[test]
    fn insert_and_get() {
        let map = new_map();
        map.insert(MapItem::new("A", "AAAA")).unwrap();

        let found = map.get(b"A").unwrap().unwrap();
        assert_eq!(found.encoded(), b"AAAA");
        assert!(map.get(b"H").unwrap().is_none());
    }

    #[test]
    fn insert_replaces_existing_key() {
        let map = new_map();
        map.insert(MapItem::new("A", "AAAA")).unwrap();
        map.insert(MapItem::new("A", "AAAAA")).unwrap();

        assert_eq!(map.get(b"A").unwrap().unwrap().encoded(), b"AAAAA");
        assert_eq!(map.size().unwrap(), 6);
    }

    #[test]
    fn remove_then_get_misses() {
        let map = new_map();
        map.insert(MapItem::new("A", "AAAA")).unwrap();
        map.remove(b"A").unwrap();

        assert!(map.get(b"A").unwrap().is_none());
        assert_eq!(map.size().unwrap(), 0);
    }

    #[test]
    fn overflow_splits_leaf_with_disjoint_masks() {
        let map = new_map();
        for key in [0x10u8, 0x20, 0x90, 0xA0] {
            map.insert(boundary_item(key)).unwrap();
        }

        assert_eq!(map.segment_count().unwrap(), 2);
        assert_eq!(map.size().unwrap(), 24);

        let meta = map.meta().unwrap();
        let (left, right) = (meta.headers()[0].mask, meta.headers()[1].mask);
        for key in 0..=255u8 {
            assert!(
                !(left.is_member(&[key]) && right.is_member(&[key])),
                "key {key:#04x} accepted by both siblings"
            );
            assert!(
                left.is_member(&[key]) || right.is_member(&[key]),
                "key {key:#04x} accepted by neither sibling"
            );
        }

        // Every item remains reachable through mask routing.
        for key in [0x10u8, 0x20, 0x90, 0xA0] {
            assert!(map.get(&[key]).unwrap().is_some(), "lost key {key:#04x}");
        }
    }

    #[test]
    fn underflow_merges_split_siblings() {
        let map = new_map();
        for key in [0x10u8, 0x20, 0x90, 0xA0] {
            map.insert(boundary_item(key)).unwrap();
        }
        assert_eq!(map.segment_count().unwrap(), 2);

        map.remove(&[0x20]).unwrap();

        assert_eq!(map.segment_count().unwrap(), 1);
        assert_eq!(map.size().unwrap(), 18);
        for key in [0x10u8, 0x90, 0xA0] {
            assert!(map.get(&[key]).unwrap().is_some());
        }
        // The merged leaf accepts the whole range again.
        let meta = map.meta().unwrap();
        assert_eq!(meta.headers()[0].mask.prefix_len(), 0);
    }

    #[test]
    fn merge_abandoned_when_parity_partner_missing() {
        let map = new_map();
        for key in [0x10u8, 0x20, 0x90, 0xA0] {
            map.insert(boundary_item(key)).unwrap();
        }
        // Grow the left sibling until it splits again, leaving the
        // right sibling unpaired at even position 2.
        map.insert(boundary_item(0x30)).unwrap();
        map.insert(boundary_item(0x40)).unwrap();
        assert_eq!(map.segment_count().unwrap(), 3);

        map.remove(&[0x90]).unwrap();

        // Partner index 3 does not exist: the under-filled leaf stays.
        assert_eq!(map.segment_count().unwrap(), 3);
        assert!(map.get(&[0xA0]).unwrap().is_some());
    }

    #[test]
    fn oversized_item_is_rejected_silently() {
        let map = new_map();
        map.insert(MapItem::new("key", "far too large")).unwrap();

        assert_eq!(map.size().unwrap(), 0);
        assert!(map.get(b"key").unwrap().is_none());
    }

    #[test]
    fn fetch_requires_meta_variant() {
        let ledger = Arc::new(InMemoryLedger::new());
        let ids = Arc::new(SegmentIdAllocator::new());
        let map = Map::create(Arc::clone(&ledger), Arc::clone(&ids));
        map.insert(MapItem::new("A", "1")).unwrap();

        let leaf_id = map.meta().unwrap().headers()[0].seg_id;
        let result = Map::fetch(leaf_id, Arc::clone(&ledger), Arc::clone(&ids));
        assert!(matches!(result, Err(CoreError::VariantMismatch { .. })));

        let missing = Map::fetch(SegmentId::new(999), ledger, ids);
        assert!(matches!(missing, Err(CoreError::SegmentNotFound { .. })));
    }
}
