//! Map leaf and meta segments.

use crate::error::{CoreError, CoreResult};
use crate::item::MapItem;
use crate::mask::{common_prefix_bits, Mask};
use crate::segment::codec::ByteReader;
use segdb_ledger::SegmentId;
use std::collections::HashMap;

/// A data leaf of a [`Map`](crate::Map): items keyed by byte strings.
///
/// Every leaf carries a [`Mask`] that delimits which keys may enter it.
///
/// # Invariants
///
/// - `keys` is strictly ascending and is exactly the key set of `lookup`
/// - `total_size` equals the sum of the stored items' sizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapSegment {
    id: SegmentId,
    total_size: u32,
    mask: Mask,
    keys: Vec<Vec<u8>>,
    lookup: HashMap<Vec<u8>, MapItem>,
}

impl MapSegment {
    /// Creates a new empty leaf accepting every key.
    #[must_use]
    pub fn new(id: SegmentId) -> Self {
        Self::with_mask(id, Mask::accept_all())
    }

    pub(crate) fn with_mask(id: SegmentId, mask: Mask) -> Self {
        Self {
            id,
            total_size: 0,
            mask,
            keys: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Returns the segment identifier.
    #[must_use]
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Returns the sum of the stored items' sizes.
    #[must_use]
    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    /// Returns the number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the leaf holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the mask delimiting this leaf's keys.
    #[must_use]
    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    /// Returns the stored keys in ascending order.
    #[must_use]
    pub fn keys(&self) -> &[Vec<u8>] {
        &self.keys
    }

    /// Returns the smallest stored key.
    #[must_use]
    pub fn first_key(&self) -> Option<&[u8]> {
        self.keys.first().map(Vec::as_slice)
    }

    /// Returns the largest stored key.
    #[must_use]
    pub fn last_key(&self) -> Option<&[u8]> {
        self.keys.last().map(Vec::as_slice)
    }

    /// Looks up the item stored under `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&MapItem> {
        self.lookup.get(key)
    }

    /// Inserts `item` in key order, replacing any item under the same
    /// key.
    ///
    /// Items larger than `max_item_size` and items whose key falls
    /// outside this leaf's mask are silently rejected; the latter never
    /// happens when callers route through the meta segment.
    pub fn add(&mut self, item: MapItem, max_item_size: u32) {
        if item.size() > max_item_size {
            return;
        }
        if !self.mask.is_member(item.key()) {
            return;
        }

        let size = item.size();
        let key = item.key().to_vec();
        match self.position(&key) {
            Ok(_) => {
                if let Some(old) = self.lookup.insert(key, item) {
                    self.total_size = self.total_size - old.size() + size;
                }
            }
            Err(pos) => {
                self.keys.insert(pos, key.clone());
                self.total_size += size;
                self.lookup.insert(key, item);
            }
        }
    }

    /// Removes the item stored under `key`; no-op when absent.
    pub fn remove(&mut self, key: &[u8]) {
        if let Ok(pos) = self.position(key) {
            self.keys.remove(pos);
            if let Some(old) = self.lookup.remove(key) {
                self.total_size -= old.size();
            }
        }
    }

    /// Splits off the upper half of this leaf into a new segment.
    ///
    /// Child masks are derived from the last key staying here and the
    /// first key moving out, before any item moves - so a refusal (too
    /// few keys, or the distinguishing bit does not fit the mask buffer)
    /// leaves the leaf untouched.
    #[must_use]
    pub fn split(&mut self, new_id: SegmentId) -> Option<MapSegment> {
        if self.keys.len() < 2 {
            return None;
        }
        let break_point = self.keys.len().div_ceil(2);
        let (left_mask, right_mask) = self
            .mask
            .split(&self.keys[break_point - 1], &self.keys[break_point])?;

        let upper = self.keys.split_off(break_point);
        let mut new_segment = Self::with_mask(new_id, right_mask);
        for key in upper {
            if let Some(item) = self.lookup.remove(&key) {
                self.total_size -= item.size();
                new_segment.total_size += item.size();
                new_segment.lookup.insert(key.clone(), item);
                new_segment.keys.push(key);
            }
        }
        self.mask = left_mask;
        Some(new_segment)
    }

    /// Absorbs all of `other`'s items into this leaf.
    ///
    /// Only siblings - segments whose masks share the same prefix length
    /// - may merge; `other` is handed back unchanged otherwise. On
    /// success the parent-equivalent mask is recovered from the merged
    /// key range. The caller must ensure `other`'s keys sort after this
    /// leaf's.
    pub fn merge(&mut self, other: MapSegment) -> Result<(), MapSegment> {
        if self.mask.prefix_len() != other.mask.prefix_len() {
            return Err(other);
        }

        self.keys.extend(other.keys);
        for (key, item) in other.lookup {
            self.lookup.insert(key, item);
        }
        self.total_size += other.total_size;

        let prefix_len = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => common_prefix_bits(first, last).saturating_sub(1),
            _ => 0,
        };
        self.mask = self.mask.truncated(prefix_len);
        Ok(())
    }

    /// Produces the routing header for this leaf.
    #[must_use]
    pub fn header(&self) -> MapSegmentHeader {
        MapSegmentHeader {
            mask: self.mask,
            size: self.total_size,
            seg_id: self.id,
        }
    }

    fn position(&self, key: &[u8]) -> Result<usize, usize> {
        self.keys.binary_search_by(|stored| stored.as_slice().cmp(key))
    }

    #[cfg(test)]
    pub(crate) fn set_mask(&mut self, mask: Mask) {
        self.mask = mask;
    }

    pub(crate) fn encode_body(&self, buf: &mut Vec<u8>) {
        self.mask.encode_into(buf);
        buf.extend_from_slice(&(self.keys.len() as u32).to_le_bytes());
        for key in &self.keys {
            let item = &self.lookup[key];
            buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
            buf.extend_from_slice(key);
            buf.extend_from_slice(&(item.encoded().len() as u32).to_le_bytes());
            buf.extend_from_slice(item.encoded());
        }
    }

    pub(crate) fn decode_body(id: SegmentId, reader: &mut ByteReader<'_>) -> CoreResult<Self> {
        let mask = Mask::decode(reader)?;
        let count = reader.read_u32()?;
        let mut segment = Self::with_mask(id, mask);
        for _ in 0..count {
            let key_len = reader.read_u32()? as usize;
            let key = reader.read_bytes(key_len)?.to_vec();
            let value_len = reader.read_u32()? as usize;
            let value = reader.read_bytes(value_len)?.to_vec();
            if segment
                .keys
                .last()
                .is_some_and(|last| last.as_slice() >= key.as_slice())
            {
                return Err(CoreError::segment_corruption(
                    "map leaf keys not strictly ascending",
                ));
            }
            let item = MapItem::new(key.clone(), value);
            segment.total_size += item.size();
            segment.lookup.insert(key.clone(), item);
            segment.keys.push(key);
        }
        Ok(segment)
    }
}

/// Compact descriptor of a map leaf kept in the meta segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapSegmentHeader {
    /// Mask delimiting the leaf's keys.
    pub mask: Mask,
    /// Total size of the leaf's items.
    pub size: u32,
    /// Identifier the leaf resolves under in the ledger.
    pub seg_id: SegmentId,
}

/// The routing segment of a [`Map`](crate::Map).
///
/// Header order is significant: it reflects the order in which leaves
/// were created through successive splits, which is what the merge
/// parity policy relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapMeta {
    id: SegmentId,
    pub(crate) size: u32,
    pub(crate) headers: Vec<MapSegmentHeader>,
}

impl MapMeta {
    /// Creates a meta segment routing to a single (empty) leaf.
    #[must_use]
    pub fn new(id: SegmentId, first: MapSegmentHeader) -> Self {
        Self {
            id,
            size: 0,
            headers: vec![first],
        }
    }

    /// Returns the segment identifier.
    #[must_use]
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Returns the total size across all leaves.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Returns the leaf headers in creation order.
    #[must_use]
    pub fn headers(&self) -> &[MapSegmentHeader] {
        &self.headers
    }

    /// Routes `key` to the position of the first header whose mask
    /// accepts it.
    ///
    /// When the masks partition the key space this position is unique.
    /// Falls back to the first header when no mask matches, keeping
    /// lookups total.
    #[must_use]
    pub fn route(&self, key: &[u8]) -> usize {
        for (i, header) in self.headers.iter().enumerate() {
            if header.mask.is_member(key) {
                return i;
            }
        }
        0
    }

    #[cfg(test)]
    pub(crate) fn set_size(&mut self, size: u32) {
        self.size = size;
    }

    pub(crate) fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf.extend_from_slice(&(self.headers.len() as u32).to_le_bytes());
        for header in &self.headers {
            header.mask.encode_into(buf);
            buf.extend_from_slice(&header.size.to_le_bytes());
            buf.extend_from_slice(&header.seg_id.as_u64().to_le_bytes());
        }
    }

    pub(crate) fn decode_body(id: SegmentId, reader: &mut ByteReader<'_>) -> CoreResult<Self> {
        let size = reader.read_u32()?;
        let count = reader.read_u32()?;
        let mut headers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            headers.push(MapSegmentHeader {
                mask: Mask::decode(reader)?,
                size: reader.read_u32()?,
                seg_id: SegmentId::new(reader.read_u64()?),
            });
        }
        if headers.is_empty() {
            return Err(CoreError::segment_corruption(
                "map meta segment has no leaf headers",
            ));
        }
        Ok(Self { id, size, headers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_CAP: u32 = u32::MAX;

    fn seg(id: u64) -> MapSegment {
        MapSegment::new(SegmentId::new(id))
    }

    #[test]
    fn add_keeps_key_order() {
        let mut segment = seg(1);
        segment.add(MapItem::new("C", "3"), NO_CAP);
        segment.add(MapItem::new("A", "1"), NO_CAP);
        segment.add(MapItem::new("B", "2"), NO_CAP);

        let keys: Vec<&[u8]> = segment.keys().iter().map(Vec::as_slice).collect();
        assert_eq!(keys, vec![b"A".as_slice(), b"B", b"C"]);
        assert_eq!(segment.total_size(), 6);
    }

    #[test]
    fn add_replaces_same_key() {
        let mut segment = seg(1);
        segment.add(MapItem::new("A", "AAAA"), NO_CAP);
        segment.add(MapItem::new("A", "AAAAA"), NO_CAP);

        assert_eq!(segment.len(), 1);
        assert_eq!(segment.get(b"A").unwrap().encoded(), b"AAAAA");
        assert_eq!(segment.total_size(), 6);
    }

    #[test]
    fn add_rejects_oversized_item() {
        let mut segment = seg(1);
        segment.add(MapItem::new("key", "toolarge"), 6);
        assert!(segment.is_empty());
    }

    #[test]
    fn add_rejects_key_outside_mask() {
        let (left, _right) = Mask::accept_all().split(&[0x20], &[0x90]).unwrap();
        let mut segment = MapSegment::with_mask(SegmentId::new(1), left);

        segment.add(MapItem::new(vec![0x90], "v"), NO_CAP);
        assert!(segment.is_empty());

        segment.add(MapItem::new(vec![0x20], "v"), NO_CAP);
        assert_eq!(segment.len(), 1);
    }

    #[test]
    fn remove_adjusts_size() {
        let mut segment = seg(1);
        segment.add(MapItem::new("A", "11"), NO_CAP);
        segment.add(MapItem::new("B", "22"), NO_CAP);
        segment.remove(b"A");

        assert_eq!(segment.len(), 1);
        assert_eq!(segment.total_size(), 3);
        assert!(segment.get(b"A").is_none());
    }

    #[test]
    fn remove_missing_is_noop() {
        let mut segment = seg(1);
        segment.add(MapItem::new("A", "11"), NO_CAP);
        segment.remove(b"Z");
        assert_eq!(segment.len(), 1);
    }

    #[test]
    fn split_moves_upper_half_and_assigns_masks() {
        let mut segment = seg(1);
        for key in [0x10u8, 0x20, 0x90, 0xA0] {
            segment.add(MapItem::new(vec![key], "vvvvv"), NO_CAP);
        }

        let upper = segment.split(SegmentId::new(2)).unwrap();
        assert_eq!(segment.len(), 2);
        assert_eq!(upper.len(), 2);
        assert_eq!(segment.total_size(), 12);
        assert_eq!(upper.total_size(), 12);
        assert_eq!(upper.first_key(), Some([0x90u8].as_slice()));

        // Probes 0x20 / 0x90 disagree at the very first bit.
        assert_eq!(segment.mask().prefix_len(), 1);
        assert_eq!(upper.mask().prefix_len(), 1);
        assert!(segment.mask().is_member(&[0x10]));
        assert!(!segment.mask().is_member(&[0x90]));
        assert!(upper.mask().is_member(&[0x90]));
        assert!(!upper.mask().is_member(&[0x10]));
    }

    #[test]
    fn split_single_key_refused() {
        let mut segment = seg(1);
        segment.add(MapItem::new("A", "1"), NO_CAP);
        assert!(segment.split(SegmentId::new(2)).is_none());
    }

    #[test]
    fn split_refused_when_mask_exhausted() {
        let mut segment = seg(1);
        let mut a = vec![0u8; 33];
        let mut b = vec![0u8; 33];
        a[32] = 0x01;
        b[32] = 0x02;
        segment.add(MapItem::new(a.clone(), ""), NO_CAP);
        segment.add(MapItem::new(b, ""), NO_CAP);

        assert!(segment.split(SegmentId::new(2)).is_none());
        // Refusal leaves the segment untouched.
        assert_eq!(segment.len(), 2);
        assert!(segment.get(&a).is_some());
    }

    #[test]
    fn merge_rejects_non_siblings() {
        let mut left = seg(1);
        left.add(MapItem::new("A", "1"), NO_CAP);
        let mut right = seg(2);
        right.add(MapItem::new("Z", "9"), NO_CAP);
        right.set_mask(Mask::accept_all().split(&[0x20], &[0x90]).unwrap().1);

        let rejected = left.merge(right).unwrap_err();
        assert_eq!(rejected.len(), 1);
        assert_eq!(left.len(), 1);
        assert!(left.get(b"Z").is_none());
    }

    #[test]
    fn merge_recovers_parent_mask() {
        let mut segment = seg(1);
        for key in [0x10u8, 0x20, 0x90, 0xA0] {
            segment.add(MapItem::new(vec![key], "vvvvv"), NO_CAP);
        }
        let upper = segment.split(SegmentId::new(2)).unwrap();

        segment.merge(upper).unwrap();
        assert_eq!(segment.len(), 4);
        assert_eq!(segment.total_size(), 24);
        // First and last key disagree at bit 0: the recovered mask
        // accepts the whole range again.
        assert_eq!(segment.mask().prefix_len(), 0);
        assert!(segment.mask().is_member(&[0x90]));
    }

    #[test]
    fn header_reflects_contents() {
        let mut segment = seg(3);
        segment.add(MapItem::new("A", "123"), NO_CAP);
        let header = segment.header();
        assert_eq!(header.size, 4);
        assert_eq!(header.seg_id, SegmentId::new(3));
        assert_eq!(header.mask, *segment.mask());
    }

    #[test]
    fn route_by_mask_membership() {
        let mut segment = seg(1);
        for key in [0x10u8, 0x20, 0x90, 0xA0] {
            segment.add(MapItem::new(vec![key], "vvvvv"), NO_CAP);
        }
        let upper = segment.split(SegmentId::new(2)).unwrap();

        let mut meta = MapMeta::new(SegmentId::new(3), segment.header());
        meta.headers.push(upper.header());

        assert_eq!(meta.route(&[0x10]), 0);
        assert_eq!(meta.route(&[0x7F]), 0);
        assert_eq!(meta.route(&[0x90]), 1);
        assert_eq!(meta.route(&[0xFF]), 1);
    }
}
