//! Array leaf and meta segments.

use crate::error::{CoreError, CoreResult};
use crate::item::ArrayItem;
use crate::segment::codec::ByteReader;
use segdb_ledger::SegmentId;

/// A data leaf of an [`Array`](crate::Array): items ordered by index.
///
/// # Invariants
///
/// - element indices are strictly increasing
/// - `total_size` equals the sum of the elements' sizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySegment {
    id: SegmentId,
    total_size: u32,
    elements: Vec<ArrayItem>,
}

impl ArraySegment {
    /// Creates a new empty leaf.
    #[must_use]
    pub fn new(id: SegmentId) -> Self {
        Self {
            id,
            total_size: 0,
            elements: Vec::new(),
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
        self.elements.len()
    }

    /// Returns `true` if the leaf holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns the first stored index, or 0 when empty.
    #[must_use]
    pub fn start_index(&self) -> u32 {
        self.elements.first().map_or(0, ArrayItem::index)
    }

    /// Returns the last stored index, or 0 when empty.
    #[must_use]
    pub fn last_index(&self) -> u32 {
        self.elements.last().map_or(0, ArrayItem::index)
    }

    /// Returns the stored items in index order.
    #[must_use]
    pub fn items(&self) -> &[ArrayItem] {
        &self.elements
    }

    /// Looks up the item stored at `index`.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&ArrayItem> {
        if index < self.start_index() || index > self.last_index() {
            return None;
        }
        self.position(index).ok().map(|pos| &self.elements[pos])
    }

    /// Inserts `item` in index order, replacing any item with the same
    /// index.
    ///
    /// Items larger than `max_item_size` are silently rejected.
    pub fn add(&mut self, item: ArrayItem, max_item_size: u32) {
        if item.size() > max_item_size {
            return;
        }
        match self.position(item.index()) {
            Ok(pos) => {
                let old = self.elements[pos].size();
                self.total_size = self.total_size - old + item.size();
                self.elements[pos] = item;
            }
            Err(pos) => {
                self.total_size += item.size();
                self.elements.insert(pos, item);
            }
        }
    }

    /// Removes the item stored at `index`; no-op when absent.
    pub fn remove(&mut self, index: u32) {
        if let Ok(pos) = self.position(index) {
            let removed = self.elements.remove(pos);
            self.total_size -= removed.size();
        }
    }

    /// Splits off the upper half of this leaf into a new segment.
    ///
    /// The lower half (the larger share when the count is odd) stays
    /// here, keeping the tail segment lighter for append-heavy
    /// workloads. Returns `None` when there are fewer than two items.
    #[must_use]
    pub fn split(&mut self, new_id: SegmentId) -> Option<ArraySegment> {
        if self.elements.len() < 2 {
            return None;
        }
        let break_point = self.elements.len().div_ceil(2);
        let upper = self.elements.split_off(break_point);
        let moved: u32 = upper.iter().map(ArrayItem::size).sum();
        self.total_size -= moved;
        Some(Self {
            id: new_id,
            total_size: moved,
            elements: upper,
        })
    }

    /// Appends all of `other`'s items to this leaf.
    ///
    /// The caller must ensure `self.last_index() < other.start_index()`.
    pub fn merge(&mut self, other: ArraySegment) {
        self.total_size += other.total_size;
        self.elements.extend(other.elements);
    }

    /// Produces the routing header for this leaf.
    #[must_use]
    pub fn header(&self) -> ArraySegmentHeader {
        ArraySegmentHeader {
            start_index: self.start_index(),
            size: self.total_size,
            seg_id: self.id,
        }
    }

    fn position(&self, index: u32) -> Result<usize, usize> {
        self.elements.binary_search_by_key(&index, ArrayItem::index)
    }

    pub(crate) fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.elements.len() as u32).to_le_bytes());
        for item in &self.elements {
            buf.extend_from_slice(&item.index().to_le_bytes());
            buf.extend_from_slice(&(item.encoded().len() as u32).to_le_bytes());
            buf.extend_from_slice(item.encoded());
        }
    }

    pub(crate) fn decode_body(id: SegmentId, reader: &mut ByteReader<'_>) -> CoreResult<Self> {
        let count = reader.read_u32()?;
        let mut segment = Self::new(id);
        for _ in 0..count {
            let index = reader.read_u32()?;
            let len = reader.read_u32()? as usize;
            let value = reader.read_bytes(len)?.to_vec();
            if segment
                .elements
                .last()
                .is_some_and(|last| last.index() >= index)
            {
                return Err(CoreError::segment_corruption(
                    "array leaf indices not strictly increasing",
                ));
            }
            let item = ArrayItem::new(index, value);
            segment.total_size += item.size();
            segment.elements.push(item);
        }
        Ok(segment)
    }
}

/// Compact descriptor of an array leaf kept in the meta segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArraySegmentHeader {
    /// First index stored in the leaf (0 when empty).
    pub start_index: u32,
    /// Total size of the leaf's items.
    pub size: u32,
    /// Identifier the leaf resolves under in the ledger.
    pub seg_id: SegmentId,
}

/// The routing segment of an [`Array`](crate::Array).
///
/// Headers are kept in strictly ascending `start_index` order; contiguous
/// leaves partition the occupied index space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayMeta {
    id: SegmentId,
    pub(crate) size: u32,
    pub(crate) headers: Vec<ArraySegmentHeader>,
}

impl ArrayMeta {
    /// Creates a meta segment routing to a single (empty) leaf.
    #[must_use]
    pub fn new(id: SegmentId, first: ArraySegmentHeader) -> Self {
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

    /// Returns the leaf headers in `start_index` order.
    #[must_use]
    pub fn headers(&self) -> &[ArraySegmentHeader] {
        &self.headers
    }

    /// Routes `index` to the position of the owning leaf's header.
    ///
    /// Returns the header whose `start_index` matches exactly, otherwise
    /// the last header whose range could contain the index (the first
    /// header for indices below every leaf, the last for indices beyond).
    #[must_use]
    pub fn route(&self, index: u32) -> usize {
        for (i, header) in self.headers.iter().enumerate() {
            if index == header.start_index {
                return i;
            }
            if index < header.start_index {
                return i.saturating_sub(1);
            }
        }
        self.headers.len().saturating_sub(1)
    }

    #[cfg(test)]
    pub(crate) fn set_size(&mut self, size: u32) {
        self.size = size;
    }

    pub(crate) fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf.extend_from_slice(&(self.headers.len() as u32).to_le_bytes());
        for header in &self.headers {
            buf.extend_from_slice(&header.start_index.to_le_bytes());
            buf.extend_from_slice(&header.size.to_le_bytes());
            buf.extend_from_slice(&header.seg_id.as_u64().to_le_bytes());
        }
    }

    pub(crate) fn decode_body(id: SegmentId, reader: &mut ByteReader<'_>) -> CoreResult<Self> {
        let size = reader.read_u32()?;
        let count = reader.read_u32()?;
        let mut headers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            headers.push(ArraySegmentHeader {
                start_index: reader.read_u32()?,
                size: reader.read_u32()?,
                seg_id: SegmentId::new(reader.read_u64()?),
            });
        }
        if headers.is_empty() {
            return Err(CoreError::segment_corruption(
                "array meta segment has no leaf headers",
            ));
        }
        Ok(Self { id, size, headers })
    }
}
