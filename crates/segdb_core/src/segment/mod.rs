//! Tagged segment sum and wire codec.
//!
//! The ledger is polymorphic over segment variants; this module models the
//! variant set as a tagged sum, [`SegmentData`]. Retrieval pattern-matches
//! on the sum and surfaces an explicit error when an identifier resolves to
//! the wrong variant.
//!
//! ## Segment Frame Format
//!
//! ```text
//! | type (1) | segment_id (8) | body (N) | crc32 (4) |
//! ```
//!
//! Bodies are variant-specific:
//!
//! - array leaf: `count (4)` then per item `index (4) | len (4) | payload`
//! - array meta: `size (4) | count (4)` then per header
//!   `start_index (4) | size (4) | seg_id (8)`
//! - map leaf: `mask (36) | count (4)` then per item
//!   `key_len (4) | key | len (4) | payload`
//! - map meta: `size (4) | count (4)` then per header
//!   `mask (36) | size (4) | seg_id (8)`
//!
//! Decoding verifies the trailing CRC32 and the structural invariants
//! (strictly ascending indices and keys) before handing the segment back.

pub(crate) mod codec;

pub use codec::compute_crc32;

use crate::array::{ArrayMeta, ArraySegment};
use crate::error::{CoreError, CoreResult};
use crate::map::{MapMeta, MapSegment};
use codec::ByteReader;
use segdb_ledger::{LedgerError, LedgerResult, Segment, SegmentId};
use std::fmt;

/// Discriminant of a [`SegmentData`] variant; doubles as the wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentType {
    /// Data leaf of an Array.
    ArrayLeaf,
    /// Routing segment of an Array.
    ArrayMeta,
    /// Data leaf of a Map.
    MapLeaf,
    /// Routing segment of a Map.
    MapMeta,
}

impl SegmentType {
    /// Returns the wire tag for this variant.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::ArrayLeaf => 0x01,
            Self::ArrayMeta => 0x02,
            Self::MapLeaf => 0x03,
            Self::MapMeta => 0x04,
        }
    }

    /// Parses a wire tag back into a variant.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::ArrayLeaf),
            0x02 => Some(Self::ArrayMeta),
            0x03 => Some(Self::MapLeaf),
            0x04 => Some(Self::MapMeta),
            _ => None,
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ArrayLeaf => "array-leaf",
            Self::ArrayMeta => "array-meta",
            Self::MapLeaf => "map-leaf",
            Self::MapMeta => "map-meta",
        };
        f.write_str(name)
    }
}

/// The tagged sum of all segment variants stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentData {
    /// Data leaf of an Array.
    ArrayLeaf(ArraySegment),
    /// Routing segment of an Array.
    ArrayMeta(ArrayMeta),
    /// Data leaf of a Map.
    MapLeaf(MapSegment),
    /// Routing segment of a Map.
    MapMeta(MapMeta),
}

impl SegmentData {
    /// Returns the variant discriminant.
    #[must_use]
    pub fn segment_type(&self) -> SegmentType {
        match self {
            Self::ArrayLeaf(_) => SegmentType::ArrayLeaf,
            Self::ArrayMeta(_) => SegmentType::ArrayMeta,
            Self::MapLeaf(_) => SegmentType::MapLeaf,
            Self::MapMeta(_) => SegmentType::MapMeta,
        }
    }

    /// Returns the identifier of the wrapped segment.
    #[must_use]
    pub fn segment_id(&self) -> SegmentId {
        match self {
            Self::ArrayLeaf(seg) => seg.id(),
            Self::ArrayMeta(seg) => seg.id(),
            Self::MapLeaf(seg) => seg.id(),
            Self::MapMeta(seg) => seg.id(),
        }
    }

    /// Unwraps an array leaf.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VariantMismatch`] for any other variant.
    pub fn into_array_leaf(self) -> CoreResult<ArraySegment> {
        match self {
            Self::ArrayLeaf(seg) => Ok(seg),
            other => Err(other.mismatch(SegmentType::ArrayLeaf)),
        }
    }

    /// Unwraps an array meta segment.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VariantMismatch`] for any other variant.
    pub fn into_array_meta(self) -> CoreResult<ArrayMeta> {
        match self {
            Self::ArrayMeta(seg) => Ok(seg),
            other => Err(other.mismatch(SegmentType::ArrayMeta)),
        }
    }

    /// Unwraps a map leaf.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VariantMismatch`] for any other variant.
    pub fn into_map_leaf(self) -> CoreResult<MapSegment> {
        match self {
            Self::MapLeaf(seg) => Ok(seg),
            other => Err(other.mismatch(SegmentType::MapLeaf)),
        }
    }

    /// Unwraps a map meta segment.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VariantMismatch`] for any other variant.
    pub fn into_map_meta(self) -> CoreResult<MapMeta> {
        match self {
            Self::MapMeta(seg) => Ok(seg),
            other => Err(other.mismatch(SegmentType::MapMeta)),
        }
    }

    fn mismatch(&self, expected: SegmentType) -> CoreError {
        CoreError::VariantMismatch {
            id: self.segment_id(),
            expected,
            actual: self.segment_type(),
        }
    }

    /// Encodes this segment as a framed byte string.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(self.segment_type().as_byte());
        buf.extend_from_slice(&self.segment_id().as_u64().to_le_bytes());
        match self {
            Self::ArrayLeaf(seg) => seg.encode_body(&mut buf),
            Self::ArrayMeta(seg) => seg.encode_body(&mut buf),
            Self::MapLeaf(seg) => seg.encode_body(&mut buf),
            Self::MapMeta(seg) => seg.encode_body(&mut buf),
        }
        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes a framed segment, verifying the checksum and the
    /// structural invariants of the variant.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ChecksumMismatch`] when the trailing CRC does
    /// not match and [`CoreError::SegmentCorruption`] for any structural
    /// defect.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        // tag + id + crc is the smallest possible frame
        if data.len() < 1 + 8 + 4 {
            return Err(CoreError::segment_corruption("segment frame too short"));
        }

        let (framed, crc_bytes) = data.split_at(data.len() - 4);
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let computed = compute_crc32(framed);
        if stored != computed {
            return Err(CoreError::ChecksumMismatch {
                expected: stored,
                actual: computed,
            });
        }

        let mut reader = ByteReader::new(framed);
        let tag = reader.read_u8()?;
        let segment_type = SegmentType::from_byte(tag).ok_or_else(|| {
            CoreError::segment_corruption(format!("unknown segment type {tag:#04x}"))
        })?;
        let id = SegmentId::new(reader.read_u64()?);

        let segment = match segment_type {
            SegmentType::ArrayLeaf => Self::ArrayLeaf(ArraySegment::decode_body(id, &mut reader)?),
            SegmentType::ArrayMeta => Self::ArrayMeta(ArrayMeta::decode_body(id, &mut reader)?),
            SegmentType::MapLeaf => Self::MapLeaf(MapSegment::decode_body(id, &mut reader)?),
            SegmentType::MapMeta => Self::MapMeta(MapMeta::decode_body(id, &mut reader)?),
        };

        if !reader.is_empty() {
            return Err(CoreError::segment_corruption(
                "trailing bytes after segment body",
            ));
        }
        Ok(segment)
    }
}

impl Segment for SegmentData {
    fn id(&self) -> SegmentId {
        self.segment_id()
    }

    fn encoded(&self) -> Vec<u8> {
        self.encode()
    }

    fn load(&mut self, bytes: &[u8]) -> LedgerResult<()> {
        *self = Self::decode(bytes).map_err(|err| LedgerError::corrupted(err.to_string()))?;
        Ok(())
    }
}

impl From<ArraySegment> for SegmentData {
    fn from(seg: ArraySegment) -> Self {
        Self::ArrayLeaf(seg)
    }
}

impl From<ArrayMeta> for SegmentData {
    fn from(seg: ArrayMeta) -> Self {
        Self::ArrayMeta(seg)
    }
}

impl From<MapSegment> for SegmentData {
    fn from(seg: MapSegment) -> Self {
        Self::MapLeaf(seg)
    }
}

impl From<MapMeta> for SegmentData {
    fn from(seg: MapMeta) -> Self {
        Self::MapMeta(seg)
    }
}
