//! Byte-level helpers for the segment wire format.

use crate::error::{CoreError, CoreResult};

/// Reflected polynomial of CRC-32 (IEEE 802.3).
const CRC32_POLYNOMIAL: u32 = 0xEDB8_8320;

/// Computes a CRC32 checksum (IEEE polynomial) of the given data.
///
/// Bit-serial; one step of polynomial division per input bit.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    let mut state = !0u32;
    for &byte in data {
        state ^= u32::from(byte);
        for _ in 0..8 {
            let feedback = state & 1 != 0;
            state >>= 1;
            if feedback {
                state ^= CRC32_POLYNOMIAL;
            }
        }
    }
    !state
}

/// Sequential reader over an encoded segment body.
///
/// All reads are bounds-checked and return
/// [`CoreError::SegmentCorruption`] on truncation.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn read_u8(&mut self) -> CoreResult<u8> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    pub(crate) fn read_u32(&mut self) -> CoreResult<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_u64(&mut self) -> CoreResult<u64> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len());
        let Some(end) = end else {
            return Err(CoreError::segment_corruption(
                "unexpected end of segment body",
            ));
        };
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }
}
