//! Error types for SegDB core.

use crate::segment::SegmentType;
use segdb_ledger::{LedgerError, SegmentId};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in SegDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A routing header referred to a segment the ledger does not hold.
    #[error("segment not found: {id}")]
    SegmentNotFound {
        /// The identifier that failed to resolve.
        id: SegmentId,
    },

    /// A segment resolved to a different variant than the caller expected.
    #[error("segment variant mismatch for {id}: expected {expected}, got {actual}")]
    VariantMismatch {
        /// The identifier that resolved to the wrong variant.
        id: SegmentId,
        /// The variant the caller asked for.
        expected: SegmentType,
        /// The variant actually stored.
        actual: SegmentType,
    },

    /// A segment's encoded form is structurally invalid.
    #[error("segment corruption: {message}")]
    SegmentCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// A segment's stored checksum does not match its contents.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },
}

impl CoreError {
    /// Creates a segment corruption error.
    pub fn segment_corruption(message: impl Into<String>) -> Self {
        Self::SegmentCorruption {
            message: message.into(),
        }
    }
}
