//! Error types for ledger operations.

use crate::id::SegmentId;
use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No segment is registered under the given identifier.
    #[error("segment not found: {id}")]
    SegmentNotFound {
        /// The identifier that failed to resolve.
        id: SegmentId,
    },

    /// A segment could not be reconstructed from its encoded form.
    #[error("segment corrupted: {0}")]
    Corrupted(String),
}

impl LedgerError {
    /// Creates a corrupted-segment error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
