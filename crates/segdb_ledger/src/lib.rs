//! # SegDB Ledger
//!
//! Segment store abstraction for SegDB.
//!
//! This crate provides the lowest-level storage abstraction for segmented
//! collections. A [`SegmentLedger`] is an associative store from
//! [`SegmentId`] to segment values - it imposes no ordering and no
//! persistence policy. Segments are anything implementing the [`Segment`]
//! capability trait: addressable by identifier, encodable to bytes, and
//! loadable from bytes.
//!
//! ## Design Principles
//!
//! - The ledger owns all segments; callers address them by [`SegmentId`]
//! - Reads hand out value snapshots, never references into the store
//! - Identifier allocation is a separate concern ([`SegmentIdAllocator`]);
//!   any monotonic unique generator suffices
//! - No knowledge of segment contents or collection structure
//!
//! ## Example
//!
//! ```rust,ignore
//! use segdb_ledger::{InMemoryLedger, SegmentIdAllocator, SegmentLedger};
//!
//! let ledger = InMemoryLedger::new();
//! let ids = SegmentIdAllocator::new();
//!
//! let segment = MySegment::new(ids.next());
//! ledger.put(segment.clone());
//! assert_eq!(ledger.get(segment.id()), Some(segment));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod id;
mod ledger;
mod memory;

pub use error::{LedgerError, LedgerResult};
pub use id::{SegmentId, SegmentIdAllocator};
pub use ledger::{Segment, SegmentLedger};
pub use memory::InMemoryLedger;
