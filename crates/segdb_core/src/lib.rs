//! # SegDB Core
//!
//! Segmented, self-balancing collections over a segment ledger.
//!
//! This crate provides two collections represented not as one contiguous
//! structure but as a list of bounded-size data segments plus a meta
//! segment that routes to them:
//!
//! - [`Array`] - ordered items keyed by dense `u32` indices; leaves are
//!   routed by index ranges
//! - [`Map`] - items keyed by arbitrary byte strings; leaves are routed by
//!   bit-prefix [`Mask`]s that partition the key space along binary
//!   prefixes
//!
//! Both collections keep every leaf within configurable size bounds by
//! splitting leaves that grow past the upper threshold and merging leaves
//! that shrink below the lower one, rewriting the meta segment's routing
//! headers as they go. All segments live in a
//! [`SegmentLedger`](segdb_ledger::SegmentLedger) and are addressable by
//! [`SegmentId`](segdb_ledger::SegmentId), so a collection can be
//! reconstituted from its meta-segment identifier alone.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod array;
mod config;
mod error;
mod item;
mod map;
mod mask;
mod segment;

pub use array::{Array, ArrayMeta, ArraySegment, ArraySegmentHeader};
pub use config::{
    Config, DEFAULT_MAX_ITEM_SIZE, DEFAULT_MAX_THRESHOLD, DEFAULT_MIN_THRESHOLD,
};
pub use error::{CoreError, CoreResult};
pub use item::{ArrayItem, MapItem};
pub use map::{Map, MapMeta, MapSegment, MapSegmentHeader};
pub use mask::{common_prefix_bits, Mask, MASK_BITS, MASK_BYTES};
pub use segment::{compute_crc32, SegmentData, SegmentType};
