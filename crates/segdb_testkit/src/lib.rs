//! # SegDB Testkit
//!
//! Test utilities for SegDB.
//!
//! This crate provides:
//! - Fixtures for fresh in-memory collections
//! - Property-based test generators using proptest
//! - Model-based checking that drives façades against `BTreeMap`
//!   reference models and sweeps the structural invariants
//!
//! ## Usage
//!
//! ```rust,ignore
//! use segdb_testkit::prelude::*;
//!
//! let fixture = ArrayFixture::new();
//! fixture.array.append_byte(1).unwrap();
//! check_array_invariants(&fixture).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod model;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
}

pub use fixtures::*;
pub use generators::*;
pub use model::*;
