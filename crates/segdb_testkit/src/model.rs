//! Model-based checking against `BTreeMap` reference models.
//!
//! Operation sequences from [`crate::generators`] are applied to a
//! façade and to a plain ordered map at the same time; afterwards the
//! façade must agree with the model and every structural invariant of
//! the segment tree must hold.

use crate::fixtures::{ArrayFixture, MapFixture};
use crate::generators::{ArrayOp, MapOp};
use segdb_core::{ArrayItem, Config, CoreResult, MapItem};
use segdb_ledger::SegmentLedger;
use std::collections::BTreeMap;

/// Reference model of an array: index to payload bytes.
pub type ArrayModel = BTreeMap<u32, Vec<u8>>;

/// Reference model of a map: key to payload bytes.
pub type MapModel = BTreeMap<Vec<u8>, Vec<u8>>;

/// Applies one operation to the array and mirrors it in the model.
///
/// # Errors
///
/// Propagates façade errors (which the model-based tests treat as
/// failures - no generated operation is allowed to fail structurally).
pub fn apply_array_op(fixture: &ArrayFixture, model: &mut ArrayModel, op: &ArrayOp) -> CoreResult<()> {
    let config = Config::default();
    match op {
        ArrayOp::Insert { index, value } => {
            let item = ArrayItem::new(*index, value.clone());
            if item.size() <= config.max_item_size {
                model.insert(*index, value.clone());
            }
            fixture.array.insert(item)
        }
        ArrayOp::Remove { index } => {
            model.remove(index);
            fixture.array.remove(*index)
        }
        ArrayOp::Append { value } => {
            let next = model.keys().next_back().map_or(1, |max| max + 1);
            model.insert(next, vec![*value]);
            fixture.array.append_byte(*value)
        }
    }
}

/// Applies one operation to the map and mirrors it in the model.
///
/// The mirror is only meaningful while the map has a single leaf; see
/// the callers for how it is used.
///
/// # Errors
///
/// Propagates façade errors.
pub fn apply_map_op(fixture: &MapFixture, model: &mut MapModel, op: &MapOp) -> CoreResult<()> {
    let config = Config::default();
    match op {
        MapOp::Insert { key, value } => {
            let item = MapItem::new(key.clone(), value.clone());
            if item.size() <= config.max_item_size {
                model.insert(key.clone(), value.clone());
            }
            fixture.map.insert(item)
        }
        MapOp::Remove { key } => {
            model.remove(key);
            fixture.map.remove(key)
        }
        MapOp::Get { key } => {
            fixture.map.get(key)?;
            Ok(())
        }
    }
}

/// Concatenates the model's payloads in index order - the byte stream
/// `Array::validate` must reproduce.
#[must_use]
pub fn expected_stream(model: &ArrayModel) -> Vec<u8> {
    let mut stream = Vec::new();
    for value in model.values() {
        stream.extend_from_slice(value);
    }
    stream
}

/// Asserts that the array agrees with the reference model item by item.
///
/// # Errors
///
/// Propagates façade errors.
pub fn check_array_against_model(fixture: &ArrayFixture, model: &ArrayModel) -> CoreResult<()> {
    assert!(
        fixture.array.validate(&expected_stream(model))?,
        "validate rejected the model's expected byte stream"
    );
    for (index, value) in model {
        let item = fixture.array.get(*index)?;
        assert_eq!(
            item.as_ref().map(ArrayItem::encoded),
            Some(value.as_slice()),
            "divergence at index {index}"
        );
    }
    Ok(())
}

/// Sweeps the structural invariants of the array's segment tree.
///
/// # Errors
///
/// Propagates façade errors.
pub fn check_array_invariants(fixture: &ArrayFixture) -> CoreResult<()> {
    let config = Config::default();
    let meta = fixture
        .ledger
        .get(fixture.array.meta_segment_id())
        .expect("meta segment missing")
        .into_array_meta()?;

    let mut leaves_total = 0u32;
    let mut previous_last: Option<u32> = None;
    for header in meta.headers() {
        let leaf = fixture
            .ledger
            .get(header.seg_id)
            .expect("leaf segment missing")
            .into_array_leaf()?;

        assert_eq!(header.start_index, leaf.start_index(), "stale header start");
        assert_eq!(header.size, leaf.total_size(), "stale header size");
        assert!(
            leaf.total_size() <= config.max_threshold,
            "leaf {} exceeds max threshold",
            leaf.id()
        );
        if meta.headers().len() > 1 {
            assert!(!leaf.is_empty(), "empty leaf left behind in a multi-leaf tree");
        }

        let mut computed = 0u32;
        let mut previous_index: Option<u32> = None;
        for item in leaf.items() {
            if let Some(previous) = previous_index {
                assert!(previous < item.index(), "leaf indices not strictly ascending");
            }
            previous_index = Some(item.index());
            computed += item.size();
        }
        assert_eq!(computed, leaf.total_size(), "leaf size out of sync");

        if let (Some(previous), Some(first)) = (previous_last, leaf.items().first()) {
            assert!(
                previous < first.index(),
                "leaves do not partition the index space"
            );
        }
        previous_last = leaf.items().last().map(ArrayItem::index).or(previous_last);
        leaves_total += computed;
    }

    assert_eq!(leaves_total, meta.size(), "meta size out of sync");
    Ok(())
}

/// Checks the robust subset of map invariants: every routing header is
/// fresh (mask and size match the leaf it points to) and the meta size
/// equals the sum of the leaf sizes.
///
/// These hold for arbitrary key workloads. The full sweep in
/// [`check_map_invariants`] additionally requires that every split so
/// far kept keys members of their leaf masks, which adversarial key
/// distributions can break (mask routing then degrades to the
/// first-leaf fallback).
///
/// # Errors
///
/// Propagates façade errors.
pub fn check_map_headers_fresh(fixture: &MapFixture) -> CoreResult<()> {
    let meta = fixture
        .ledger
        .get(fixture.map.meta_segment_id())
        .expect("meta segment missing")
        .into_map_meta()?;

    let mut leaves_total = 0u32;
    for header in meta.headers() {
        let leaf = fixture
            .ledger
            .get(header.seg_id)
            .expect("leaf segment missing")
            .into_map_leaf()?;
        assert_eq!(&header.mask, leaf.mask(), "stale header mask");
        assert_eq!(header.size, leaf.total_size(), "stale header size");
        leaves_total += leaf.total_size();
    }
    assert_eq!(leaves_total, meta.size(), "meta size out of sync");
    Ok(())
}

/// Sweeps the full structural invariants of the map's segment tree.
///
/// # Errors
///
/// Propagates façade errors.
pub fn check_map_invariants(fixture: &MapFixture) -> CoreResult<()> {
    let config = Config::default();
    let meta = fixture
        .ledger
        .get(fixture.map.meta_segment_id())
        .expect("meta segment missing")
        .into_map_meta()?;

    let mut leaves_total = 0u32;
    for header in meta.headers() {
        let leaf = fixture
            .ledger
            .get(header.seg_id)
            .expect("leaf segment missing")
            .into_map_leaf()?;

        assert_eq!(&header.mask, leaf.mask(), "stale header mask");
        assert_eq!(header.size, leaf.total_size(), "stale header size");
        assert!(
            leaf.total_size() <= config.max_threshold,
            "leaf {} exceeds max threshold",
            leaf.id()
        );

        let mut computed = 0u32;
        let mut previous_key: Option<&[u8]> = None;
        for key in leaf.keys() {
            if let Some(previous) = previous_key {
                assert!(previous < key.as_slice(), "leaf keys not strictly ascending");
            }
            previous_key = Some(key);
            let item = leaf.get(key).expect("key without a stored item");
            computed += item.size();
        }
        assert_eq!(leaf.keys().len(), leaf.len(), "key list out of sync with lookup");
        assert_eq!(computed, leaf.total_size(), "leaf size out of sync");
        leaves_total += computed;
    }

    assert_eq!(leaves_total, meta.size(), "meta size out of sync");
    Ok(())
}
