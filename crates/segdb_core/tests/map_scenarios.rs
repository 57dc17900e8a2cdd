//! End-to-end Map scenarios against an in-memory ledger.

use segdb_core::{Map, MapItem, SegmentData};
use segdb_ledger::{InMemoryLedger, SegmentIdAllocator, SegmentLedger};
use std::sync::Arc;

type Ledger = InMemoryLedger<SegmentData>;

struct Session {
    ledger: Arc<Ledger>,
    ids: Arc<SegmentIdAllocator>,
    map: Map<Ledger>,
}

fn session() -> Session {
    let ledger = Arc::new(InMemoryLedger::new());
    let ids = Arc::new(SegmentIdAllocator::new());
    let map = Map::create(Arc::clone(&ledger), Arc::clone(&ids));
    Session { ledger, ids, map }
}

#[test]
fn insert_replace_and_lookup_session() {
    let s = session();
    s.map.insert(MapItem::new("A", "AAAA")).unwrap();
    s.map.insert(MapItem::new("B", "BBB")).unwrap();
    s.map.insert(MapItem::new("D", "DDDD")).unwrap();
    s.map.insert(MapItem::new("A", "AAAAA")).unwrap(); // replace
    s.map.insert(MapItem::new("C", "CC")).unwrap();
    s.map.insert(MapItem::new("F", "FFFF")).unwrap(); // forces a split

    assert!(s.map.get(b"H").unwrap().is_none());
    assert_eq!(s.map.get(b"A").unwrap().unwrap().encoded(), b"AAAAA");
    assert_eq!(s.map.get(b"B").unwrap().unwrap().encoded(), b"BBB");
    assert_eq!(s.map.get(b"C").unwrap().unwrap().encoded(), b"CC");

    assert_eq!(s.map.segment_count().unwrap(), 2);
    assert_eq!(s.map.size().unwrap(), 23);
}

#[test]
fn insert_remove_roundtrip() {
    let s = session();
    s.map.insert(MapItem::new("key", "val")).unwrap();
    assert_eq!(s.map.get(b"key").unwrap().unwrap().encoded(), b"val");

    s.map.remove(b"key").unwrap();
    assert!(s.map.get(b"key").unwrap().is_none());
    assert_eq!(s.map.size().unwrap(), 0);
}

#[test]
fn split_siblings_stay_disjoint() {
    let s = session();
    s.map.insert(MapItem::new("A", "AAAA")).unwrap();
    s.map.insert(MapItem::new("B", "BBB")).unwrap();
    s.map.insert(MapItem::new("D", "DDDD")).unwrap();
    s.map.insert(MapItem::new("A", "AAAAA")).unwrap();
    s.map.insert(MapItem::new("C", "CC")).unwrap();
    s.map.insert(MapItem::new("F", "FFFF")).unwrap();
    assert_eq!(s.map.segment_count().unwrap(), 2);

    let meta = s
        .ledger
        .get(s.map.meta_segment_id())
        .unwrap()
        .into_map_meta()
        .unwrap();
    let (left, right) = (meta.headers()[0].mask, meta.headers()[1].mask);
    assert_eq!(left.prefix_len(), right.prefix_len());
    for key in 0..=255u8 {
        assert!(
            !(left.is_member(&[key]) && right.is_member(&[key])),
            "key {key:#04x} accepted by both siblings"
        );
    }
}

#[test]
fn boundary_aligned_split_partitions_key_space() {
    // High-bit keys make the split probes disagree exactly at the
    // parent's boundary, so the sibling masks partition the key space.
    let s = session();
    for key in [0x10u8, 0x20, 0x90, 0xA0] {
        s.map.insert(MapItem::new(vec![key], "vvvvv")).unwrap();
    }
    assert_eq!(s.map.segment_count().unwrap(), 2);

    let meta = s
        .ledger
        .get(s.map.meta_segment_id())
        .unwrap()
        .into_map_meta()
        .unwrap();
    let (left, right) = (meta.headers()[0].mask, meta.headers()[1].mask);
    for key in 0..=255u8 {
        let hits = usize::from(left.is_member(&[key])) + usize::from(right.is_member(&[key]));
        assert_eq!(hits, 1, "key {key:#04x} matched {hits} sibling masks");
    }

    // Routing therefore finds every item, and later inserts land in
    // the right sibling.
    for key in [0x10u8, 0x20, 0x90, 0xA0] {
        assert!(s.map.get(&[key]).unwrap().is_some());
    }
    s.map.insert(MapItem::new(vec![0xF0u8], "vvvvv")).unwrap();
    assert_eq!(s.map.get(&[0xF0]).unwrap().unwrap().encoded(), b"vvvvv");
}

#[test]
fn underfilled_sibling_folds_back() {
    let s = session();
    for key in [0x10u8, 0x20, 0x90, 0xA0] {
        s.map.insert(MapItem::new(vec![key], "vvvvv")).unwrap();
    }
    assert_eq!(s.map.segment_count().unwrap(), 2);

    s.map.remove(&[0x90]).unwrap();
    s.map.remove(&[0xA0]).unwrap();

    assert_eq!(s.map.segment_count().unwrap(), 1);
    assert_eq!(s.map.size().unwrap(), 12);
    for key in [0x10u8, 0x20] {
        assert!(s.map.get(&[key]).unwrap().is_some());
    }
    // Absorbed leaves disappear from the ledger: one leaf plus meta.
    assert_eq!(s.ledger.len(), 2);
}

#[test]
fn fetch_observes_same_state() {
    let s = session();
    for key in [0x10u8, 0x20, 0x90, 0xA0] {
        s.map.insert(MapItem::new(vec![key], "vvvvv")).unwrap();
    }

    let fetched = Map::fetch(
        s.map.meta_segment_id(),
        Arc::clone(&s.ledger),
        Arc::clone(&s.ids),
    )
    .unwrap();

    assert_eq!(fetched.size().unwrap(), s.map.size().unwrap());
    assert_eq!(
        fetched.segment_count().unwrap(),
        s.map.segment_count().unwrap()
    );
    for key in [0x10u8, 0x20, 0x90, 0xA0] {
        assert_eq!(fetched.get(&[key]).unwrap(), s.map.get(&[key]).unwrap());
    }
}

#[test]
fn rehydrates_from_encoded_segments() {
    let s = session();
    for key in [0x10u8, 0x20, 0x90, 0xA0] {
        s.map.insert(MapItem::new(vec![key], "vvvvv")).unwrap();
    }
    let meta_id = s.map.meta_segment_id();

    let restored: Arc<Ledger> = Arc::new(InMemoryLedger::new());
    let meta = s.ledger.get(meta_id).unwrap().into_map_meta().unwrap();
    let mut segment_ids = vec![meta_id];
    segment_ids.extend(meta.headers().iter().map(|header| header.seg_id));

    let mut highest = 0;
    for id in segment_ids {
        let encoded = s.ledger.get(id).unwrap().encode();
        restored.put(SegmentData::decode(&encoded).unwrap());
        highest = highest.max(id.as_u64());
    }

    let revived = Map::fetch(
        meta_id,
        restored,
        Arc::new(SegmentIdAllocator::starting_at(highest + 1)),
    )
    .unwrap();

    assert_eq!(revived.size().unwrap(), 24);
    for key in [0x10u8, 0x20, 0x90, 0xA0] {
        assert_eq!(revived.get(&[key]).unwrap().unwrap().encoded(), b"vvvvv");
    }
}
