//! Cache-hierarchy propagation tests.

use cachefx_core::common::CacheContext;

use crate::common::{tag, two_level_assoc};

const ATT: CacheContext = CacheContext::ATTACKER;

/// A miss at every level produces one response per level, in order.
#[test]
fn full_miss_touches_every_level() {
    let mut cache = two_level_assoc(4, 16);
    let mut responses = Vec::new();
    assert!(!cache.read_with(tag(1), ATT, &mut responses));
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].level, 1);
    assert_eq!(responses[1].level, 2);
    assert!(responses.iter().all(|r| !r.hit));
}

/// A hit at level 1 produces exactly one response, and it is the hit.
#[test]
fn l1_hit_stops_the_walk() {
    let mut cache = two_level_assoc(4, 16);
    cache.read(tag(1), ATT);

    let mut responses = Vec::new();
    assert!(cache.read_with(tag(1), ATT, &mut responses));
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].level, 1);
    assert!(responses[0].hit);
}

/// A line evicted from L1 but resident in L2 yields a miss record at
/// level 1 followed by the authoritative hit at level 2.
#[test]
fn l2_hit_after_l1_capacity_eviction() {
    let mut cache = two_level_assoc(4, 16);
    cache.read(tag(0), ATT);
    // Push tag 0 out of the 4-way L1; L2 (16 ways) keeps everything.
    for v in 1..5 {
        cache.read(tag(v), ATT);
    }

    let mut responses = Vec::new();
    assert!(cache.read_with(tag(0), ATT, &mut responses));
    assert_eq!(responses.len(), 2);
    assert!(!responses[0].hit, "missed in L1");
    assert!(responses[1].hit, "answered by L2");
    assert_eq!(responses[1].level, 2);
}

/// Invalidation broadcasts to every level.
#[test]
fn evict_broadcasts() {
    let mut cache = two_level_assoc(4, 16);
    cache.read(tag(3), ATT);

    let mut responses = Vec::new();
    assert!(cache.evict_with(tag(3), ATT, &mut responses));
    assert_eq!(responses.len(), 2, "one record per level");
    assert!(responses.iter().all(|r| r.level > 0));
    assert!(!cache.read(tag(3), ATT));
}

/// Multi-level hierarchies aggregate their geometry and leave the
/// single-level-only queries undefined.
#[test]
fn multi_level_geometry_is_aggregated() {
    let cache = two_level_assoc(4, 16);
    assert_eq!(cache.lines(), 20, "aggregate line count");
    assert_eq!(cache.eviction_set_size(), 0, "undefined for multi-level");
}
