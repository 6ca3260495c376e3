//! CEASER and CEASER-S tests.

use cachefx_core::cache::{
    Cache, CacheModel, CacheModelKind, CeaserCache, CeaserSCache, ReplacementPolicy,
};
use cachefx_core::common::{CacheContext, Tag};

use crate::common::{rng, tag};

const ATT: CacheContext = CacheContext::ATTACKER;

fn ceaser(nsets: usize, nways: usize) -> Cache {
    let mut rng = rng();
    Cache::new(CacheModelKind::Ceaser(CeaserCache::new(
        ReplacementPolicy::Lru,
        nsets,
        nways,
        &mut rng,
    )))
}

/// With the fixed key, a scan of consecutive tags contains both colliding
/// and non-colliding pairs against a reference tag, and the oracle's idea
/// of collision disagrees with plain modulo indexing somewhere.
#[test]
fn keyed_index_scrambles_collisions() {
    let cache = ceaser(16, 4);
    let reference = tag(3);

    let mut colliding = 0;
    let mut disjoint = 0;
    let mut disagrees_with_modulo = false;
    for v in 0..256 {
        let t = tag(v);
        if t == reference {
            continue;
        }
        if cache.has_collision(reference, ATT, t, ATT) {
            colliding += 1;
            if v % 16 != 3 {
                disagrees_with_modulo = true;
            }
        } else {
            disjoint += 1;
        }
    }
    assert!(colliding > 0, "some tag shares the keyed set");
    assert!(disjoint > 0, "some tag does not");
    assert!(disagrees_with_modulo, "the index is not plain modulo");
}

/// Priming a keyed set with `ways` colliding tags evicts the reference.
#[test]
fn colliding_tags_evict_through_the_permutation() {
    let mut cache = ceaser(16, 4);
    let reference = tag(1000);

    let colliding: Vec<Tag> = (0..10_000u64)
        .map(tag)
        .filter(|&t| t != reference && cache.has_collision(reference, ATT, t, ATT))
        .take(4)
        .collect();
    assert_eq!(colliding.len(), 4, "search space large enough");

    cache.read(reference, ATT);
    for &t in &colliding {
        cache.read(t, ATT);
    }
    assert!(
        !cache.read(reference, ATT),
        "reference was evicted by its keyed congruence class"
    );
}

/// CEASER-S: a partition count that does not divide the ways silently
/// degrades to one partition.
#[test]
fn ceaser_s_partition_fallback() {
    let cache = CeaserSCache::new(16, 6, 4, rng());
    assert_eq!(cache.partitions(), 1);

    let cache = CeaserSCache::new(16, 8, 2, rng());
    assert_eq!(cache.partitions(), 2);
}

/// CEASER-S honours evict-then-miss and keeps at most one copy per tag.
#[test]
fn ceaser_s_basic_invariants() {
    let mut cache = Cache::new(CacheModelKind::CeaserS(CeaserSCache::new(8, 4, 2, rng())));
    for v in 0..64 {
        cache.read(tag(v), ATT);
    }
    for v in 0..64 {
        if cache.evict(tag(v), ATT) {
            assert!(!cache.evict(tag(v), ATT), "duplicate copy of tag {v}");
        }
    }
    cache.read(tag(7), ATT);
    cache.evict(tag(7), ATT);
    assert!(!cache.read(tag(7), ATT), "evicted tag must miss");
}

/// CEASER-S collisions are partition-wise index matches; a tag always
/// collides with itself.
#[test]
fn ceaser_s_self_collision() {
    let cache = CeaserSCache::new(8, 4, 2, rng());
    assert!(cache.has_collision(tag(42), ATT, tag(42), ATT));
}
