//! Scatter, phantom, and NewCache tests.

use cachefx_core::cache::{
    Cache, CacheModelKind, NewCache, PhantomCache, ReplacementPolicy, ScatterCache,
};
use cachefx_core::common::CacheContext;

use crate::common::{rng, tag};

const ATT: CacheContext = CacheContext::ATTACKER;
const VIC: CacheContext = CacheContext::VICTIM;

fn scatter(nsets: usize, nways: usize) -> Cache {
    Cache::new(CacheModelKind::Scatter(ScatterCache::new(
        nsets,
        nways,
        rng(),
    )))
}

fn phantom(nsets: usize, nways: usize, salts: usize) -> Cache {
    let mut rng = rng();
    Cache::new(CacheModelKind::Phantom(PhantomCache::new(
        ReplacementPolicy::Lru,
        nsets,
        nways,
        salts,
        &mut rng,
    )))
}

fn newcache(nbits: u32, kbits: u32) -> Cache {
    Cache::new(CacheModelKind::New(NewCache::new(nbits, kbits, rng())))
}

// ──────────────────────────────────────────────────────────
// Scatter
// ──────────────────────────────────────────────────────────

/// Reads are stable (a just-inserted line hits) and evict-then-miss holds.
#[test]
fn scatter_read_then_evict() {
    let mut cache = scatter(8, 4);
    assert!(!cache.read(tag(100), ATT));
    assert!(cache.read(tag(100), ATT), "just-inserted line is resident");
    assert!(cache.evict(tag(100), ATT));
    assert!(!cache.read(tag(100), ATT));
}

/// At most one copy per (tag, context).
#[test]
fn scatter_at_most_one_copy() {
    let mut cache = scatter(8, 4);
    for round in 0..3 {
        for v in 0..48 {
            cache.read(tag(v + round), ATT);
        }
    }
    for v in 0..48 {
        if cache.evict(tag(v), ATT) {
            assert!(!cache.evict(tag(v), ATT), "duplicate copy of tag {v}");
        }
    }
}

/// The context is part of the index tweak: for some tag, the attacker's
/// cached copy is invisible to the victim because every way indexes
/// elsewhere under the victim's tweak.
#[test]
fn scatter_context_separates_lookups() {
    let separated = (0..64u64).any(|v| {
        let mut cache = scatter(8, 4);
        cache.read(tag(v), ATT);
        !cache.read(tag(v), VIC)
    });
    assert!(separated, "some tag maps to disjoint slots per domain");
}

// ──────────────────────────────────────────────────────────
// Phantom
// ──────────────────────────────────────────────────────────

/// A line lands in one of its candidate sets and is found again there.
#[test]
fn phantom_lookup_searches_all_candidates() {
    let mut cache = phantom(16, 4, 2);
    assert!(!cache.read(tag(77), ATT));
    for _ in 0..8 {
        assert!(cache.read(tag(77), ATT), "resident line found via salts");
    }
    assert!(cache.evict(tag(77), ATT));
    assert!(!cache.read(tag(77), ATT));
}

/// Collision is candidate-set intersection; identical tags intersect.
#[test]
fn phantom_collision_is_candidate_intersection() {
    let cache = phantom(16, 4, 2);
    assert!(cache.has_collision(tag(3), ATT, tag(3), ATT));

    let reference = tag(3);
    let any_disjoint = (0..256u64).any(|v| !cache.has_collision(reference, ATT, tag(v), ATT));
    assert!(any_disjoint, "with 2 of 16 candidate sets most tags miss");
}

/// Eviction-set size counts all candidate sets.
#[test]
fn phantom_eviction_set_size_scales_with_salts() {
    let cache = phantom(16, 4, 3);
    assert_eq!(cache.eviction_set_size(), 12);
    assert_eq!(cache.ghm_group_size(), 4);
}

// ──────────────────────────────────────────────────────────
// NewCache
// ──────────────────────────────────────────────────────────

/// Lookup is by (context, lnreg): a resident line hits, an lnreg clash
/// with a different tag replaces in place.
#[test]
fn newcache_lnreg_replacement() {
    let mut cache = newcache(4, 2);
    // 16 physical lines, ldm space of 64 lnregs.
    assert!(!cache.read(tag(5), ATT));
    assert!(cache.read(tag(5), ATT));

    // Same lnreg (5 + 64), different upper tag: replaced in place.
    let mut responses = Vec::new();
    assert!(!cache.read_with(tag(5 + 64), ATT, &mut responses));
    let last = responses.last().expect("response");
    assert!(last.eviction);
    assert_eq!(last.evicted_tag, tag(5));
    assert!(!cache.read(tag(5), ATT), "displaced by the lnreg clash");
}

/// Mappings are per-context.
#[test]
fn newcache_contexts_are_disjoint() {
    let mut cache = newcache(4, 2);
    cache.read(tag(9), ATT);
    assert!(!cache.read(tag(9), VIC), "no mapping for the victim yet");
}

/// Evict-then-miss.
#[test]
fn newcache_evict_then_miss() {
    let mut cache = newcache(4, 2);
    cache.read(tag(21), ATT);
    assert!(cache.evict(tag(21), ATT));
    assert!(!cache.read(tag(21), ATT));
}
