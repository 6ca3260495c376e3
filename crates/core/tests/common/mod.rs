//! Shared test fixtures.
//!
//! Tests pin their PRNG seeds, so every run is reproducible; the fixtures
//! here only remove the construction boilerplate.

use cachefx_core::cache::{
    AssocCache, Cache, CacheHierarchy, CacheModelKind, ReplacementPolicy, SetAssocCache,
};
use cachefx_core::common::{Rng, Tag};
use cachefx_core::mmu::Mmu;

/// The fixed seed used across the suite.
pub const TEST_SEED: u64 = 0x5EED_0001;

/// A seeded generator.
pub fn rng() -> Rng {
    Rng::new(TEST_SEED)
}

/// Fully-associative cache under the given policy.
pub fn assoc(policy: ReplacementPolicy, size: usize) -> Cache {
    Cache::new(CacheModelKind::Assoc(AssocCache::new(
        policy,
        size,
        true,
        rng(),
    )))
}

/// Set-associative LRU cache.
pub fn set_assoc_lru(nsets: usize, nways: usize) -> Cache {
    let mut rng = rng();
    Cache::new(CacheModelKind::SetAssoc(SetAssocCache::new(
        ReplacementPolicy::Lru,
        nsets,
        nways,
        &mut rng,
    )))
}

/// Two-level hierarchy of fully-associative LRU caches.
pub fn two_level_assoc(l1_size: usize, l2_size: usize) -> Cache {
    let levels = vec![
        assoc(ReplacementPolicy::Lru, l1_size),
        assoc(ReplacementPolicy::Lru, l2_size),
    ];
    Cache::new(CacheModelKind::Hierarchy(CacheHierarchy::new(levels)))
}

/// MMU over the given cache, fixed base.
pub fn mmu(cache: Cache) -> Mmu {
    Mmu::new(cache)
}

/// Shorthand tag constructor.
pub fn tag(value: u64) -> Tag {
    Tag(value)
}
