//! Set-associative cache and its per-line-locking variant.
//!
//! A set-associative cache is an array of independent fully-associative
//! sets indexed by `tag mod nsets`. The [`SetArray`] helper owns that array
//! and is shared with the encrypted-index variants, which only change how
//! the set index is derived from the tag.

use crate::cache::assoc::{effective_policy, AssocCache};
use crate::cache::{CacheModel, CacheResponse, ReplacementPolicy};
use crate::common::{CacheContext, Rng, Tag};

/// An indexed array of fully-associative sets.
#[derive(Debug)]
pub(crate) struct SetArray {
    sets: Vec<AssocCache>,
    nsets: usize,
    nways: usize,
    algorithm: ReplacementPolicy,
}

impl SetArray {
    pub(crate) fn new(
        algorithm: ReplacementPolicy,
        nsets: usize,
        nways: usize,
        locking: bool,
        rng: &mut Rng,
    ) -> SetArray {
        assert!(nsets > 0, "set-associative cache needs at least one set");
        let algorithm = effective_policy(algorithm, nways);
        let sets = (0..nsets)
            .map(|_| {
                if locking {
                    AssocCache::with_locking(algorithm, nways, rng.fork())
                } else {
                    AssocCache::new(algorithm, nways, true, rng.fork())
                }
            })
            .collect();
        SetArray {
            sets,
            nsets,
            nways,
            algorithm,
        }
    }

    pub(crate) fn nsets(&self) -> usize {
        self.nsets
    }

    pub(crate) fn nways(&self) -> usize {
        self.nways
    }

    pub(crate) fn algorithm(&self) -> ReplacementPolicy {
        self.algorithm
    }

    pub(crate) fn set(&self, index: usize) -> &AssocCache {
        &self.sets[index]
    }

    pub(crate) fn set_mut(&mut self, index: usize) -> &mut AssocCache {
        &mut self.sets[index]
    }

    /// Default modulo index.
    pub(crate) fn index_of(&self, tag: Tag) -> usize {
        (tag.val() % self.nsets as u64) as usize
    }

    /// Propagates the invalid-first mode to every set.
    pub(crate) fn set_invalid_first(&mut self, invalid_first: bool) {
        for set in &mut self.sets {
            set.set_invalid_first(invalid_first);
        }
    }
}

/// Plain set-associative cache, `tag mod nsets` indexing.
#[derive(Debug)]
pub struct SetAssocCache {
    array: SetArray,
}

impl SetAssocCache {
    /// Builds `nsets` sets of `nways` ways each.
    pub fn new(algorithm: ReplacementPolicy, nsets: usize, nways: usize, rng: &mut Rng) -> Self {
        SetAssocCache {
            array: SetArray::new(algorithm, nsets, nways, false, rng),
        }
    }

    /// Sets whether unset ways are filled before the policy runs.
    pub fn set_invalid_first(&mut self, invalid_first: bool) {
        self.array.set_invalid_first(invalid_first);
    }
}

impl CacheModel for SetAssocCache {
    fn cache_type(&self) -> &'static str {
        "set-associative"
    }

    fn lines(&self) -> usize {
        self.array.nsets() * self.array.nways()
    }

    fn sets(&self) -> usize {
        self.array.nsets()
    }

    fn ways(&self) -> usize {
        self.array.nways()
    }

    fn eviction_set_size(&self) -> usize {
        self.array.nways()
    }

    fn ghm_group_size(&self) -> usize {
        self.array.nways()
    }

    fn algorithm(&self) -> ReplacementPolicy {
        self.array.algorithm()
    }

    fn read_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let index = self.array.index_of(tag);
        self.array.set_mut(index).read_line(tag, ctx, responses)
    }

    fn evict_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let index = self.array.index_of(tag);
        self.array.set_mut(index).evict_line(tag, ctx, responses)
    }

    fn has_collision(&self, a: Tag, ctx_a: CacheContext, b: Tag, ctx_b: CacheContext) -> bool {
        let ia = self.array.index_of(a);
        let ib = self.array.index_of(b);
        ia == ib && self.array.set(ia).has_collision(a, ctx_a, b, ctx_b)
    }
}

/// Set-associative cache with per-line context locking.
///
/// Every access locks its line to the accessing domain; a replacement
/// victim owned by another domain is left in place and the incoming line is
/// dropped, so cross-domain evictions cannot happen through replacement.
#[derive(Debug)]
pub struct PlCache {
    array: SetArray,
}

impl PlCache {
    /// Builds `nsets` locked sets of `nways` ways each.
    pub fn new(algorithm: ReplacementPolicy, nsets: usize, nways: usize, rng: &mut Rng) -> Self {
        PlCache {
            array: SetArray::new(algorithm, nsets, nways, true, rng),
        }
    }

    /// Sets whether unset ways are filled before the policy runs.
    pub fn set_invalid_first(&mut self, invalid_first: bool) {
        self.array.set_invalid_first(invalid_first);
    }
}

impl CacheModel for PlCache {
    fn cache_type(&self) -> &'static str {
        "pl-cache"
    }

    fn lines(&self) -> usize {
        self.array.nsets() * self.array.nways()
    }

    fn sets(&self) -> usize {
        self.array.nsets()
    }

    fn ways(&self) -> usize {
        self.array.nways()
    }

    fn eviction_set_size(&self) -> usize {
        self.array.nways()
    }

    fn ghm_group_size(&self) -> usize {
        self.array.nways()
    }

    fn algorithm(&self) -> ReplacementPolicy {
        self.array.algorithm()
    }

    fn read_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let index = self.array.index_of(tag);
        self.array.set_mut(index).read_line(tag, ctx, responses)
    }

    fn evict_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let index = self.array.index_of(tag);
        self.array.set_mut(index).evict_line(tag, ctx, responses)
    }

    fn has_collision(&self, a: Tag, ctx_a: CacheContext, b: Tag, ctx_b: CacheContext) -> bool {
        let ia = self.array.index_of(a);
        let ib = self.array.index_of(b);
        ia == ib && self.array.set(ia).has_collision(a, ctx_a, b, ctx_b)
    }
}
