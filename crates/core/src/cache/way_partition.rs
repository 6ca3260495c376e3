//! Way-partitioned cache: one set-associative partition per domain.
//!
//! Requests route by context; the attacker's partition holds the ordinary
//! ways and the victim's the secure ways. Nothing ever crosses the
//! boundary, so the cross-domain collision oracle is constantly false.

use crate::cache::set_assoc::SetAssocCache;
use crate::cache::{CacheModel, CacheResponse, ReplacementPolicy};
use crate::common::{CacheContext, Rng, Tag};

/// Way-partitioned cache.
#[derive(Debug)]
pub struct WayPartitionCache {
    open_ways: SetAssocCache,
    secure_ways: SetAssocCache,
}

impl WayPartitionCache {
    /// Builds `nsets` sets of `nways` total ways, `secure` of which belong
    /// to the victim's domain.
    pub fn new(
        algorithm: ReplacementPolicy,
        nsets: usize,
        nways: usize,
        secure: usize,
        rng: &mut Rng,
    ) -> Self {
        assert!(
            secure > 0 && secure < nways,
            "way partition needs ways on both sides"
        );
        WayPartitionCache {
            open_ways: SetAssocCache::new(algorithm, nsets, nways - secure, rng),
            secure_ways: SetAssocCache::new(algorithm, nsets, secure, rng),
        }
    }

    /// Ways reserved for the victim's domain.
    pub fn secure_ways(&self) -> usize {
        self.secure_ways.ways()
    }

    /// Sets whether unset ways are filled before the policy runs, in both
    /// partitions.
    pub fn set_invalid_first(&mut self, invalid_first: bool) {
        self.open_ways.set_invalid_first(invalid_first);
        self.secure_ways.set_invalid_first(invalid_first);
    }

    fn domain_mut(&mut self, ctx: CacheContext) -> &mut SetAssocCache {
        if ctx == CacheContext::VICTIM {
            &mut self.secure_ways
        } else {
            &mut self.open_ways
        }
    }
}

impl CacheModel for WayPartitionCache {
    fn cache_type(&self) -> &'static str {
        "way-partition"
    }

    fn lines(&self) -> usize {
        self.sets() * self.ways()
    }

    fn sets(&self) -> usize {
        self.open_ways.sets()
    }

    fn ways(&self) -> usize {
        self.open_ways.ways() + self.secure_ways.ways()
    }

    fn eviction_set_size(&self) -> usize {
        self.open_ways.ways()
    }

    fn ghm_group_size(&self) -> usize {
        self.open_ways.ways()
    }

    fn algorithm(&self) -> ReplacementPolicy {
        self.open_ways.algorithm()
    }

    fn params(&self) -> Vec<u32> {
        vec![self.secure_ways.ways() as u32]
    }

    fn read_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        self.domain_mut(ctx).read_line(tag, ctx, responses)
    }

    fn write_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        self.domain_mut(ctx).write_line(tag, ctx, responses)
    }

    fn exec_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        self.domain_mut(ctx).exec_line(tag, ctx, responses)
    }

    fn evict_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        self.domain_mut(ctx).evict_line(tag, ctx, responses)
    }

    fn has_collision(&self, _a: Tag, _ctx_a: CacheContext, _b: Tag, _ctx_b: CacheContext) -> bool {
        // Domains never share ways.
        false
    }
}
