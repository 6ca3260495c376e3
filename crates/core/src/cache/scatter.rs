//! Scatter cache: every way has an independent keyed index.
//!
//! The tweak folds in both the way number and the accessing security
//! domain, so even the same address maps to unrelated sets for attacker and
//! victim. Lookup walks all ways at their individual indices; replacement
//! picks a uniformly random way.

use crate::cache::{CacheModel, CacheResponse};
use crate::common::{CacheContext, Rng, Tag};
use crate::crypto::Speck64;

/// Fixed developer key for the scatter index permutations.
const SCATTER_KEY: [u32; 4] = [0x06FA_DE60, 0xCAB4_BEEF, 0xCAFE_EFAC, 0x4711_0815];

/// Scatter cache.
#[derive(Debug)]
pub struct ScatterCache {
    tags: Vec<Tag>,
    nsets: usize,
    nways: usize,
    invalid_first: bool,
    cipher: Speck64,
    rng: Rng,
}

impl ScatterCache {
    /// Builds `nways` ways of `nsets` entries each.
    pub fn new(nsets: usize, nways: usize, rng: Rng) -> Self {
        assert!(nsets > 0 && nways > 0, "scatter cache needs sets and ways");
        ScatterCache {
            tags: vec![Tag::INIT; nways * nsets],
            nsets,
            nways,
            invalid_first: false,
            cipher: Speck64::new(SCATTER_KEY),
            rng,
        }
    }

    /// Enables filling unset ways before random replacement.
    pub fn set_invalid_first(&mut self, invalid_first: bool) {
        self.invalid_first = invalid_first;
    }

    fn slot_of_way(&self, tag: Tag, way: usize, ctx: CacheContext) -> usize {
        let sdid = u64::from(ctx.core_id()) & 0xFF;
        let tweak = ((way as u64 & 0xFF) | (sdid << 8)).wrapping_mul(0x0001_0001_0001_0001);
        let index = (self.cipher.encrypt_tweaked(tag.val(), tweak) % self.nsets as u64) as usize;
        way * self.nsets + index
    }
}

impl CacheModel for ScatterCache {
    fn cache_type(&self) -> &'static str {
        "scatter-cache"
    }

    fn lines(&self) -> usize {
        self.nsets * self.nways
    }

    fn sets(&self) -> usize {
        self.nsets
    }

    fn ways(&self) -> usize {
        self.nways
    }

    fn eviction_set_size(&self) -> usize {
        self.nways
    }

    fn ghm_group_size(&self) -> usize {
        self.nways
    }

    fn params(&self) -> Vec<u32> {
        vec![u32::from(self.invalid_first)]
    }

    fn read_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let mut free = None;
        for way in 0..self.nways {
            let slot = self.slot_of_way(tag, way, ctx);
            if self.tags[slot] == tag {
                responses.push(CacheResponse::hit());
                return true;
            }
            if self.tags[slot] == Tag::NONE {
                free = Some(slot);
            }
        }

        if self.invalid_first {
            if let Some(slot) = free {
                self.tags[slot] = tag;
                responses.push(CacheResponse::miss());
                return false;
            }
        }

        let way = self.rng.index(self.nways);
        let slot = self.slot_of_way(tag, way, ctx);
        responses.push(CacheResponse::miss_evicting(self.tags[slot]));
        self.tags[slot] = tag;
        false
    }

    fn evict_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        for way in 0..self.nways {
            let slot = self.slot_of_way(tag, way, ctx);
            if self.tags[slot] == tag {
                self.tags[slot] = Tag::NONE;
                responses.push(CacheResponse::invalidated(tag));
                return true;
            }
        }
        responses.push(CacheResponse::miss());
        false
    }

    fn has_collision(&self, a: Tag, ctx_a: CacheContext, b: Tag, ctx_b: CacheContext) -> bool {
        (0..self.nways).any(|w| self.slot_of_way(a, w, ctx_a) == self.slot_of_way(b, w, ctx_b))
    }
}
