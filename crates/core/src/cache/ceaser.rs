//! Encrypted-index caches: CEASER and CEASER-S.
//!
//! CEASER keeps the set-associative structure but derives the set index
//! from a keyed permutation of the tag, so an attacker cannot compute
//! collisions from addresses alone. CEASER-S goes further and skews: the
//! ways split into partitions, each indexing through a differently-tweaked
//! permutation, and two addresses collide only if their indices match in at
//! least one partition.

use crate::cache::set_assoc::SetArray;
use crate::cache::{CacheModel, CacheResponse, ReplacementPolicy};
use crate::common::{CacheContext, Rng, Tag};
use crate::crypto::Speck64;

/// Fixed developer key for the CEASER index permutation.
const CEASER_KEY: [u32; 4] = [0xDEAD_BEEF, 0x000C_AFFE, 0x4711_1174, 0x0815_5180];

/// Fixed developer key for the CEASER-S index permutations.
const CEASER_S_KEY: [u32; 4] = [0x06FA_DE60, 0xCAB4_BEEF, 0x0486_6840, 0x8086_6808];

/// CEASER: set-associative with one keyed index permutation.
#[derive(Debug)]
pub struct CeaserCache {
    array: SetArray,
    cipher: Speck64,
}

impl CeaserCache {
    /// Builds `nsets` sets of `nways` ways behind the keyed index.
    pub fn new(algorithm: ReplacementPolicy, nsets: usize, nways: usize, rng: &mut Rng) -> Self {
        CeaserCache {
            array: SetArray::new(algorithm, nsets, nways, false, rng),
            cipher: Speck64::new(CEASER_KEY),
        }
    }

    fn index_of(&self, tag: Tag) -> usize {
        (self.cipher.encrypt(tag.val()) % self.array.nsets() as u64) as usize
    }

    /// Sets whether unset ways are filled before the policy runs.
    pub fn set_invalid_first(&mut self, invalid_first: bool) {
        self.array.set_invalid_first(invalid_first);
    }
}

impl CacheModel for CeaserCache {
    fn cache_type(&self) -> &'static str {
        "ceaser"
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
        let index = self.index_of(tag);
        self.array.set_mut(index).read_line(tag, ctx, responses)
    }

    fn evict_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let index = self.index_of(tag);
        self.array.set_mut(index).evict_line(tag, ctx, responses)
    }

    fn has_collision(&self, a: Tag, ctx_a: CacheContext, b: Tag, ctx_b: CacheContext) -> bool {
        let ia = self.index_of(a);
        let ib = self.index_of(b);
        ia == ib && self.array.set(ia).has_collision(a, ctx_a, b, ctx_b)
    }
}

/// CEASER-S: skewed encrypted-index cache.
///
/// Entries are organised `ways x sets`; partition `p` (a contiguous block
/// of ways) indexes through the permutation tweaked by `p`. Replacement
/// picks a uniformly random way of the virtual set.
#[derive(Debug)]
pub struct CeaserSCache {
    tags: Vec<Tag>,
    nsets: usize,
    nways: usize,
    partitions: usize,
    invalid_first: bool,
    cipher: Speck64,
    rng: Rng,
}

impl CeaserSCache {
    /// Builds the skewed cache. A partition count that does not divide the
    /// ways degrades to a single partition; the configuration loader is
    /// responsible for logging that fallback.
    pub fn new(nsets: usize, nways: usize, partitions: usize, rng: Rng) -> Self {
        assert!(nsets > 0 && nways > 0, "ceaser-s needs sets and ways");
        let partitions = if partitions == 0 || nways % partitions != 0 {
            1
        } else {
            partitions
        };
        CeaserSCache {
            tags: vec![Tag::INIT; nways * nsets],
            nsets,
            nways,
            partitions,
            invalid_first: false,
            cipher: Speck64::new(CEASER_S_KEY),
            rng,
        }
    }

    /// Number of partitions actually in effect.
    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Enables filling unset ways before random replacement.
    pub fn set_invalid_first(&mut self, invalid_first: bool) {
        self.invalid_first = invalid_first;
    }

    fn index_in_partition(&self, tag: Tag, partition: usize) -> usize {
        let tweak = (partition as u64 & 0xFF).wrapping_mul(0x0101_0101_0101_0101);
        (self.cipher.encrypt_tweaked(tag.val(), tweak) % self.nsets as u64) as usize
    }

    /// Entry slot for `way` within that way's partition-tweaked set index.
    fn slot_of_way(&self, tag: Tag, way: usize) -> usize {
        let partition_size = self.nways / self.partitions;
        let partition = way / partition_size;
        let index = self.index_in_partition(tag, partition);
        way * self.nsets + index
    }

    fn set_indices(&self, tag: Tag) -> Vec<usize> {
        (0..self.nways).map(|w| self.slot_of_way(tag, w)).collect()
    }
}

impl CacheModel for CeaserSCache {
    fn cache_type(&self) -> &'static str {
        "ceaser-s"
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
        vec![self.partitions as u32, u32::from(self.invalid_first)]
    }

    fn read_line(
        &mut self,
        tag: Tag,
        _ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let mut free = None;
        for way in 0..self.nways {
            let slot = self.slot_of_way(tag, way);
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
        let slot = self.slot_of_way(tag, way);
        responses.push(CacheResponse::miss_evicting(self.tags[slot]));
        self.tags[slot] = tag;
        false
    }

    fn evict_line(
        &mut self,
        tag: Tag,
        _ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        for way in 0..self.nways {
            let slot = self.slot_of_way(tag, way);
            if self.tags[slot] == tag {
                self.tags[slot] = Tag::NONE;
                responses.push(CacheResponse::invalidated(tag));
                return true;
            }
        }
        responses.push(CacheResponse::miss());
        false
    }

    fn has_collision(&self, a: Tag, _ctx_a: CacheContext, b: Tag, _ctx_b: CacheContext) -> bool {
        let ia = self.set_indices(a);
        let ib = self.set_indices(b);
        ia.iter().zip(&ib).any(|(x, y)| x == y)
    }
}
