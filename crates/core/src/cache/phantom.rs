//! Phantom cache: one of `r` salted candidate sets per address.
//!
//! Each address hashes to `r` candidate sets through the keyed permutation
//! under `r` random salts. A lookup searches all candidates; on a miss the
//! line lands in a uniformly chosen candidate set. Collision requires the
//! candidate lists to intersect.

use crate::cache::set_assoc::SetArray;
use crate::cache::{CacheModel, CacheResponse, ReplacementPolicy};
use crate::common::{CacheContext, Rng, Tag};
use crate::crypto::Speck64;

/// Fixed developer key for the phantom index permutation.
const PHANTOM_KEY: [u32; 4] = [0xDEAD_BEEF, 0x000C_AFFE, 0x10FA_DE01, 0xFE01_23ED];

/// Phantom cache.
#[derive(Debug)]
pub struct PhantomCache {
    array: SetArray,
    salts: Vec<u64>,
    cipher: Speck64,
    rng: Rng,
}

impl PhantomCache {
    /// Builds `nsets` sets of `nways` ways with `random_sets` salts.
    pub fn new(
        algorithm: ReplacementPolicy,
        nsets: usize,
        nways: usize,
        random_sets: usize,
        rng: &mut Rng,
    ) -> Self {
        assert!(random_sets > 0, "phantom cache needs at least one salt");
        let array = SetArray::new(algorithm, nsets, nways, false, rng);
        let salts = (0..random_sets).map(|_| rng.next_u64()).collect();
        PhantomCache {
            array,
            salts,
            cipher: Speck64::new(PHANTOM_KEY),
            rng: rng.fork(),
        }
    }

    /// Number of candidate sets per address.
    pub fn random_sets(&self) -> usize {
        self.salts.len()
    }

    /// Sets whether unset ways are filled before the policy runs.
    pub fn set_invalid_first(&mut self, invalid_first: bool) {
        self.array.set_invalid_first(invalid_first);
    }

    fn index_with_salt(&self, tag: Tag, salt_index: usize) -> usize {
        let salt = self.salts[salt_index];
        (self.cipher.encrypt_tweaked(tag.val(), salt) % self.array.nsets() as u64) as usize
    }

    /// The set holding `tag` if resident, otherwise a random candidate.
    fn pick_set(&mut self, tag: Tag) -> usize {
        for salt_index in 0..self.salts.len() {
            let index = self.index_with_salt(tag, salt_index);
            if self.array.set(index).position(tag).is_some() {
                return index;
            }
        }
        let salt_index = self.rng.index(self.salts.len());
        self.index_with_salt(tag, salt_index)
    }
}

impl CacheModel for PhantomCache {
    fn cache_type(&self) -> &'static str {
        "phantom"
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
        self.array.nways() * self.salts.len()
    }

    fn ghm_group_size(&self) -> usize {
        self.array.nways()
    }

    fn algorithm(&self) -> ReplacementPolicy {
        self.array.algorithm()
    }

    fn params(&self) -> Vec<u32> {
        vec![self.salts.len() as u32]
    }

    fn read_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let index = self.pick_set(tag);
        self.array.set_mut(index).read_line(tag, ctx, responses)
    }

    fn evict_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        for salt_index in 0..self.salts.len() {
            let index = self.index_with_salt(tag, salt_index);
            if self.array.set(index).position(tag).is_some() {
                return self.array.set_mut(index).evict_line(tag, ctx, responses);
            }
        }
        responses.push(CacheResponse::miss());
        false
    }

    fn has_collision(&self, a: Tag, _ctx_a: CacheContext, b: Tag, _ctx_b: CacheContext) -> bool {
        let candidates_a: Vec<usize> = (0..self.salts.len())
            .map(|s| self.index_with_salt(a, s))
            .collect();
        (0..self.salts.len()).any(|s| candidates_a.contains(&self.index_with_salt(b, s)))
    }
}
