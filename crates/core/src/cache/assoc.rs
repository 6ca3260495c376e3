//! Fully-associative cache with the replacement-policy catalogue.
//!
//! One structure carries the state of every supported policy (timestamps,
//! PLRU bits, RRIP counters); the configured algorithm decides which of it
//! steers victim selection. Keeping the state unified means a set-duelling
//! wrapper can compare policies over identical fill sequences.
//!
//! The same structure doubles as the per-line-locking building block: with
//! locking enabled, a victim whose resident context differs from the
//! requester is not replaced — the incoming line is dropped and the resident
//! one promoted.

use crate::cache::{CacheModel, CacheResponse, ReplacementPolicy};
use crate::common::{CacheContext, Rng, Tag};

/// Timestamp given to cold-inserted (LIP/BIP) lines; always the oldest.
const COLD_TIMESTAMP: u32 = u32::MAX - 100;

/// RRIP counter width.
const RRIP_BITS: u32 = 5;

/// Probability of MRU insertion under BIP.
const BIP_THROTTLE: f64 = 0.01;

/// Probability of a long (rather than distant) insertion under BRRIP.
const BRRIP_LONG_CHANCE: f64 = 0.01;

#[derive(Clone, Copy, Debug)]
struct Entry {
    tag: Tag,
    access_time: u32,
    context: CacheContext,
}

/// Fully-associative cache.
#[derive(Debug)]
pub struct AssocCache {
    entries: Vec<Entry>,
    size: usize,
    clock: u32,
    algorithm: ReplacementPolicy,
    invalid_first: bool,
    lock_by_context: bool,
    tree_bits: Vec<bool>,
    tree_levels: u32,
    mru_bits: Vec<bool>,
    mru_bits_set: usize,
    rrpv: Vec<u8>,
    rng: Rng,
}

impl AssocCache {
    /// Builds a cache of `size` ways under `algorithm`.
    ///
    /// Tree-PLRU requires a power-of-two size and silently degrades to
    /// bit-PLRU otherwise; the caller that loaded the configuration is
    /// responsible for logging the fallback once.
    pub fn new(algorithm: ReplacementPolicy, size: usize, invalid_first: bool, rng: Rng) -> Self {
        Self::build(algorithm, size, invalid_first, false, rng)
    }

    /// Builds the per-line-locking flavour.
    pub fn with_locking(algorithm: ReplacementPolicy, size: usize, rng: Rng) -> Self {
        Self::build(algorithm, size, true, true, rng)
    }

    fn build(
        algorithm: ReplacementPolicy,
        size: usize,
        invalid_first: bool,
        lock_by_context: bool,
        rng: Rng,
    ) -> Self {
        assert!(size > 0, "associative cache needs at least one way");
        let algorithm = effective_policy(algorithm, size);
        let tree_levels = if size.is_power_of_two() {
            size.trailing_zeros()
        } else {
            0
        };
        let mut cache = AssocCache {
            entries: Vec::with_capacity(size),
            size,
            clock: 0,
            algorithm,
            invalid_first,
            lock_by_context,
            tree_bits: vec![false; size],
            tree_levels,
            mru_bits: vec![false; size],
            mru_bits_set: 0,
            rrpv: vec![0; size],
            rng,
        };
        for _ in 0..size {
            let access_time = cache.clock;
            cache.clock = cache.clock.wrapping_add(1);
            cache.entries.push(Entry {
                tag: Tag::INIT,
                access_time,
                context: CacheContext::ATTACKER,
            });
        }
        cache
    }

    /// Number of ways.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Overrides whether unset ways are filled before the policy runs.
    pub fn set_invalid_first(&mut self, invalid_first: bool) {
        self.invalid_first = invalid_first;
    }

    /// Tag currently held by `way`.
    pub fn tag_at(&self, way: usize) -> Tag {
        self.entries[way].tag
    }

    /// Way currently holding `tag`, if any.
    pub fn position(&self, tag: Tag) -> Option<usize> {
        self.entries.iter().position(|e| e.tag == tag)
    }

    /// Touches `way`, updating every policy's metadata.
    fn touch(&mut self, way: usize, new_entry: bool) {
        // Timestamps: LIP inserts cold; BIP inserts cold except for a small
        // MRU throttle; everything else promotes to MRU.
        let cold = match self.algorithm {
            ReplacementPolicy::Lip => new_entry,
            ReplacementPolicy::Bip => new_entry && !self.rng.chance(BIP_THROTTLE),
            _ => false,
        };
        if cold {
            self.entries[way].access_time = COLD_TIMESTAMP;
        } else {
            self.entries[way].access_time = self.clock;
            self.clock = self.clock.wrapping_add(1);
        }

        // Bit-PLRU: set the way's MRU bit; when the last clear bit goes, the
        // whole vector resets to just this way.
        if !self.mru_bits[way] {
            self.mru_bits_set += 1;
            if self.mru_bits_set == self.size {
                self.mru_bits.fill(false);
                self.mru_bits_set = 1;
            }
            self.mru_bits[way] = true;
        }

        // Tree-PLRU: point every node on the path away from this way.
        let mut node = 0usize;
        let mut level_base = 1usize;
        for level in 0..self.tree_levels {
            let bit = (way >> (self.tree_levels - 1 - level)) & 1;
            self.tree_bits[level_base - 1 + node] = bit == 0;
            node = node * 2 + bit;
            level_base *= 2;
        }

        // RRIP: new lines predict a long or distant re-reference; hits age
        // toward near-immediate.
        if new_entry {
            let distant = (1u8 << RRIP_BITS) - 1;
            let long = distant - 1;
            if self.algorithm == ReplacementPolicy::Brrip && !self.rng.chance(BRRIP_LONG_CHANCE) {
                self.rrpv[way] = distant;
            } else {
                self.rrpv[way] = long;
            }
        } else {
            self.rrpv[way] = self.rrpv[way].saturating_sub(1);
        }
    }

    /// Picks the way to replace under the configured algorithm.
    fn select_victim(&mut self) -> usize {
        match self.algorithm {
            ReplacementPolicy::Lru | ReplacementPolicy::Lip | ReplacementPolicy::Bip => {
                let mut victim = 0;
                let mut oldest_age = 0u32;
                for (way, entry) in self.entries.iter().enumerate() {
                    if entry.access_time == COLD_TIMESTAMP {
                        return way;
                    }
                    let age = self.clock.wrapping_sub(entry.access_time);
                    if age > oldest_age {
                        oldest_age = age;
                        victim = way;
                    }
                }
                victim
            }
            ReplacementPolicy::BitPlru => {
                if self.size == 1 {
                    0
                } else {
                    self.mru_bits.iter().position(|&b| !b).unwrap_or(0)
                }
            }
            ReplacementPolicy::TreePlru => {
                let mut node = 0usize;
                let mut level_base = 1usize;
                for _ in 0..self.tree_levels {
                    let bit = usize::from(self.tree_bits[level_base - 1 + node]);
                    node = node * 2 + bit;
                    level_base *= 2;
                }
                node
            }
            ReplacementPolicy::Srrip | ReplacementPolicy::Brrip => {
                let distant = (1u8 << RRIP_BITS) - 1;
                loop {
                    if let Some(way) = self.rrpv.iter().position(|&v| v == distant) {
                        return way;
                    }
                    for v in &mut self.rrpv {
                        *v = (*v + 1).min(distant);
                    }
                }
            }
            // DIP/DRRIP never reach a bare associative cache; the duelling
            // wrapper decomposes them into their component policies.
            ReplacementPolicy::Random | ReplacementPolicy::Dip | ReplacementPolicy::Drrip => {
                self.rng.index(self.size)
            }
        }
    }
}

/// Applies the tree-PLRU power-of-two restriction.
pub(crate) fn effective_policy(algorithm: ReplacementPolicy, ways: usize) -> ReplacementPolicy {
    if algorithm == ReplacementPolicy::TreePlru && !ways.is_power_of_two() {
        ReplacementPolicy::BitPlru
    } else {
        algorithm
    }
}

impl CacheModel for AssocCache {
    fn cache_type(&self) -> &'static str {
        if self.lock_by_context {
            "associative-pl"
        } else {
            "associative"
        }
    }

    fn lines(&self) -> usize {
        self.size
    }

    fn sets(&self) -> usize {
        1
    }

    fn ways(&self) -> usize {
        self.size
    }

    fn eviction_set_size(&self) -> usize {
        self.size
    }

    fn ghm_group_size(&self) -> usize {
        1
    }

    fn algorithm(&self) -> ReplacementPolicy {
        self.algorithm
    }

    fn read_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let mut free = None;
        for way in 0..self.size {
            if self.entries[way].tag == tag {
                self.touch(way, false);
                if self.lock_by_context {
                    self.entries[way].context = ctx;
                }
                responses.push(CacheResponse::hit());
                return true;
            }
            if self.entries[way].tag == Tag::NONE {
                free = Some(way);
            }
        }

        if let Some(way) = free {
            if self.invalid_first {
                self.entries[way].tag = tag;
                self.entries[way].context = ctx;
                responses.push(CacheResponse::miss());
                self.touch(way, true);
                return false;
            }
        }

        let victim = self.select_victim();
        if self.lock_by_context && self.entries[victim].context != ctx {
            // Locked line owned by another domain: drop the incoming line
            // and promote the resident one.
            responses.push(CacheResponse::miss());
            self.touch(victim, false);
            return false;
        }

        responses.push(CacheResponse::miss_evicting(self.entries[victim].tag));
        self.entries[victim].tag = tag;
        self.entries[victim].context = ctx;
        self.touch(victim, true);
        false
    }

    fn evict_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        for entry in &mut self.entries {
            if entry.tag == tag && (!self.lock_by_context || entry.context == ctx) {
                entry.tag = Tag::NONE;
                responses.push(CacheResponse::invalidated(tag));
                return true;
            }
        }
        responses.push(CacheResponse::miss());
        false
    }

    fn has_collision(&self, _a: Tag, _ctx_a: CacheContext, _b: Tag, _ctx_b: CacheContext) -> bool {
        // Every pair of lines competes for the same ways.
        true
    }
}
