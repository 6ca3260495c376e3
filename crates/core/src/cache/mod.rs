//! Cache models.
//!
//! This module implements the catalogue of cache organisations the simulator
//! can score. It provides:
//! 1. **The capability contract:** [`CacheModel`], the uniform
//!    read/write/exec/evict/collision/geometry interface every variant
//!    implements, so profilers and the attack driver stay policy-agnostic.
//! 2. **The sum type:** [`Cache`] wraps one concrete model, records
//!    per-context [`CacheStatistics`] around every access, and dispatches to
//!    the variant.
//! 3. **The variants:** fully-associative (with the full replacement-policy
//!    catalogue), set-associative, CEASER and CEASER-S, scatter, phantom,
//!    NewCache, per-line locking, way-partitioning, set-duelling (DIP /
//!    DRRIP), and the multi-level hierarchy.

/// Fully-associative model and the replacement-policy catalogue.
pub mod assoc;

/// CEASER (encrypted-index) and CEASER-S (skewed) models.
pub mod ceaser;

/// DIP / DRRIP set-duelling wrapper.
pub mod dueling;

/// Multi-level cache hierarchy.
pub mod hierarchy;

/// NewCache (line-number-register indirection) model.
pub mod newcache;

/// Phantom (salted candidate sets) model.
pub mod phantom;

/// Scatter (per-way skew) model.
pub mod scatter;

/// Set-associative model and the per-line-locking variant.
pub mod set_assoc;

/// Per-context access statistics.
pub mod stats;

/// Way-partitioned (per-domain) model.
pub mod way_partition;

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::common::{CacheContext, Tag};

pub use assoc::AssocCache;
pub use ceaser::{CeaserCache, CeaserSCache};
pub use dueling::DuelingCache;
pub use hierarchy::CacheHierarchy;
pub use newcache::NewCache;
pub use phantom::PhantomCache;
pub use scatter::ScatterCache;
pub use set_assoc::{PlCache, SetAssocCache};
pub use stats::CacheStatistics;
pub use way_partition::WayPartitionCache;

/// Replacement algorithms selectable for the associative models.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplacementPolicy {
    /// Timestamped least-recently-used.
    #[default]
    Lru,
    /// Uniform random victim.
    Random,
    /// One MRU bit per way; all-ones resets to just the touched way.
    BitPlru,
    /// Balanced binary tree of direction bits (power-of-two ways only).
    TreePlru,
    /// Static re-reference interval prediction (M = 5).
    Srrip,
    /// Bimodal RRIP: mostly distant insertion, occasionally long.
    Brrip,
    /// LRU-insertion policy: new lines start coldest.
    Lip,
    /// Bimodal insertion: LIP with a small chance of MRU insertion.
    Bip,
    /// Set-duelling between LRU and BIP.
    Dip,
    /// Set-duelling between SRRIP and BRRIP.
    Drrip,
}

impl ReplacementPolicy {
    /// Wire/report name of the policy.
    pub fn name(self) -> &'static str {
        match self {
            ReplacementPolicy::Lru => "lru",
            ReplacementPolicy::Random => "random",
            ReplacementPolicy::BitPlru => "bit-plru",
            ReplacementPolicy::TreePlru => "tree-plru",
            ReplacementPolicy::Srrip => "srrip",
            ReplacementPolicy::Brrip => "brrip",
            ReplacementPolicy::Lip => "lip",
            ReplacementPolicy::Bip => "bip",
            ReplacementPolicy::Dip => "dip",
            ReplacementPolicy::Drrip => "drrip",
        }
    }
}

impl std::fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Level value carried by responses that never passed through a hierarchy.
pub const LEVEL_UNKNOWN: u8 = 0;

/// Outcome of consulting one cache level for one access.
///
/// A single access produces a sequence of responses, one per consulted
/// level; the last one is authoritative for hit/miss accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheResponse {
    /// Hierarchy level that answered (1-based; [`LEVEL_UNKNOWN`] outside a
    /// hierarchy).
    pub level: u8,
    /// Whether the consulted level held the line.
    pub hit: bool,
    /// Whether a resident line was displaced by this access.
    pub eviction: bool,
    /// The displaced tag; only meaningful when `eviction` is set.
    pub evicted_tag: Tag,
}

impl CacheResponse {
    /// A hit; nothing was displaced.
    pub fn hit() -> CacheResponse {
        CacheResponse {
            level: LEVEL_UNKNOWN,
            hit: true,
            eviction: false,
            evicted_tag: Tag::NONE,
        }
    }

    /// A miss that filled an empty way.
    pub fn miss() -> CacheResponse {
        CacheResponse {
            level: LEVEL_UNKNOWN,
            hit: false,
            eviction: false,
            evicted_tag: Tag::NONE,
        }
    }

    /// A miss that displaced `tag`. Sentinel tags degrade to a plain miss,
    /// so empty-way fills never masquerade as evictions.
    pub fn miss_evicting(tag: Tag) -> CacheResponse {
        if tag.is_sentinel() {
            CacheResponse::miss()
        } else {
            CacheResponse {
                level: LEVEL_UNKNOWN,
                hit: false,
                eviction: true,
                evicted_tag: tag,
            }
        }
    }

    /// An explicit invalidation that found (and removed) `tag`.
    pub fn invalidated(tag: Tag) -> CacheResponse {
        CacheResponse {
            level: LEVEL_UNKNOWN,
            hit: true,
            eviction: true,
            evicted_tag: tag,
        }
    }
}

/// The capability contract every cache variant implements.
///
/// `read_line` / `write_line` / `exec_line` return whether the access hit;
/// `evict_line` returns whether the tag was resident. All of them append
/// their [`CacheResponse`]s to the caller-provided buffer, which lets the
/// hierarchy splice per-level responses without allocating.
pub trait CacheModel {
    /// Short type string for configuration and reports.
    fn cache_type(&self) -> &'static str;

    /// Total number of lines the model can hold.
    fn lines(&self) -> usize;

    /// Number of sets (1 for fully-associative structures).
    fn sets(&self) -> usize;

    /// Number of ways per set.
    fn ways(&self) -> usize;

    /// Minimum number of attacker lines that can force the eviction of one
    /// victim line under ideal conditions.
    fn eviction_set_size(&self) -> usize;

    /// Granularity at which lines compete for the same replacement state.
    fn ghm_group_size(&self) -> usize;

    /// Replacement algorithm driving this model.
    fn algorithm(&self) -> ReplacementPolicy {
        ReplacementPolicy::Random
    }

    /// Type-specific parameters, for reports.
    fn params(&self) -> Vec<u32> {
        Vec::new()
    }

    /// Looks up `tag`, filling or replacing on a miss.
    fn read_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool;

    /// Write access; identical to a read unless a variant overrides it.
    fn write_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        self.read_line(tag, ctx, responses)
    }

    /// Instruction-fetch access; identical to a read unless overridden.
    fn exec_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        self.read_line(tag, ctx, responses)
    }

    /// Removes `tag` if resident.
    fn evict_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool;

    /// Design-time oracle: could these two accesses ever compete for a way?
    fn has_collision(&self, a: Tag, ctx_a: CacheContext, b: Tag, ctx_b: CacheContext) -> bool;
}

/// The concrete cache variants, as one tagged sum.
#[derive(Debug)]
pub enum CacheModelKind {
    /// Fully-associative.
    Assoc(AssocCache),
    /// Set-associative (modulo indexing).
    SetAssoc(SetAssocCache),
    /// Set-associative with per-line context locking.
    Pl(PlCache),
    /// Encrypted-index set-associative.
    Ceaser(CeaserCache),
    /// Skewed encrypted-index.
    CeaserS(CeaserSCache),
    /// Per-way skewed.
    Scatter(ScatterCache),
    /// Salted candidate sets.
    Phantom(PhantomCache),
    /// Line-number-register indirection.
    New(NewCache),
    /// Two per-domain set-associative partitions.
    WayPartition(way_partition::WayPartitionCache),
    /// DIP / DRRIP set-duelling.
    Dueling(DuelingCache),
    /// Ordered multi-level hierarchy.
    Hierarchy(CacheHierarchy),
}

impl CacheModelKind {
    pub(crate) fn as_model(&self) -> &dyn CacheModel {
        match self {
            CacheModelKind::Assoc(c) => c,
            CacheModelKind::SetAssoc(c) => c,
            CacheModelKind::Pl(c) => c,
            CacheModelKind::Ceaser(c) => c,
            CacheModelKind::CeaserS(c) => c,
            CacheModelKind::Scatter(c) => c,
            CacheModelKind::Phantom(c) => c,
            CacheModelKind::New(c) => c,
            CacheModelKind::WayPartition(c) => c,
            CacheModelKind::Dueling(c) => c,
            CacheModelKind::Hierarchy(c) => c,
        }
    }

    pub(crate) fn as_model_mut(&mut self) -> &mut dyn CacheModel {
        match self {
            CacheModelKind::Assoc(c) => c,
            CacheModelKind::SetAssoc(c) => c,
            CacheModelKind::Pl(c) => c,
            CacheModelKind::Ceaser(c) => c,
            CacheModelKind::CeaserS(c) => c,
            CacheModelKind::Scatter(c) => c,
            CacheModelKind::Phantom(c) => c,
            CacheModelKind::New(c) => c,
            CacheModelKind::WayPartition(c) => c,
            CacheModelKind::Dueling(c) => c,
            CacheModelKind::Hierarchy(c) => c,
        }
    }
}

/// Summary of a cache's construction, for result rows.
#[derive(Clone, Debug)]
pub struct CacheDescription {
    /// Type string (first level's for multi-level hierarchies).
    pub cache_type: String,
    /// Number of sets.
    pub sets: usize,
    /// Number of ways.
    pub ways: usize,
    /// Total lines.
    pub lines: usize,
    /// Replacement algorithm.
    pub algorithm: ReplacementPolicy,
    /// Up to four type-specific parameters, zero-padded.
    pub params: [u32; 4],
}

/// One cache organisation plus its per-context access statistics.
///
/// Every access dispatches to the wrapped model and classifies the
/// authoritative (last) response into the context's counters, mirroring the
/// uniform contract of spec section 4.1.
#[derive(Debug)]
pub struct Cache {
    model: CacheModelKind,
    stats: BTreeMap<CacheContext, CacheStatistics>,
    scratch: Vec<CacheResponse>,
}

/// Kinds of access the statistics layer distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AccessKind {
    Read,
    Write,
    Exec,
}

impl Cache {
    /// Wraps a concrete model.
    pub fn new(model: CacheModelKind) -> Cache {
        Cache {
            model,
            stats: BTreeMap::new(),
            scratch: Vec::with_capacity(8),
        }
    }

    fn record_access(&mut self, kind: AccessKind, ctx: CacheContext, responses: &[CacheResponse]) {
        let last = responses.last().copied().unwrap_or_else(CacheResponse::miss);
        let stats = self.stats.entry(ctx).or_default();
        let (hits, misses, evictions) = match kind {
            AccessKind::Read => (
                &mut stats.read_hits,
                &mut stats.read_misses,
                &mut stats.read_evictions,
            ),
            AccessKind::Write => (
                &mut stats.write_hits,
                &mut stats.write_misses,
                &mut stats.write_evictions,
            ),
            AccessKind::Exec => (
                &mut stats.exec_hits,
                &mut stats.exec_misses,
                &mut stats.exec_evictions,
            ),
        };
        if last.hit {
            *hits += 1;
        } else {
            *misses += 1;
            if last.eviction {
                *evictions += 1;
            }
        }
    }

    /// Read access, appending the per-level responses to `responses`.
    pub fn read_with(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let start = responses.len();
        let hit = self.model.as_model_mut().read_line(tag, ctx, responses);
        self.record_access(AccessKind::Read, ctx, &responses[start..]);
        hit
    }

    /// Read access.
    pub fn read(&mut self, tag: Tag, ctx: CacheContext) -> bool {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        let hit = self.read_with(tag, ctx, &mut scratch);
        self.scratch = scratch;
        hit
    }

    /// Write access, appending the per-level responses to `responses`.
    pub fn write_with(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let start = responses.len();
        let hit = self.model.as_model_mut().write_line(tag, ctx, responses);
        self.record_access(AccessKind::Write, ctx, &responses[start..]);
        hit
    }

    /// Write access.
    pub fn write(&mut self, tag: Tag, ctx: CacheContext) -> bool {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        let hit = self.write_with(tag, ctx, &mut scratch);
        self.scratch = scratch;
        hit
    }

    /// Instruction-fetch access, appending the responses to `responses`.
    pub fn exec_with(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let start = responses.len();
        let hit = self.model.as_model_mut().exec_line(tag, ctx, responses);
        self.record_access(AccessKind::Exec, ctx, &responses[start..]);
        hit
    }

    /// Instruction-fetch access.
    pub fn exec(&mut self, tag: Tag, ctx: CacheContext) -> bool {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        let hit = self.exec_with(tag, ctx, &mut scratch);
        self.scratch = scratch;
        hit
    }

    /// Invalidates `tag`, appending the responses to `responses`.
    pub fn evict_with(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let start = responses.len();
        let hit = self.model.as_model_mut().evict_line(tag, ctx, responses);
        let last = responses[start..]
            .last()
            .copied()
            .unwrap_or_else(CacheResponse::miss);
        let stats = self.stats.entry(ctx).or_default();
        if last.hit {
            stats.inv_hits += 1;
        } else {
            stats.inv_misses += 1;
        }
        hit
    }

    /// Invalidates `tag` if resident.
    pub fn evict(&mut self, tag: Tag, ctx: CacheContext) -> bool {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        let hit = self.evict_with(tag, ctx, &mut scratch);
        self.scratch = scratch;
        hit
    }

    /// Design-time collision oracle.
    pub fn has_collision(&self, a: Tag, ctx_a: CacheContext, b: Tag, ctx_b: CacheContext) -> bool {
        self.model.as_model().has_collision(a, ctx_a, b, ctx_b)
    }

    /// Type string of the wrapped model.
    pub fn cache_type(&self) -> &'static str {
        self.model.as_model().cache_type()
    }

    /// Total lines.
    pub fn lines(&self) -> usize {
        self.model.as_model().lines()
    }

    /// Number of sets.
    pub fn sets(&self) -> usize {
        self.model.as_model().sets()
    }

    /// Number of ways.
    pub fn ways(&self) -> usize {
        self.model.as_model().ways()
    }

    /// Ideal eviction-set size for one victim line.
    pub fn eviction_set_size(&self) -> usize {
        self.model.as_model().eviction_set_size()
    }

    /// Replacement-state sharing granularity.
    pub fn ghm_group_size(&self) -> usize {
        self.model.as_model().ghm_group_size()
    }

    /// Replacement algorithm.
    pub fn algorithm(&self) -> ReplacementPolicy {
        self.model.as_model().algorithm()
    }

    /// The wrapped model.
    pub fn model(&self) -> &CacheModelKind {
        &self.model
    }

    /// Statistics snapshot for one context (zeroes when never accessed).
    pub fn statistics(&self, ctx: CacheContext) -> CacheStatistics {
        self.stats.get(&ctx).copied().unwrap_or_default()
    }

    /// Iterates all per-context statistics.
    pub fn statistics_all(&self) -> impl Iterator<Item = (CacheContext, CacheStatistics)> + '_ {
        self.stats.iter().map(|(ctx, s)| (*ctx, *s))
    }

    /// Construction summary for result rows. Multi-level hierarchies report
    /// their first level's type string and the aggregate geometry.
    pub fn describe(&self) -> CacheDescription {
        let model = self.model.as_model();
        let cache_type = match &self.model {
            CacheModelKind::Hierarchy(h) if h.levels() > 0 => h.level(0).cache_type().to_owned(),
            _ => model.cache_type().to_owned(),
        };
        let mut params = [0u32; 4];
        for (slot, value) in params.iter_mut().zip(model.params()) {
            *slot = value;
        }
        CacheDescription {
            cache_type,
            sets: model.sets(),
            ways: model.ways(),
            lines: model.lines(),
            algorithm: model.algorithm(),
            params,
        }
    }

    /// True when any level of this cache partitions by context, in which
    /// case a single domain can never observe the whole line population.
    pub fn is_partitioned(&self) -> bool {
        match &self.model {
            CacheModelKind::WayPartition(_) => true,
            CacheModelKind::Hierarchy(h) => (0..h.levels())
                .any(|i| matches!(h.level(i).model(), CacheModelKind::WayPartition(_))),
            _ => false,
        }
    }
}

impl From<CacheModelKind> for Cache {
    fn from(model: CacheModelKind) -> Cache {
        Cache::new(model)
    }
}
