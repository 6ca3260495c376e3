//! Eviction-set construction engine.
//!
//! A profiler discovers, through black-box access to a victim, a set of
//! attacker addresses that reliably evicts the victim's secret line. The
//! algorithms trade construction cost against the cache organisations they
//! can defeat:
//! 1. **Eviction-set-size baseline** — uses the design-time collision
//!    oracle; measures the set size an ideal attacker needs.
//! 2. **Filled-cache** — prime a marked candidate pool, prune unstable
//!    candidates, probe after one victim access.
//! 3. **Probabilistic** — per-candidate miss counting against a threshold
//!    (simple average or collision-profiled midpoint).
//! 4. **LRU / PLRU deterministic pruning** — exploits replacement
//!    determinism to prune in one or few passes.
//! 5. **Single-hold** — minimise a conflict set one candidate at a time.
//! 6. **Group elimination** — minimise in ~sqrt(N) sized groups, doubling
//!    the group count when no group can be removed.
//!
//! Every profiler is deterministic under a fixed seed, confines its
//! accesses to its own handle, and leaves its lines flushed on return.

/// Eviction-set-size baseline profiler.
pub mod evset_size;

/// Filled-cache profiler and the shared candidate-pool machinery.
pub mod filled_cache;

/// Group-elimination pruning profiler.
pub mod group_elim;

/// LRU / PLRU deterministic pruning profiler.
pub mod lru;

/// Probabilistic pruning profiler.
pub mod probabilistic;

/// Single-hold pruning profiler.
pub mod single_hold;

use crate::common::{Address, Rng};
use crate::mmu::Mmu;
use crate::victim::Victim;

pub use evset_size::EvictionSetSizeProfiler;
pub use filled_cache::FilledCacheProfiler;
pub use group_elim::GroupElimProfiler;
pub use lru::LruProfiler;
pub use probabilistic::ProbabilisticProfiler;
pub use single_hold::SingleHoldProfiler;

/// Counters every profiler reports.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProfilingStatistics {
    /// Construction iterations executed.
    pub profiling_runs: u32,
    /// Evaluation runs executed.
    pub evaluation_runs: u32,
    /// Mean surviving-candidate count per construction iteration.
    pub avg_candidates: f64,
    /// Evaluation misses with the set left resident between runs.
    pub misses_under_run: u32,
    /// Evaluation misses with the set explicitly evicted between runs.
    pub misses_under_evict: u32,
    /// Evaluation misses with the set explicitly flushed between runs.
    pub misses_under_flush: u32,
    /// Emitted addresses that collide with the victim line.
    pub true_positives: u32,
    /// Emitted addresses that do not.
    pub false_positives: u32,
    /// Bytes of attacker address space the construction consumed.
    pub attack_memory_size: u64,
}

impl ProfilingStatistics {
    /// Size of the emitted eviction set.
    pub fn eviction_set_size(&self) -> u32 {
        self.true_positives + self.false_positives
    }
}

/// The profiler contract.
pub trait Profiler {
    /// Constructs an eviction set of up to `target_size` addresses within
    /// `max_iterations` construction iterations.
    fn create_eviction_set(
        &mut self,
        mmu: &mut Mmu,
        victim: &mut dyn Victim,
        target_size: usize,
        max_iterations: u32,
    );

    /// Measures the constructed set over `runs` prime+victim+probe rounds.
    fn evaluate_eviction_set(&mut self, mmu: &mut Mmu, victim: &mut dyn Victim, runs: u32);

    /// Collected statistics.
    fn statistics(&self) -> ProfilingStatistics;

    /// The constructed eviction set, as offsets into the profiler's handle.
    fn eviction_set(&self) -> &[Address];
}

/// The profiler variants the evaluation harness iterates over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfilerKind {
    /// Collision-oracle baseline with a 90% success target.
    EvictionSetSizeP90,
    /// Filled-cache deterministic construction.
    FilledCache,
    /// Probabilistic pruning, simple averaged threshold.
    Probabilistic,
    /// Probabilistic pruning, collision-profiled threshold.
    ProbabilisticProfiled,
    /// Deterministic pruning for LRU.
    Lru,
    /// Iterated pruning for PLRU.
    Plru,
    /// Single-hold minimisation.
    SingleHold,
    /// Single-hold minimisation, PLRU candidate selection.
    SingleHoldPlru,
    /// Group-elimination minimisation.
    GroupElim,
    /// Group-elimination minimisation, PLRU candidate selection.
    GroupElimPlru,
}

impl ProfilerKind {
    /// Every variant, in evaluation order.
    pub const ALL: [ProfilerKind; 10] = [
        ProfilerKind::EvictionSetSizeP90,
        ProfilerKind::FilledCache,
        ProfilerKind::Probabilistic,
        ProfilerKind::ProbabilisticProfiled,
        ProfilerKind::Lru,
        ProfilerKind::Plru,
        ProfilerKind::SingleHold,
        ProfilerKind::SingleHoldPlru,
        ProfilerKind::GroupElim,
        ProfilerKind::GroupElimPlru,
    ];

    /// Report name.
    pub fn name(self) -> &'static str {
        match self {
            ProfilerKind::EvictionSetSizeP90 => "EvictionSetSizeP90",
            ProfilerKind::FilledCache => "FilledCache",
            ProfilerKind::Probabilistic => "FilledCacheProbabilistic",
            ProfilerKind::ProbabilisticProfiled => "FilledCacheProbabilisticProfiled",
            ProfilerKind::Lru => "FilledCacheLru",
            ProfilerKind::Plru => "FilledCachePlru",
            ProfilerKind::SingleHold => "FilledCacheSingleHold",
            ProfilerKind::SingleHoldPlru => "FilledCacheSingleHoldPlru",
            ProfilerKind::GroupElim => "FilledCacheGroupElim",
            ProfilerKind::GroupElimPlru => "FilledCacheGroupElimPlru",
        }
    }

    /// Instantiates the profiler against the cache currently under `mmu`.
    pub fn build(self, mmu: &Mmu, rng: &mut Rng) -> Box<dyn Profiler> {
        let cache_bytes = mmu.cache().lines() as u64 * crate::common::CACHE_LINE_SIZE;
        match self {
            ProfilerKind::EvictionSetSizeP90 => Box::new(EvictionSetSizeProfiler::new()),
            ProfilerKind::FilledCache => {
                Box::new(FilledCacheProfiler::new(cache_bytes, rng.fork()))
            }
            ProfilerKind::Probabilistic => {
                Box::new(ProbabilisticProfiler::new(cache_bytes, false, rng.fork()))
            }
            ProfilerKind::ProbabilisticProfiled => {
                Box::new(ProbabilisticProfiler::new(cache_bytes, true, rng.fork()))
            }
            ProfilerKind::Lru => Box::new(LruProfiler::new(cache_bytes, false, rng.fork())),
            ProfilerKind::Plru => Box::new(LruProfiler::new(cache_bytes, true, rng.fork())),
            ProfilerKind::SingleHold => {
                Box::new(SingleHoldProfiler::new(cache_bytes, false, rng.fork()))
            }
            ProfilerKind::SingleHoldPlru => {
                Box::new(SingleHoldProfiler::new(cache_bytes, true, rng.fork()))
            }
            ProfilerKind::GroupElim => {
                Box::new(GroupElimProfiler::new(cache_bytes, false, rng.fork()))
            }
            ProfilerKind::GroupElimPlru => {
                Box::new(GroupElimProfiler::new(cache_bytes, true, rng.fork()))
            }
        }
    }
}
