//! Single-hold pruning: minimise a conflicting candidate set one address
//! at a time.
//!
//! Starting from a pool that already conflicts with the victim, each
//! candidate is tentatively removed; the removal sticks only if the
//! reduced set still conflicts. Passes repeat from the top until a full
//! pass removes nothing.

use crate::common::{Address, CACHE_LINE_SIZE};
use crate::mmu::Mmu;
use crate::profiling::filled_cache::FilledCacheCore;
use crate::profiling::{Profiler, ProfilingStatistics};
use crate::victim::Victim;

/// Attempts at drawing an initially conflicting candidate set.
const MAX_CONFLICT_SET_TRIES: u32 = 50;

/// Single-hold minimisation profiler.
#[derive(Debug)]
pub struct SingleHoldProfiler {
    core: FilledCacheCore,
    plru: bool,
}

impl SingleHoldProfiler {
    /// Profiler for a cache of `cache_bytes`; `plru` selects the sparse
    /// random candidate pool.
    pub fn new(cache_bytes: u64, plru: bool, rng: crate::common::Rng) -> SingleHoldProfiler {
        SingleHoldProfiler {
            core: FilledCacheCore::new(cache_bytes, rng),
            plru,
        }
    }

    fn select_candidates(&mut self, candidates: &mut [bool]) -> usize {
        if self.plru {
            let factor = (candidates.len() / self.core.cache_lines() / 2).max(1) as u64;
            let mut selected = 0;
            for slot in candidates.iter_mut() {
                *slot = self.core.rng.below(factor) == 0;
                selected += usize::from(*slot);
            }
            selected
        } else {
            candidates.fill(true);
            candidates.len()
        }
    }

    /// Whether priming with the candidate set makes the victim's line miss.
    pub(crate) fn has_conflict(
        core: &mut FilledCacheCore,
        mmu: &mut Mmu,
        victim: &mut dyn Victim,
        candidates: &[bool],
    ) -> bool {
        victim.access_address(mmu);
        victim.access_address(mmu);
        core.prime(mmu, candidates);
        let hit = victim.access_address(mmu);
        core.flush_lines(mmu, candidates.len());
        victim.invalidate_address(mmu);
        !hit
    }

    /// Clears the next marked candidate at or after `from`; returns its
    /// index, or the pool length when none remain.
    fn prune_next(candidates: &mut [bool], from: usize) -> usize {
        for index in from..candidates.len() {
            if candidates[index] {
                candidates[index] = false;
                return index;
            }
        }
        candidates.len()
    }
}

impl Profiler for SingleHoldProfiler {
    fn create_eviction_set(
        &mut self,
        mmu: &mut Mmu,
        victim: &mut dyn Victim,
        target_size: usize,
        _max_iterations: u32,
    ) {
        let multiple: u64 = 8;
        let pool_lines = multiple as usize * self.core.cache_lines();
        let mut candidates = vec![false; pool_lines];

        self.core.eviction_set.clear();
        self.core.fresh_pool(mmu, "FilledCachePool", multiple);
        self.core.stat_profiling_runs = 0;
        self.core.stat_avg_candidates = 0.0;

        let mut active;
        let mut tries = 0;
        loop {
            active = self.select_candidates(&mut candidates);
            tries += 1;
            if Self::has_conflict(&mut self.core, mmu, victim, &candidates)
                || tries >= MAX_CONFLICT_SET_TRIES
            {
                break;
            }
        }
        if tries >= MAX_CONFLICT_SET_TRIES {
            tracing::warn!("no conflicting candidate set found");
            return;
        }

        let mut prune_index = 0;
        let mut pruned_previous_pass = 1usize;
        let mut pruned_this_pass = 0usize;

        while active > target_size && pruned_previous_pass > 0 {
            self.core.stat_profiling_runs += 1;

            let index = Self::prune_next(&mut candidates, prune_index);
            if index == pool_lines {
                // Pass finished; start over unless it removed nothing.
                prune_index = 0;
                pruned_previous_pass = pruned_this_pass;
                pruned_this_pass = 0;
                tracing::debug!(active, "single-hold pass complete");
                continue;
            }

            active -= 1;
            pruned_this_pass += 1;
            if !Self::has_conflict(&mut self.core, mmu, victim, &candidates) {
                candidates[index] = true;
                active += 1;
                pruned_this_pass -= 1;
            }
            prune_index = index + 1;
        }

        for (index, &marked) in candidates.iter().enumerate() {
            if marked {
                self.core
                    .eviction_set
                    .push(index as Address * CACHE_LINE_SIZE);
            }
        }
        self.core.stat_avg_candidates = active as f64;
    }

    fn evaluate_eviction_set(&mut self, mmu: &mut Mmu, victim: &mut dyn Victim, runs: u32) {
        self.core.evaluate(mmu, victim, runs);
    }

    fn statistics(&self) -> ProfilingStatistics {
        self.core.statistics()
    }

    fn eviction_set(&self) -> &[Address] {
        &self.core.eviction_set
    }
}
