//! Deterministic pruning for LRU and PLRU caches.
//!
//! Under true LRU, once a primed line survives its own second read it
//! stays resident across a single victim access unless the victim's line
//! genuinely competes, so one prime-and-re-read pass prunes the candidate
//! pool exactly. Tree/bit-PLRU only approximates that, so the PLRU flavour
//! selects a sparser random pool and iterates the pruning pass until it
//! stabilises.

use crate::common::{Address, CACHE_LINE_SIZE};
use crate::mmu::Mmu;
use crate::profiling::filled_cache::FilledCacheCore;
use crate::profiling::{Profiler, ProfilingStatistics};
use crate::victim::Victim;

/// LRU / PLRU pruning profiler.
#[derive(Debug)]
pub struct LruProfiler {
    core: FilledCacheCore,
    plru: bool,
}

impl LruProfiler {
    /// Profiler for a cache of `cache_bytes`; `plru` selects the iterated
    /// variant.
    pub fn new(cache_bytes: u64, plru: bool, rng: crate::common::Rng) -> LruProfiler {
        LruProfiler {
            core: FilledCacheCore::new(cache_bytes, rng),
            plru,
        }
    }

    fn select_candidates(&mut self, candidates: &mut [bool]) {
        if self.plru {
            // Roughly two cache fills worth, spread across the pool.
            let factor = (candidates.len() / self.core.cache_lines() / 2).max(1) as u64;
            for slot in candidates.iter_mut() {
                *slot = self.core.rng.below(factor) == 0;
            }
        } else {
            candidates.fill(true);
        }
    }

    /// Prime-then-re-read pruning; repeats while misses remain in PLRU
    /// mode, runs a single settling pass otherwise.
    fn prune(&mut self, mmu: &mut Mmu, candidates: &mut [bool]) -> u32 {
        let handle = self.core.handle();
        loop {
            self.core.prime(mmu, candidates);
            let mut missed = 0u32;
            let mut surviving = 0u32;
            for index in (0..candidates.len()).rev() {
                if candidates[index] {
                    if mmu.read(handle, index as Address * CACHE_LINE_SIZE) {
                        surviving += 1;
                    } else {
                        candidates[index] = false;
                        missed += 1;
                    }
                }
            }
            if !self.plru || missed == 0 {
                if !self.plru {
                    // Leave the survivors resident in a known order.
                    self.core.prime(mmu, candidates);
                }
                return surviving;
            }
        }
    }

    /// Forward probe collecting every miss into the eviction set.
    fn probe(&mut self, mmu: &mut Mmu, candidates: &[bool], counts: &mut [u32]) {
        let handle = self.core.handle();
        for (index, &marked) in candidates.iter().enumerate() {
            if marked && !mmu.read(handle, index as Address * CACHE_LINE_SIZE) {
                if counts[index] == 0 {
                    self.core
                        .eviction_set
                        .push(index as Address * CACHE_LINE_SIZE);
                }
                counts[index] += 1;
            }
        }
    }
}

impl Profiler for LruProfiler {
    fn create_eviction_set(
        &mut self,
        mmu: &mut Mmu,
        victim: &mut dyn Victim,
        target_size: usize,
        max_iterations: u32,
    ) {
        let multiple: u64 = if self.plru { 8 } else { 2 };
        let pool_lines = multiple as usize * self.core.cache_lines();
        let mut candidates = vec![false; pool_lines];
        let mut counts = vec![0u32; pool_lines];

        self.core.eviction_set.clear();
        self.core.fresh_pool(mmu, "FilledCachePool", multiple);
        self.core.stat_profiling_runs = 0;
        self.core.stat_avg_candidates = 0.0;

        while self.core.eviction_set.len() < target_size
            && self.core.stat_profiling_runs < max_iterations
        {
            self.core.stat_profiling_runs += 1;
            self.select_candidates(&mut candidates);
            self.core.stat_avg_candidates += f64::from(self.prune(mmu, &mut candidates));
            if self.plru {
                self.core.prime(mmu, &candidates);
            }
            victim.access_address(mmu);
            self.probe(mmu, &candidates, &mut counts);
            self.core.flush_lines(mmu, pool_lines);
        }

        if self.core.stat_profiling_runs > 0 {
            self.core.stat_avg_candidates /= f64::from(self.core.stat_profiling_runs);
        }
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
