//! Filled-cache profiling: the shared candidate-pool machinery and the
//! deterministic base profiler.
//!
//! All filled-cache variants work over a candidate pool several times the
//! cache size: mark candidates, prime the cache with them, prune the ones
//! the cache will not hold, let the victim run once, and probe for misses.
//! The variants differ in how they select, prune, and probe; the pool,
//! flushing, and evaluation harness live in [`FilledCacheCore`].

use crate::common::{Address, CacheContext, Rng, CACHE_LINE_SIZE};
use crate::mmu::{MemHandle, Mmu};
use crate::profiling::{Profiler, ProfilingStatistics};
use crate::victim::Victim;

/// Shared state of every filled-cache profiler.
#[derive(Debug)]
pub(crate) struct FilledCacheCore {
    pub handle: Option<MemHandle>,
    pub cache_bytes: u64,
    pub eviction_set: Vec<Address>,
    pub rng: Rng,
    pub stat_profiling_runs: u32,
    pub stat_avg_candidates: f64,
    pub stat_eval_runs: u32,
    pub stat_eval_misses: u32,
    pub stat_eval_misses_evict: u32,
    pub stat_eval_misses_flush: u32,
    pub stat_tp: u32,
    pub stat_fp: u32,
    pub stat_attack_memory: u64,
}

impl FilledCacheCore {
    pub(crate) fn new(cache_bytes: u64, rng: Rng) -> FilledCacheCore {
        FilledCacheCore {
            handle: None,
            cache_bytes,
            eviction_set: Vec::new(),
            rng,
            stat_profiling_runs: 0,
            stat_avg_candidates: 0.0,
            stat_eval_runs: 0,
            stat_eval_misses: 0,
            stat_eval_misses_evict: 0,
            stat_eval_misses_flush: 0,
            stat_tp: 0,
            stat_fp: 0,
            stat_attack_memory: 0,
        }
    }

    /// Cache capacity in lines.
    pub(crate) fn cache_lines(&self) -> usize {
        (self.cache_bytes / CACHE_LINE_SIZE) as usize
    }

    /// Releases the old pool (if any) and allocates a fresh one of
    /// `multiple` cache sizes.
    pub(crate) fn fresh_pool(&mut self, mmu: &mut Mmu, name: &str, multiple: u64) -> MemHandle {
        if let Some(old) = self.handle.take() {
            mmu.free(old);
        }
        let bytes = multiple * self.cache_bytes;
        let handle = mmu
            .allocate(name, bytes, CacheContext::ATTACKER, false)
            .expect("profiler pool");
        self.handle = Some(handle);
        self.stat_attack_memory = bytes;
        handle
    }

    pub(crate) fn handle(&self) -> MemHandle {
        self.handle.expect("pool allocated")
    }

    /// Reads every marked candidate in forward order.
    pub(crate) fn prime(&mut self, mmu: &mut Mmu, candidates: &[bool]) {
        let handle = self.handle();
        for (index, &marked) in candidates.iter().enumerate() {
            if marked {
                mmu.read(handle, index as Address * CACHE_LINE_SIZE);
            }
        }
    }

    /// Flushes the first `count` pool lines.
    pub(crate) fn flush_lines(&mut self, mmu: &mut Mmu, count: usize) {
        let handle = self.handle();
        for index in 0..count {
            mmu.flush(handle, index as Address * CACHE_LINE_SIZE);
        }
    }

    /// Displaces the whole cache by streaming through a scratch region.
    pub(crate) fn flush_by_occupancy(&mut self, mmu: &mut Mmu) {
        let handle = mmu
            .allocate("FilledCacheFlushRange", self.cache_bytes, CacheContext::ATTACKER, false)
            .expect("flush range");
        let mut offset = 0;
        while offset < self.cache_bytes {
            mmu.read(handle, offset);
            offset += CACHE_LINE_SIZE;
        }
        mmu.free(handle);
    }

    /// Evicts the constructed set, by flush or by occupancy streaming.
    pub(crate) fn displace_set(&mut self, mmu: &mut Mmu, with_flush: bool) {
        if with_flush {
            let handle = self.handle();
            for index in 0..self.eviction_set.len() {
                let address = self.eviction_set[index];
                mmu.flush(handle, address);
            }
        } else {
            self.flush_by_occupancy(mmu);
        }
    }

    /// One evaluation pass: optional displacement, victim access, read the
    /// set, count victim misses.
    fn test_eviction_set(
        &mut self,
        mmu: &mut Mmu,
        victim: &mut dyn Victim,
        runs: u32,
        evict_before: bool,
        with_flush: bool,
    ) -> u32 {
        let handle = self.handle();
        let mut misses = 0;
        for _ in 0..runs {
            if evict_before {
                self.displace_set(mmu, with_flush);
            }
            victim.access_address(mmu);
            for index in 0..self.eviction_set.len() {
                let address = self.eviction_set[index];
                mmu.read(handle, address);
            }
            if !victim.access_address(mmu) {
                misses += 1;
            }
        }
        misses
    }

    /// The three-pass evaluation plus the collision-oracle TP/FP split.
    pub(crate) fn evaluate(&mut self, mmu: &mut Mmu, victim: &mut dyn Victim, runs: u32) {
        self.stat_eval_runs = runs;
        if self.handle.is_none() {
            return;
        }
        self.stat_eval_misses = self.test_eviction_set(mmu, victim, runs, false, false);
        self.stat_eval_misses_evict = self.test_eviction_set(mmu, victim, runs, true, false);
        self.stat_eval_misses_flush = self.test_eviction_set(mmu, victim, runs, true, true);

        self.stat_tp = 0;
        self.stat_fp = 0;
        let handle = self.handle();
        for index in 0..self.eviction_set.len() {
            let address = self.eviction_set[index];
            if victim.has_collision(mmu, handle, address) {
                self.stat_tp += 1;
            } else {
                self.stat_fp += 1;
            }
        }
    }

    pub(crate) fn statistics(&self) -> ProfilingStatistics {
        ProfilingStatistics {
            profiling_runs: self.stat_profiling_runs,
            evaluation_runs: self.stat_eval_runs,
            avg_candidates: self.stat_avg_candidates,
            misses_under_run: self.stat_eval_misses,
            misses_under_evict: self.stat_eval_misses_evict,
            misses_under_flush: self.stat_eval_misses_flush,
            true_positives: self.stat_tp,
            false_positives: self.stat_fp,
            attack_memory_size: self.stat_attack_memory,
        }
    }
}

/// Deterministic filled-cache profiler.
#[derive(Debug)]
pub struct FilledCacheProfiler {
    core: FilledCacheCore,
}

impl FilledCacheProfiler {
    /// Profiler for a cache of `cache_bytes`.
    pub fn new(cache_bytes: u64, rng: Rng) -> FilledCacheProfiler {
        FilledCacheProfiler {
            core: FilledCacheCore::new(cache_bytes, rng),
        }
    }

    /// Marks roughly one candidate per cache line across the pool.
    fn select_candidates(&mut self, candidates: &mut [bool]) {
        let factor = (candidates.len() / self.core.cache_lines()).max(1) as u64;
        for slot in candidates.iter_mut() {
            *slot = self.core.rng.below(factor) == 0;
        }
    }

    /// Drops marked candidates that miss on a re-read, repeating until a
    /// pass observes no miss.
    fn prune(&mut self, mmu: &mut Mmu, candidates: &mut [bool]) -> u32 {
        let handle = self.core.handle();
        loop {
            let mut missed = 0;
            let mut surviving = 0;
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
            if missed == 0 {
                return surviving;
            }
        }
    }

    /// Forward probe; the first missing candidate joins the eviction set.
    fn probe(
        &mut self,
        mmu: &mut Mmu,
        candidates: &[bool],
        counts: &mut [u32],
    ) {
        let handle = self.core.handle();
        for (index, &marked) in candidates.iter().enumerate() {
            if marked && !mmu.read(handle, index as Address * CACHE_LINE_SIZE) {
                if counts[index] == 0 {
                    self.core
                        .eviction_set
                        .push(index as Address * CACHE_LINE_SIZE);
                }
                counts[index] += 1;
                break;
            }
        }
    }
}

impl Profiler for FilledCacheProfiler {
    fn create_eviction_set(
        &mut self,
        mmu: &mut Mmu,
        victim: &mut dyn Victim,
        target_size: usize,
        max_iterations: u32,
    ) {
        let ratio = target_size as u64 / self.core.cache_bytes;
        let multiple = (ratio + 1) * 8;
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
            self.core.prime(mmu, &candidates);
            self.core.stat_avg_candidates += f64::from(self.prune(mmu, &mut candidates));
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
