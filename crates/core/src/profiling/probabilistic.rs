//! Probabilistic pruning profiler.
//!
//! Instead of trusting a single probe, every candidate accumulates a miss
//! count across the construction iterations and is then re-measured in
//! isolation; candidates whose miss count clears a threshold join the
//! eviction set. The threshold is either the plain average over all
//! candidates or, in profiled mode, the midpoint between the averages of
//! colliding and non-colliding candidates as judged by the design-time
//! oracle.

use crate::common::{Address, CACHE_LINE_SIZE};
use crate::mmu::Mmu;
use crate::profiling::filled_cache::FilledCacheCore;
use crate::profiling::{Profiler, ProfilingStatistics};
use crate::victim::Victim;

/// Pruning stops when the per-pass miss rate drops below this.
const PRUNING_STOP_RATE: f64 = 0.01;

/// Per-candidate isolation test runs.
const CANDIDATE_TEST_RUNS: u32 = 100;

/// Probabilistic pruning profiler.
#[derive(Debug)]
pub struct ProbabilisticProfiler {
    core: FilledCacheCore,
    profiled_threshold: bool,
    use_flush: bool,
}

impl ProbabilisticProfiler {
    /// Profiler for a cache of `cache_bytes`; `profiled_threshold` selects
    /// the oracle-split threshold.
    pub fn new(cache_bytes: u64, profiled_threshold: bool, rng: crate::common::Rng) -> Self {
        ProbabilisticProfiler {
            core: FilledCacheCore::new(cache_bytes, rng),
            profiled_threshold,
            use_flush: false,
        }
    }

    fn select_candidates(&mut self, candidates: &mut [bool]) {
        let factor = (candidates.len() / self.core.cache_lines()).max(1) as u64;
        for slot in candidates.iter_mut() {
            *slot = self.core.rng.below(factor) == 0;
        }
    }

    /// Drops missing candidates until the miss rate falls below the stop
    /// condition.
    fn prune(&mut self, mmu: &mut Mmu, candidates: &mut [bool]) -> u32 {
        let handle = self.core.handle();
        loop {
            let mut missed = 0u32;
            let mut surviving = 0u32;
            for (index, slot) in candidates.iter_mut().enumerate() {
                if *slot {
                    if mmu.read(handle, index as Address * CACHE_LINE_SIZE) {
                        surviving += 1;
                    } else {
                        *slot = false;
                        missed += 1;
                    }
                }
            }
            if missed == 0
                || f64::from(missed) / f64::from(missed + surviving) <= PRUNING_STOP_RATE
            {
                return surviving;
            }
        }
    }

    /// Counts every marked candidate that misses after the victim ran.
    fn probe(&mut self, mmu: &mut Mmu, candidates: &[bool], counts: &mut [u32]) {
        let handle = self.core.handle();
        for (index, &marked) in candidates.iter().enumerate() {
            if marked && !mmu.read(handle, index as Address * CACHE_LINE_SIZE) {
                counts[index] += 1;
            }
        }
    }

    /// Isolation test: how often does the victim's single access evict
    /// this candidate?
    fn test_candidate_misses(
        &mut self,
        mmu: &mut Mmu,
        victim: &mut dyn Victim,
        counts: &[u32],
        misses: &mut [u32],
    ) {
        let handle = self.core.handle();
        for index in 0..counts.len() {
            if counts[index] == 0 {
                continue;
            }
            let address = index as Address * CACHE_LINE_SIZE;
            misses[index] = 0;
            for _ in 0..CANDIDATE_TEST_RUNS {
                mmu.read(handle, address);
                victim.access_address(mmu);
                if !mmu.read(handle, address) {
                    misses[index] += 1;
                }
                if self.use_flush {
                    mmu.flush(handle, address);
                    victim.invalidate_address(mmu);
                } else {
                    self.core.flush_by_occupancy(mmu);
                }
            }
        }
    }

    fn simple_threshold(counts: &[u32], misses: &[u32]) -> f64 {
        let mut sum = 0.0;
        let mut n = 0u32;
        for index in 0..counts.len() {
            if counts[index] > 0 {
                sum += f64::from(misses[index]);
                n += 1;
            }
        }
        if n == 0 {
            0.0
        } else {
            sum / f64::from(n)
        }
    }

    fn oracle_split_threshold(
        &mut self,
        mmu: &mut Mmu,
        victim: &mut dyn Victim,
        counts: &[u32],
        misses: &[u32],
    ) -> f64 {
        let handle = self.core.handle();
        let mut sum_colliding = 0.0;
        let mut n_colliding = 0u32;
        let mut sum_other = 0.0;
        let mut n_other = 0u32;
        for index in 0..counts.len() {
            if counts[index] == 0 {
                continue;
            }
            let address = index as Address * CACHE_LINE_SIZE;
            if victim.has_collision(mmu, handle, address) {
                sum_colliding += f64::from(misses[index]);
                n_colliding += 1;
            } else {
                sum_other += f64::from(misses[index]);
                n_other += 1;
            }
        }
        let avg_colliding = if n_colliding > 0 {
            sum_colliding / f64::from(n_colliding)
        } else {
            f64::MAX
        };
        let avg_other = if n_other > 0 {
            sum_other / f64::from(n_other)
        } else {
            0.0
        };
        (avg_colliding + avg_other) / 2.0
    }
}

impl Profiler for ProbabilisticProfiler {
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
        let mut misses = vec![0u32; pool_lines];

        self.core.eviction_set.clear();
        self.core.fresh_pool(mmu, "FilledCachePool", multiple);
        self.core.stat_profiling_runs = 0;
        self.core.stat_avg_candidates = 0.0;

        while self.core.stat_profiling_runs < max_iterations {
            self.core.stat_profiling_runs += 1;
            self.select_candidates(&mut candidates);
            self.core.prime(mmu, &candidates);
            self.core.stat_avg_candidates += f64::from(self.prune(mmu, &mut candidates));
            victim.access_address(mmu);
            self.probe(mmu, &candidates, &mut counts);
            self.core.flush_lines(mmu, self.core.cache_lines());
        }
        if self.core.stat_profiling_runs > 0 {
            self.core.stat_avg_candidates /= f64::from(self.core.stat_profiling_runs);
        }

        self.test_candidate_misses(mmu, victim, &counts, &mut misses);

        let threshold = if self.profiled_threshold {
            self.oracle_split_threshold(mmu, victim, &counts, &misses)
        } else {
            Self::simple_threshold(&counts, &misses)
        };
        tracing::debug!(threshold, "probabilistic candidate threshold");

        for index in 0..counts.len() {
            if self.core.eviction_set.len() >= target_size {
                break;
            }
            if counts[index] > 0 && f64::from(misses[index]) > threshold {
                self.core
                    .eviction_set
                    .push(index as Address * CACHE_LINE_SIZE);
            }
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
