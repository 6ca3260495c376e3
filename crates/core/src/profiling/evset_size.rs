//! Eviction-set-size baseline profiler.
//!
//! Walks the attacker address space and accepts every address the
//! design-time collision oracle approves, periodically measuring the
//! current set's eviction success rate, until the rate exceeds the target
//! (default 0.9) or the requested set size is reached. This is the
//! baseline the attack driver's warmup also builds on.

use crate::common::{Address, CACHE_LINE_SIZE};
use crate::mmu::{MemHandle, Mmu};
use crate::profiling::{Profiler, ProfilingStatistics};
use crate::victim::Victim;

/// Address-space multiple available to the walk.
const SEARCH_SPACE_FACTOR: u64 = 10_000;

/// Prime+probe rounds per success-rate measurement.
const TEST_RUNS: u32 = 500;

/// Collision-oracle baseline profiler.
#[derive(Debug, Default)]
pub struct EvictionSetSizeProfiler {
    eviction_set: Vec<Address>,
    stat_eviction_set_size: u32,
    stat_attack_memory: u64,
}

impl EvictionSetSizeProfiler {
    /// Fresh profiler.
    pub fn new() -> EvictionSetSizeProfiler {
        EvictionSetSizeProfiler::default()
    }

    /// Measures how often priming with `eviction_set` makes the victim's
    /// next access miss.
    pub fn test_eviction_set(
        mmu: &mut Mmu,
        victim: &mut dyn Victim,
        handle: MemHandle,
        eviction_set: &[Address],
    ) -> f64 {
        let mut misses = 0u32;
        for _ in 0..TEST_RUNS {
            victim.invalidate_address(mmu);
            for &addr in eviction_set {
                mmu.flush(handle, addr);
            }
            victim.access_address(mmu);
            for &addr in eviction_set {
                mmu.read(handle, addr);
            }
            if !victim.access_address(mmu) {
                misses += 1;
            }
        }
        f64::from(misses) / f64::from(TEST_RUNS)
    }

    /// Walks `handle`'s lines, collecting oracle-approved addresses into
    /// `eviction_set` until the success target or `target_size` is hit.
    ///
    /// Returns false when the walk ran out of addresses first.
    pub fn create_into(
        mmu: &mut Mmu,
        victim: &mut dyn Victim,
        handle: MemHandle,
        eviction_set: &mut Vec<Address>,
        target_size: Option<u64>,
        target_effectiveness: f64,
        measure_each_step: bool,
    ) -> bool {
        let lines = mmu.size_of(handle) / CACHE_LINE_SIZE;
        let ideal_size = mmu.cache().eviction_set_size() as u64;
        let test_interval = ideal_size / 10;
        let size_bound = target_size.unwrap_or(u64::MAX);

        let mut success_rate = 0.0;
        let mut index = 0u64;
        let mut tests_pending = 0u64;

        while success_rate <= target_effectiveness - f64::EPSILON
            && index < lines
            && (eviction_set.len() as u64) < size_bound
        {
            let mut found = false;
            while !found && index < lines {
                let address = index * CACHE_LINE_SIZE;
                if victim.has_collision(mmu, handle, address) {
                    eviction_set.push(address);
                    found = true;
                    tests_pending += 1;
                }
                index += 1;
            }
            let due = ideal_size <= eviction_set.len() as u64 && tests_pending >= test_interval;
            if due || measure_each_step {
                success_rate = Self::test_eviction_set(mmu, victim, handle, eviction_set);
                tests_pending = 0;
                tracing::debug!(
                    success_rate,
                    set_size = eviction_set.len(),
                    "eviction-set measurement"
                );
            }
        }

        if index == lines {
            tracing::warn!(
                set_size = eviction_set.len(),
                success_rate,
                "address space exhausted before reaching the success target"
            );
        }
        index != lines
    }
}

impl Profiler for EvictionSetSizeProfiler {
    fn create_eviction_set(
        &mut self,
        mmu: &mut Mmu,
        victim: &mut dyn Victim,
        _target_size: usize,
        _max_iterations: u32,
    ) {
        let lines = SEARCH_SPACE_FACTOR * mmu.cache().lines() as u64;
        let bytes = lines * CACHE_LINE_SIZE;
        let handle = mmu
            .allocate("EvSetSizeSearch", bytes, crate::common::CacheContext::ATTACKER, false)
            .expect("profiler handle");
        self.eviction_set.clear();

        EvictionSetSizeProfiler::create_into(
            mmu,
            victim,
            handle,
            &mut self.eviction_set,
            None,
            0.9,
            false,
        );

        mmu.free(handle);
        self.stat_eviction_set_size = self.eviction_set.len() as u32;
        self.stat_attack_memory = bytes;
    }

    fn evaluate_eviction_set(&mut self, _mmu: &mut Mmu, _victim: &mut dyn Victim, _runs: u32) {
        // The construction loop already measures its own success rate.
    }

    fn statistics(&self) -> ProfilingStatistics {
        ProfilingStatistics {
            profiling_runs: 1,
            true_positives: self.stat_eviction_set_size,
            attack_memory_size: self.stat_attack_memory,
            ..ProfilingStatistics::default()
        }
    }

    fn eviction_set(&self) -> &[Address] {
        &self.eviction_set
    }
}
