//! Group elimination: minimise a conflicting candidate set in groups.
//!
//! Same reduction as single-hold, but whole groups are removed at a time:
//! the survivors partition into about sqrt(N) groups, every group is
//! tentatively dropped, and when a pass removes no group the group count
//! doubles (halving the group size) until groups are single candidates.
//! Converges in roughly O(sqrt(N) * N) conflict tests against the
//! O(N^2) of single-hold.

use crate::common::{Address, CACHE_LINE_SIZE};
use crate::mmu::Mmu;
use crate::profiling::filled_cache::FilledCacheCore;
use crate::profiling::single_hold::SingleHoldProfiler;
use crate::profiling::{Profiler, ProfilingStatistics};
use crate::victim::Victim;

/// Attempts at drawing an initially conflicting candidate set.
const MAX_CONFLICT_SET_TRIES: u32 = 50;

/// No-group marker.
const UNGROUPED: i32 = -1;

/// Group-elimination minimisation profiler.
#[derive(Debug)]
pub struct GroupElimProfiler {
    core: FilledCacheCore,
    plru: bool,
}

impl GroupElimProfiler {
    /// Profiler for a cache of `cache_bytes`; `plru` selects the sparse
    /// random candidate pool.
    pub fn new(cache_bytes: u64, plru: bool, rng: crate::common::Rng) -> GroupElimProfiler {
        GroupElimProfiler {
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

    /// Assigns every marked candidate to one of `groups` groups; the last
    /// group soaks up the remainder.
    fn assign_groups(candidates: &[bool], selected: usize, group_of: &mut [i32], groups: usize) {
        let group_size = (selected / groups).max(1);
        let mut counted = 0usize;
        for (index, &marked) in candidates.iter().enumerate() {
            if marked {
                let group = (counted / group_size).min(groups - 1);
                group_of[index] = group as i32;
                counted += 1;
            }
        }
    }

    /// Clears the next whole group at or after `from`; returns the scan
    /// position past it.
    fn prune_group(candidates: &mut [bool], group_of: &[i32], from: usize) -> usize {
        let mut group = None;
        let mut index = from;
        while index < candidates.len() {
            if candidates[index] {
                match group {
                    None => {
                        group = Some(group_of[index]);
                        candidates[index] = false;
                    }
                    Some(g) if group_of[index] == g => candidates[index] = false,
                    Some(_) => break,
                }
            }
            index += 1;
        }
        index
    }

    /// Re-marks the group cleared by the matching [`Self::prune_group`].
    fn unprune_group(candidates: &mut [bool], group_of: &[i32], from: usize) {
        let mut group = None;
        for index in from..candidates.len() {
            if group_of[index] != UNGROUPED {
                match group {
                    None => {
                        group = Some(group_of[index]);
                        candidates[index] = true;
                    }
                    Some(g) if group_of[index] == g => candidates[index] = true,
                    Some(_) => break,
                }
            }
        }
    }

    /// Retires the group's markers after a committed removal.
    fn clean_group(group_of: &mut [i32], from: usize) {
        let mut group = None;
        for index in from..group_of.len() {
            if group_of[index] != UNGROUPED {
                match group {
                    None => {
                        group = Some(group_of[index]);
                        group_of[index] = UNGROUPED;
                    }
                    Some(g) if group_of[index] == g => group_of[index] = UNGROUPED,
                    Some(_) => break,
                }
            }
        }
    }
}

impl Profiler for GroupElimProfiler {
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
        let mut group_of = vec![UNGROUPED; pool_lines];

        self.core.eviction_set.clear();
        self.core.fresh_pool(mmu, "FilledCachePool", multiple);
        self.core.stat_profiling_runs = 0;
        self.core.stat_avg_candidates = 0.0;

        let mut active;
        let mut tries = 0;
        loop {
            group_of.fill(UNGROUPED);
            active = self.select_candidates(&mut candidates);
            tries += 1;
            if SingleHoldProfiler::has_conflict(&mut self.core, mmu, victim, &candidates)
                || tries >= MAX_CONFLICT_SET_TRIES
            {
                break;
            }
            if !self.plru {
                // A full pool that cannot conflict will not start to; move
                // the pool elsewhere in the address space and retry.
                self.core.fresh_pool(mmu, "FilledCachePool", multiple);
            }
        }
        if tries >= MAX_CONFLICT_SET_TRIES {
            tracing::warn!("no conflicting candidate set found");
            return;
        }

        let mut groups = (active as f64).sqrt().max(1.0) as usize;
        let mut active_at_pass_start = 0usize;

        while active > target_size && (groups < active || active_at_pass_start != active) {
            self.core.stat_profiling_runs += 1;

            if active_at_pass_start == active {
                groups *= 2;
            }
            active_at_pass_start = active;

            let mut group_size = active / groups;
            if group_size < 1 {
                group_size = 1;
                groups = active;
            }
            tracing::debug!(groups, group_size, active, "group-elimination pass");

            Self::assign_groups(&candidates, active, &mut group_of, groups);

            let mut prune_index = 0usize;
            for group in 0..groups {
                let next_index = Self::prune_group(&mut candidates, &group_of, prune_index);

                let removed = if group != groups - 1 {
                    group_size
                } else {
                    active_at_pass_start - group * group_size
                };
                active -= removed.min(active);

                if SingleHoldProfiler::has_conflict(&mut self.core, mmu, victim, &candidates) {
                    Self::clean_group(&mut group_of, prune_index);
                } else {
                    Self::unprune_group(&mut candidates, &group_of, prune_index);
                    active += removed;
                }
                prune_index = next_index;
            }
        }

        for (index, &marked) in candidates.iter().enumerate() {
            if marked {
                self.core
                    .eviction_set
                    .push(index as Address * CACHE_LINE_SIZE);
            }
        }
        self.core.stat_avg_candidates = active as f64;
        tracing::debug!(
            set_size = self.core.eviction_set.len(),
            "group elimination finished"
        );
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
