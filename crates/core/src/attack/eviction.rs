//! Eviction-set attacker.
//!
//! Warmup constructs an eviction set against the victim's secret line with
//! the collision-oracle baseline profiler and installs the victim-side
//! watch, so the driver can compare what the attacker measures with what
//! the victim actually evicted. Prime reads the set; probe re-reads it
//! (newest first) counting misses, self-evictions, and unseen displaced
//! lines; noise streams through the rest of the attacker's buffer.

use std::collections::HashSet;

use crate::attack::{Attacker, NoiseMode, ProbeMode, ProbeOutcome};
use crate::cache::CacheResponse;
use crate::common::{Address, CacheContext, Tag, CACHE_LINE_SIZE};
use crate::mmu::{MemHandle, Mmu};
use crate::profiling::EvictionSetSizeProfiler;
use crate::victim::{self, Victim};

/// Attacker buffer size, in cache multiples.
const BUFFER_FACTOR: u64 = 10_000;

/// Eviction-set prime/probe attacker.
#[derive(Debug)]
pub struct EvictionAttacker {
    handle: MemHandle,
    buffer_bytes: u64,
    cache_bytes: u64,
    eviction_set: Vec<Address>,
    watch: HashSet<Tag>,
    probe_mode: ProbeMode,
    noise_mode: NoiseMode,
    noise_size: f64,
    noise_in_lines: bool,
    noise_ptr: Address,
    mem_accesses: u64,
    noise_accesses: u64,
    target_set_size: Option<u64>,
    target_effectiveness: f64,
    efficiency_test: bool,
    constructed_probability: f64,
    scratch: Vec<CacheResponse>,
}

impl EvictionAttacker {
    /// Allocates the attacker's buffer.
    pub fn new(
        mmu: &mut Mmu,
        probe_mode: ProbeMode,
        noise_mode: NoiseMode,
        noise_size: f64,
        noise_in_lines: bool,
    ) -> Result<EvictionAttacker, crate::common::Error> {
        let cache_bytes = mmu.cache().lines() as u64 * CACHE_LINE_SIZE;
        let buffer_bytes = BUFFER_FACTOR * cache_bytes;
        let handle = mmu.allocate(
            "EvictionSetBuffer",
            buffer_bytes,
            CacheContext::ATTACKER,
            false,
        )?;
        Ok(EvictionAttacker {
            handle,
            buffer_bytes,
            cache_bytes,
            eviction_set: Vec::new(),
            watch: HashSet::new(),
            probe_mode,
            noise_mode,
            noise_size,
            noise_in_lines,
            noise_ptr: 0,
            mem_accesses: 0,
            noise_accesses: 0,
            target_set_size: None,
            target_effectiveness: 0.9,
            efficiency_test: false,
            constructed_probability: 0.0,
            scratch: Vec::with_capacity(8),
        })
    }

    /// Overrides the warmup targets (efficiency sweeps): an explicit set
    /// size and/or an eviction-probability target. Warmup then measures the
    /// set's success rate after every accepted address, so sub-ideal
    /// targets can stop the construction early.
    pub fn set_warmup_targets(&mut self, set_size: Option<u64>, effectiveness: f64) {
        self.target_set_size = set_size;
        self.target_effectiveness = effectiveness;
        self.efficiency_test = true;
    }

    /// Measured success probability of the constructed set.
    pub fn constructed_probability(&self) -> f64 {
        self.constructed_probability
    }

    /// Returns the attacker's buffer to the MMU. Needed when several
    /// attacker generations share one MMU, as the efficiency sweeps do.
    pub fn release(self, mmu: &mut Mmu) {
        mmu.free(self.handle);
    }

    fn read_counted(&mut self, mmu: &mut Mmu, offset: Address) -> bool {
        self.mem_accesses += 1;
        mmu.read(self.handle, offset)
    }
}

impl Attacker for EvictionAttacker {
    fn warmup(&mut self, mmu: &mut Mmu, victim: &mut dyn Victim) -> bool {
        victim::clear_watch(victim, mmu);
        self.eviction_set.clear();
        self.watch.clear();

        let exhausted = !EvictionSetSizeProfiler::create_into(
            mmu,
            victim,
            self.handle,
            &mut self.eviction_set,
            self.target_set_size,
            self.target_effectiveness,
            self.efficiency_test,
        );

        for &address in &self.eviction_set {
            self.watch
                .insert(Tag::of(mmu.translate(self.handle, address)));
        }
        victim::install_watch(victim, mmu, &self.watch);

        self.constructed_probability =
            EvictionSetSizeProfiler::test_eviction_set(mmu, victim, self.handle, &self.eviction_set);

        !exhausted && !self.eviction_set.is_empty()
    }

    fn prime(&mut self, mmu: &mut Mmu) {
        let mut target = self.eviction_set.len();
        if self.noise_mode == NoiseMode::Same {
            target = (self.noise_size * self.eviction_set.len() as f64) as usize;
        }
        for index in 0..target.min(self.eviction_set.len()) {
            let address = self.eviction_set[index];
            self.read_counted(mmu, address);
        }
    }

    fn probe(&mut self, mmu: &mut Mmu) -> ProbeOutcome {
        let mut outcome = ProbeOutcome::default();
        if self.probe_mode == ProbeMode::Victim || self.eviction_set.is_empty() {
            return outcome;
        }

        let top = self.eviction_set.len() - 1;
        let (mut index, floor) = match self.noise_mode {
            NoiseMode::Same => {
                let i = ((self.noise_size * top as f64) as usize).min(top);
                (i, i.saturating_sub(256))
            }
            NoiseMode::ProbeSize => (top, top.saturating_sub(self.noise_size as usize)),
            NoiseMode::Separate => (top, 0),
        };

        let mut scratch = std::mem::take(&mut self.scratch);
        loop {
            let address = self.eviction_set[index];
            scratch.clear();
            self.mem_accesses += 1;
            let hit = mmu.read_with(self.handle, address, &mut scratch);
            if !hit {
                outcome.misses += 1;
                if index == top {
                    outcome.last_miss = true;
                }
            }
            if let Some(last) = scratch.last() {
                if last.eviction {
                    if self.watch.contains(&last.evicted_tag) {
                        outcome.self_evictions += 1;
                    } else {
                        outcome.new_victim_lines += 1;
                    }
                }
            }
            if index == floor {
                break;
            }
            index -= 1;
        }
        self.scratch = scratch;
        outcome
    }

    fn make_noise(&mut self, mmu: &mut Mmu) {
        let target_bytes = if self.noise_in_lines {
            self.noise_size as u64 * CACHE_LINE_SIZE
        } else {
            (self.cache_bytes as f64 * self.noise_size) as u64
        };
        let mut injected = 0;
        while injected < target_bytes {
            mmu.read(self.handle, self.noise_ptr);
            self.noise_accesses += 1;
            self.noise_ptr = (self.noise_ptr + CACHE_LINE_SIZE) % self.buffer_bytes;
            injected += CACHE_LINE_SIZE;
        }
    }

    fn mem_accesses(&self) -> u64 {
        self.mem_accesses
    }

    fn noise_accesses(&self) -> u64 {
        self.noise_accesses
    }

    fn reset_counters(&mut self) {
        self.mem_accesses = 0;
        self.noise_accesses = 0;
    }

    fn eviction_set_size(&self) -> usize {
        self.eviction_set.len()
    }
}
