//! Cache-occupancy attacker.
//!
//! No eviction set: the attacker owns a cache-sized buffer, primes the
//! whole cache, and probes the whole buffer in reverse, using the total
//! miss count as its observation. Warmup streams probes until the miss
//! count bottoms out, which settles any cold-start transient.

use crate::attack::{Attacker, ProbeOutcome};
use crate::common::{Address, CacheContext, CACHE_LINE_SIZE};
use crate::mmu::{MemHandle, Mmu};
use crate::victim::Victim;

/// Probe repetitions at the floor before warmup settles.
const WARMUP_SETTLE_COUNT: u32 = 30;

/// Whole-cache occupancy attacker.
#[derive(Debug)]
pub struct OccupancyAttacker {
    handle: MemHandle,
    cache_bytes: u64,
    mem_accesses: u64,
}

impl OccupancyAttacker {
    /// Allocates the cache-sized buffer.
    pub fn new(mmu: &mut Mmu) -> Result<OccupancyAttacker, crate::common::Error> {
        let cache_bytes = mmu.cache().lines() as u64 * CACHE_LINE_SIZE;
        let handle = mmu.allocate(
            "OccupancyBuffer",
            cache_bytes,
            CacheContext::ATTACKER,
            false,
        )?;
        Ok(OccupancyAttacker {
            handle,
            cache_bytes,
            mem_accesses: 0,
        })
    }

    fn probe_misses(&mut self, mmu: &mut Mmu) -> u32 {
        let mut misses = 0;
        let mut offset = CACHE_LINE_SIZE;
        while offset <= self.cache_bytes {
            self.mem_accesses += 1;
            if !mmu.read(self.handle, self.cache_bytes - offset) {
                misses += 1;
            }
            offset += CACHE_LINE_SIZE;
        }
        misses
    }
}

impl Attacker for OccupancyAttacker {
    fn warmup(&mut self, mmu: &mut Mmu, _victim: &mut dyn Victim) -> bool {
        let lines = (self.cache_bytes / CACHE_LINE_SIZE) as u32;
        let mut floor = lines;
        let mut settled = 0;
        for _ in 0..lines {
            let misses = self.probe_misses(mmu);
            if misses == 0 {
                break;
            }
            if misses >= floor {
                settled += 1;
            } else {
                settled = 0;
                floor = misses;
            }
            if settled == WARMUP_SETTLE_COUNT {
                break;
            }
        }
        u64::from(floor) <= self.cache_bytes / 3
    }

    fn prime(&mut self, mmu: &mut Mmu) {
        let mut offset: Address = 0;
        while offset < self.cache_bytes {
            self.mem_accesses += 1;
            mmu.read(self.handle, offset);
            offset += CACHE_LINE_SIZE;
        }
    }

    fn probe(&mut self, mmu: &mut Mmu) -> ProbeOutcome {
        ProbeOutcome {
            misses: self.probe_misses(mmu),
            ..ProbeOutcome::default()
        }
    }

    fn mem_accesses(&self) -> u64 {
        self.mem_accesses
    }

    fn noise_accesses(&self) -> u64 {
        0
    }

    fn reset_counters(&mut self) {
        self.mem_accesses = 0;
    }
}
