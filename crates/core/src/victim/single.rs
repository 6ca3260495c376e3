//! Single-access victim: one secret line, touched once per call.
//!
//! The simplest possible victim, and the reference workload for the
//! profiling evaluations: every cipher call reads exactly one line, so an
//! attacker observation is either that line's eviction or noise.

use crate::cache::CacheResponse;
use crate::common::{Address, CacheContext, Error, Rng};
use crate::mmu::{MemHandle, Mmu};
use crate::victim::keygen::{self, KeyPair};
use crate::victim::Victim;

/// Victim that reads one fixed line per invocation.
#[derive(Debug)]
pub struct SingleAccessVictim {
    handle: MemHandle,
    size: Address,
    address: Address,
}

impl SingleAccessVictim {
    /// Allocates a `size`-byte region in the victim context.
    pub fn new(mmu: &mut Mmu, size: Address) -> Result<SingleAccessVictim, Error> {
        let handle = mmu.allocate("SAVictim", size, CacheContext::VICTIM, true)?;
        Ok(SingleAccessVictim {
            handle,
            size,
            address: 0,
        })
    }

    /// Allocates with a uniformly random secret line.
    pub fn with_random_address(
        mmu: &mut Mmu,
        size: Address,
        rng: &mut Rng,
    ) -> Result<SingleAccessVictim, Error> {
        let mut victim = SingleAccessVictim::new(mmu, size)?;
        victim.set_address(mmu, rng.below(size));
        Ok(victim)
    }

    /// Places the secret line. The offset wraps into the allocation.
    pub fn set_address(&mut self, mmu: &mut Mmu, address: Address) {
        self.address = address % self.size;
        mmu.set_victim_target(self.handle, self.address);
    }

    /// Current secret-line offset.
    pub fn address(&self) -> Address {
        self.address
    }
}

impl Victim for SingleAccessVictim {
    fn key_size(&self) -> usize {
        1
    }

    fn input_size(&self) -> usize {
        1
    }

    fn output_size(&self) -> usize {
        1
    }

    fn generate_key_pair(&mut self, _rng: &mut Rng) -> KeyPair {
        keygen::binary_key_pair()
    }

    fn random_plaintext(&mut self, _rng: &mut Rng) -> Vec<u8> {
        vec![0]
    }

    fn set_key(&mut self, _key: &[u8]) {}

    fn secret(&self) -> u8 {
        0
    }

    fn cipher(&mut self, mmu: &mut Mmu, _input: &[u8], _output: &mut [u8]) {
        self.access_address(mmu);
    }

    fn access_address(&mut self, mmu: &mut Mmu) -> bool {
        mmu.read(self.handle, self.address)
    }

    fn access_address_with(&mut self, mmu: &mut Mmu, responses: &mut Vec<CacheResponse>) -> bool {
        mmu.read_with(self.handle, self.address, responses)
    }

    fn invalidate_address(&mut self, mmu: &mut Mmu) {
        mmu.flush(self.handle, self.address);
    }

    fn has_collision(&self, mmu: &Mmu, handle: MemHandle, offset: Address) -> bool {
        mmu.has_collision(handle, offset, self.handle, self.address)
    }

    fn handles(&self) -> Vec<MemHandle> {
        vec![self.handle]
    }
}
