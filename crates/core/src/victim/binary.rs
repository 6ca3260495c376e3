//! Binary victim: a one-bit secret chooses between two fixed addresses.

use crate::cache::CacheResponse;
use crate::common::{Address, CacheContext, Error, Rng, CACHE_LINE_SIZE};
use crate::mmu::{AccessFilter, MemHandle, Mmu};
use crate::victim::keygen::{self, KeyPair};
use crate::victim::Victim;

/// Victim that reads address A when the key bit is set, B otherwise.
#[derive(Debug)]
pub struct BinaryVictim {
    handle: MemHandle,
    address_a: Address,
    address_b: Address,
    key: u8,
}

impl BinaryVictim {
    /// Allocates a cache-sized buffer and draws the two addresses at least
    /// one line apart. Address A is the victim target.
    pub fn new(mmu: &mut Mmu, filter: AccessFilter, rng: &mut Rng) -> Result<BinaryVictim, Error> {
        let size = mmu.cache().lines() as Address * CACHE_LINE_SIZE;
        let handle = mmu.allocate("BinaryVictimBuffer", size, CacheContext::VICTIM, true)?;
        mmu.set_access_filter(handle, filter);

        let address_a = rng.below(size);
        let address_b = loop {
            let candidate = rng.below(size);
            if candidate.abs_diff(address_a) >= CACHE_LINE_SIZE {
                break candidate;
            }
        };
        mmu.set_victim_target(handle, address_a);

        Ok(BinaryVictim {
            handle,
            address_a,
            address_b,
            key: 0,
        })
    }

    fn secret_address(&self) -> Address {
        if self.key != 0 {
            self.address_a
        } else {
            self.address_b
        }
    }

    /// The target address (read when the key bit is set).
    pub fn address_a(&self) -> Address {
        self.address_a
    }

    /// The alternative address (read when the key bit is clear).
    pub fn address_b(&self) -> Address {
        self.address_b
    }
}

impl Victim for BinaryVictim {
    fn key_size(&self) -> usize {
        1
    }

    fn input_size(&self) -> usize {
        0
    }

    fn output_size(&self) -> usize {
        0
    }

    fn generate_key_pair(&mut self, _rng: &mut Rng) -> KeyPair {
        keygen::binary_key_pair()
    }

    fn random_plaintext(&mut self, _rng: &mut Rng) -> Vec<u8> {
        vec![0]
    }

    fn set_key(&mut self, key: &[u8]) {
        self.key = key[0];
    }

    fn secret(&self) -> u8 {
        self.key & 1
    }

    fn cipher(&mut self, mmu: &mut Mmu, _input: &[u8], _output: &mut [u8]) {
        // The key bit picks the line; this is the whole leak.
        mmu.read(self.handle, self.secret_address());
    }

    fn access_address(&mut self, mmu: &mut Mmu) -> bool {
        // Profilers probe the secret-carrying line, which is the target
        // address regardless of the currently installed key.
        mmu.read(self.handle, self.address_a)
    }

    fn access_address_with(&mut self, mmu: &mut Mmu, responses: &mut Vec<CacheResponse>) -> bool {
        mmu.read_with(self.handle, self.address_a, responses)
    }

    fn invalidate_address(&mut self, mmu: &mut Mmu) {
        mmu.flush(self.handle, self.address_a);
    }

    fn has_collision(&self, mmu: &Mmu, handle: MemHandle, offset: Address) -> bool {
        mmu.has_collision(handle, offset, self.handle, self.address_a)
    }

    fn handles(&self) -> Vec<MemHandle> {
        vec![self.handle]
    }
}
