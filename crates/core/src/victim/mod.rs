//! Victim workloads.
//!
//! A victim is a stateful workload whose memory accesses depend on a
//! secret. The contract is deliberately thin: key-pair generation (two keys
//! differing in one secret bit or byte), plaintext generation, the cipher
//! call that drives the cache, and single-line probes for profilers that
//! target the one secret-carrying line. Victims own only handle ids; every
//! access borrows the MMU for the duration of the call.
//!
//! Telemetry is driver-installed: before a victim call the driver places an
//! eviction-set watch on the victim's handles through [`install_watch`],
//! and afterwards reads and resets the harvested counters.

/// AES T-table victim.
pub mod aes;

/// Two-address binary victim.
pub mod binary;

/// Key-pair and plaintext generators.
pub mod keygen;

/// Single-access victim.
pub mod single;

/// Square-and-multiply modular-exponentiation victim.
pub mod square_mult;

use std::collections::HashSet;

use crate::cache::CacheResponse;
use crate::common::{Address, Rng, Tag};
use crate::mmu::{MemHandle, Mmu};

pub use aes::AesVictim;
pub use binary::BinaryVictim;
pub use keygen::KeyPair;
pub use single::SingleAccessVictim;
pub use square_mult::SquareMultVictim;

/// The victim contract.
pub trait Victim {
    /// Key size in bytes.
    fn key_size(&self) -> usize;

    /// Cipher input size in bytes.
    fn input_size(&self) -> usize;

    /// Cipher output size in bytes.
    fn output_size(&self) -> usize;

    /// Draws a fresh pair of keys differing in exactly the secret.
    fn generate_key_pair(&mut self, rng: &mut Rng) -> KeyPair;

    /// Draws a plaintext whose secret-unrelated bits are uniform.
    fn random_plaintext(&mut self, rng: &mut Rng) -> Vec<u8>;

    /// Installs a key.
    fn set_key(&mut self, key: &[u8]);

    /// The secret distilled from the installed key.
    fn secret(&self) -> u8;

    /// Runs the cipher, driving the victim's access pattern.
    fn cipher(&mut self, mmu: &mut Mmu, input: &[u8], output: &mut [u8]);

    /// Touches the victim's secret-carrying line. Returns hit/miss.
    fn access_address(&mut self, mmu: &mut Mmu) -> bool;

    /// Touches the secret-carrying line, collecting the cache responses.
    fn access_address_with(&mut self, mmu: &mut Mmu, responses: &mut Vec<CacheResponse>) -> bool;

    /// Flushes the secret-carrying line.
    fn invalidate_address(&mut self, mmu: &mut Mmu);

    /// Whether `offset` of `handle` could collide with the secret line.
    fn has_collision(&self, mmu: &Mmu, handle: MemHandle, offset: Address) -> bool;

    /// Every handle the victim accesses, for telemetry installation.
    fn handles(&self) -> Vec<MemHandle>;
}

/// Installs an attacker eviction-set watch on all victim handles.
pub fn install_watch(victim: &dyn Victim, mmu: &mut Mmu, watch: &HashSet<Tag>) {
    for handle in victim.handles() {
        mmu.install_watch(handle, watch.clone());
    }
}

/// Removes the watch from all victim handles.
pub fn clear_watch(victim: &dyn Victim, mmu: &mut Mmu) {
    for handle in victim.handles() {
        mmu.clear_watch(handle);
    }
}

/// Sum of watched-line displacements across the victim's handles.
pub fn attacker_addresses_evicted(victim: &dyn Victim, mmu: &Mmu) -> u64 {
    victim
        .handles()
        .iter()
        .map(|&h| mmu.attacker_addresses_evicted(h))
        .sum()
}

/// Zeroes the watched-displacement counters.
pub fn reset_attacker_addresses_evicted(victim: &dyn Victim, mmu: &mut Mmu) {
    for handle in victim.handles() {
        mmu.reset_attacker_addresses_evicted(handle);
    }
}

/// Sum of target-attributed displacements.
pub fn correct_evictions(victim: &dyn Victim, mmu: &Mmu) -> u64 {
    victim
        .handles()
        .iter()
        .map(|&h| mmu.correct_evictions(h))
        .sum()
}

/// Sum of non-target-attributed displacements.
pub fn incorrect_evictions(victim: &dyn Victim, mmu: &Mmu) -> u64 {
    victim
        .handles()
        .iter()
        .map(|&h| mmu.incorrect_evictions(h))
        .sum()
}

/// Zeroes the correct/incorrect attribution counters.
pub fn reset_eviction_split(victim: &dyn Victim, mmu: &mut Mmu) {
    for handle in victim.handles() {
        mmu.reset_eviction_split(handle);
    }
}

/// Number of distinct victim lines that displaced watched lines.
pub fn unique_victim_tags(victim: &dyn Victim, mmu: &Mmu) -> u64 {
    victim.handles().iter().map(|&h| mmu.unique_tags(h)).sum()
}

/// Forgets the distinct-line records.
pub fn clear_unique_victim_tags(victim: &dyn Victim, mmu: &mut Mmu) {
    for handle in victim.handles() {
        mmu.clear_unique_tags(handle);
    }
}
