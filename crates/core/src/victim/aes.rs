//! AES T-table victim.
//!
//! AES-128 with the classic four 1 KiB lookup tables. Each main-round
//! column combines four table entries indexed by secret-dependent state
//! bytes, which is exactly the leak this victim exists to produce; the
//! arithmetic itself runs on the S-box so the tables never need their
//! contents materialised.

use crate::cache::CacheResponse;
use crate::common::{Address, CacheContext, Error, Rng};
use crate::mmu::{AccessFilter, MemHandle, Mmu};
use crate::victim::keygen::{self, KeyPair};
use crate::victim::Victim;

/// Bytes per lookup table (256 four-byte entries).
const TABLE_SIZE: Address = 1024;

#[rustfmt::skip]
const SBOX: [u8; 256] = [
    0x63, 0x7c, 0x77, 0x7b, 0xf2, 0x6b, 0x6f, 0xc5, 0x30, 0x01, 0x67, 0x2b, 0xfe, 0xd7, 0xab, 0x76,
    0xca, 0x82, 0xc9, 0x7d, 0xfa, 0x59, 0x47, 0xf0, 0xad, 0xd4, 0xa2, 0xaf, 0x9c, 0xa4, 0x72, 0xc0,
    0xb7, 0xfd, 0x93, 0x26, 0x36, 0x3f, 0xf7, 0xcc, 0x34, 0xa5, 0xe5, 0xf1, 0x71, 0xd8, 0x31, 0x15,
    0x04, 0xc7, 0x23, 0xc3, 0x18, 0x96, 0x05, 0x9a, 0x07, 0x12, 0x80, 0xe2, 0xeb, 0x27, 0xb2, 0x75,
    0x09, 0x83, 0x2c, 0x1a, 0x1b, 0x6e, 0x5a, 0xa0, 0x52, 0x3b, 0xd6, 0xb3, 0x29, 0xe3, 0x2f, 0x84,
    0x53, 0xd1, 0x00, 0xed, 0x20, 0xfc, 0xb1, 0x5b, 0x6a, 0xcb, 0xbe, 0x39, 0x4a, 0x4c, 0x58, 0xcf,
    0xd0, 0xef, 0xaa, 0xfb, 0x43, 0x4d, 0x33, 0x85, 0x45, 0xf9, 0x02, 0x7f, 0x50, 0x3c, 0x9f, 0xa8,
    0x51, 0xa3, 0x40, 0x8f, 0x92, 0x9d, 0x38, 0xf5, 0xbc, 0xb6, 0xda, 0x21, 0x10, 0xff, 0xf3, 0xd2,
    0xcd, 0x0c, 0x13, 0xec, 0x5f, 0x97, 0x44, 0x17, 0xc4, 0xa7, 0x7e, 0x3d, 0x64, 0x5d, 0x19, 0x73,
    0x60, 0x81, 0x4f, 0xdc, 0x22, 0x2a, 0x90, 0x88, 0x46, 0xee, 0xb8, 0x14, 0xde, 0x5e, 0x0b, 0xdb,
    0xe0, 0x32, 0x3a, 0x0a, 0x49, 0x06, 0x24, 0x5c, 0xc2, 0xd3, 0xac, 0x62, 0x91, 0x95, 0xe4, 0x79,
    0xe7, 0xc8, 0x37, 0x6d, 0x8d, 0xd5, 0x4e, 0xa9, 0x6c, 0x56, 0xf4, 0xea, 0x65, 0x7a, 0xae, 0x08,
    0xba, 0x78, 0x25, 0x2e, 0x1c, 0xa6, 0xb4, 0xc6, 0xe8, 0xdd, 0x74, 0x1f, 0x4b, 0xbd, 0x8b, 0x8a,
    0x70, 0x3e, 0xb5, 0x66, 0x48, 0x03, 0xf6, 0x0e, 0x61, 0x35, 0x57, 0xb9, 0x86, 0xc1, 0x1d, 0x9e,
    0xe1, 0xf8, 0x98, 0x11, 0x69, 0xd9, 0x8e, 0x94, 0x9b, 0x1e, 0x87, 0xe9, 0xce, 0x55, 0x28, 0xdf,
    0x8c, 0xa1, 0x89, 0x0d, 0xbf, 0xe6, 0x42, 0x68, 0x41, 0x99, 0x2d, 0x0f, 0xb0, 0x54, 0xbb, 0x16,
];

const RCON: [u8; 10] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80, 0x1B, 0x36];

#[inline]
fn xtime(b: u8) -> u8 {
    (b << 1) ^ (if b & 0x80 != 0 { 0x1B } else { 0 })
}

#[inline]
fn mul3(b: u8) -> u8 {
    xtime(b) ^ b
}

/// AES-128 victim over four shared T-tables.
#[derive(Debug)]
pub struct AesVictim {
    tables: MemHandle,
    round_keys: [[u8; 16]; 11],
    secret: u8,
    key_a: Vec<u8>,
}

impl AesVictim {
    /// Allocates the 4 KiB of shared tables in the victim context.
    pub fn new(mmu: &mut Mmu, filter: AccessFilter) -> Result<AesVictim, Error> {
        let tables = mmu.allocate("AESTTables", 4 * TABLE_SIZE, CacheContext::VICTIM, true)?;
        mmu.set_access_filter(tables, filter);
        mmu.set_victim_target(tables, 0);
        Ok(AesVictim {
            tables,
            round_keys: [[0; 16]; 11],
            secret: 0,
            key_a: vec![0; 16],
        })
    }

    fn expand_key(&mut self, key: &[u8]) {
        let mut words = [[0u8; 4]; 44];
        for (i, word) in words.iter_mut().take(4).enumerate() {
            word.copy_from_slice(&key[i * 4..i * 4 + 4]);
        }
        for i in 4..44 {
            let mut temp = words[i - 1];
            if i % 4 == 0 {
                temp.rotate_left(1);
                for byte in &mut temp {
                    *byte = SBOX[*byte as usize];
                }
                temp[0] ^= RCON[i / 4 - 1];
            }
            for j in 0..4 {
                words[i][j] = words[i - 4][j] ^ temp[j];
            }
        }
        for round in 0..11 {
            for j in 0..16 {
                self.round_keys[round][j] = words[round * 4 + j / 4][j % 4];
            }
        }
    }

    /// One four-table lookup burst with the given index bytes.
    fn tab_access(&self, mmu: &mut Mmu, i0: u8, i1: u8, i2: u8, i3: u8) {
        mmu.read(self.tables, Address::from(i0) * 4);
        mmu.read(self.tables, Address::from(i1) * 4 + TABLE_SIZE);
        mmu.read(self.tables, Address::from(i2) * 4 + 2 * TABLE_SIZE);
        mmu.read(self.tables, Address::from(i3) * 4 + 3 * TABLE_SIZE);
    }
}

impl Victim for AesVictim {
    fn key_size(&self) -> usize {
        16
    }

    fn input_size(&self) -> usize {
        16
    }

    fn output_size(&self) -> usize {
        16
    }

    fn generate_key_pair(&mut self, rng: &mut Rng) -> KeyPair {
        let pair = keygen::aes_key_pair(rng);
        self.key_a = pair.key_a.clone();
        pair
    }

    fn random_plaintext(&mut self, rng: &mut Rng) -> Vec<u8> {
        keygen::aes_plaintext(rng, &self.key_a)
    }

    fn set_key(&mut self, key: &[u8]) {
        self.expand_key(key);
        self.secret = (key[0] >> 4) & 1;
    }

    fn secret(&self) -> u8 {
        self.secret
    }

    fn cipher(&mut self, mmu: &mut Mmu, input: &[u8], output: &mut [u8]) {
        let mut state = [0u8; 16];
        for (slot, byte) in state.iter_mut().zip(input) {
            *slot = *byte;
        }
        for (slot, k) in state.iter_mut().zip(&self.round_keys[0]) {
            *slot ^= k;
        }

        for round in 1..=9 {
            let mut next = [0u8; 16];
            for c in 0..4 {
                let i0 = state[4 * c];
                let i1 = state[(4 * c + 5) % 16];
                let i2 = state[(4 * c + 10) % 16];
                let i3 = state[(4 * c + 15) % 16];
                self.tab_access(mmu, i0, i1, i2, i3);
                let (a0, a1, a2, a3) = (
                    SBOX[i0 as usize],
                    SBOX[i1 as usize],
                    SBOX[i2 as usize],
                    SBOX[i3 as usize],
                );
                let rk = &self.round_keys[round];
                next[4 * c] = xtime(a0) ^ mul3(a1) ^ a2 ^ a3 ^ rk[4 * c];
                next[4 * c + 1] = a0 ^ xtime(a1) ^ mul3(a2) ^ a3 ^ rk[4 * c + 1];
                next[4 * c + 2] = a0 ^ a1 ^ xtime(a2) ^ mul3(a3) ^ rk[4 * c + 2];
                next[4 * c + 3] = mul3(a0) ^ a1 ^ a2 ^ xtime(a3) ^ rk[4 * c + 3];
            }
            state = next;
        }

        // Final round: SubBytes + ShiftRows + AddRoundKey, same lookups.
        let mut next = [0u8; 16];
        for c in 0..4 {
            let i0 = state[4 * c];
            let i1 = state[(4 * c + 5) % 16];
            let i2 = state[(4 * c + 10) % 16];
            let i3 = state[(4 * c + 15) % 16];
            self.tab_access(mmu, i0, i1, i2, i3);
            let rk = &self.round_keys[10];
            next[4 * c] = SBOX[i0 as usize] ^ rk[4 * c];
            next[4 * c + 1] = SBOX[i1 as usize] ^ rk[4 * c + 1];
            next[4 * c + 2] = SBOX[i2 as usize] ^ rk[4 * c + 2];
            next[4 * c + 3] = SBOX[i3 as usize] ^ rk[4 * c + 3];
        }

        for (slot, byte) in output.iter_mut().zip(&next) {
            *slot = *byte;
        }
    }

    fn access_address(&mut self, mmu: &mut Mmu) -> bool {
        mmu.read(self.tables, 0)
    }

    fn access_address_with(&mut self, mmu: &mut Mmu, responses: &mut Vec<CacheResponse>) -> bool {
        mmu.read_with(self.tables, 0, responses)
    }

    fn invalidate_address(&mut self, mmu: &mut Mmu) {
        mmu.flush(self.tables, 0);
    }

    fn has_collision(&self, mmu: &Mmu, handle: MemHandle, offset: Address) -> bool {
        mmu.has_collision(handle, offset, self.tables, 0)
    }

    fn handles(&self) -> Vec<MemHandle> {
        vec![self.tables]
    }
}
