//! Square-and-multiply modular-exponentiation victim.
//!
//! Left-to-right binary exponentiation over 16-bit limbs with Knuth
//! long-division reduction. A set key bit costs an extra multiply, and the
//! multiply is the only operation that reads the base array, so the base's
//! first line is the secret-carrying target.
//!
//! Limb accesses are deferred through shadow arrays: arithmetic runs on the
//! in-memory values while touched lines are only replayed to the cache at
//! the end of each exponent bit, which compresses the thousands of limb
//! operations per bit into one access per touched line and round.

use crate::cache::CacheResponse;
use crate::common::{Address, CacheContext, Error, Rng, CACHE_LINE_SIZE};
use crate::mmu::{AccessFilter, MemHandle, Mmu};
use crate::victim::keygen::{self, KeyPair};
use crate::victim::Victim;

/// A limb array whose cache traffic is replayed lazily.
#[derive(Debug)]
struct ShadowArray {
    values: Vec<u16>,
    handle: MemHandle,
    read_lines: Vec<bool>,
    write_lines: Vec<bool>,
}

impl ShadowArray {
    fn new(mmu: &mut Mmu, name: &str, limbs: usize) -> Result<ShadowArray, Error> {
        let bytes = (limbs * 2) as Address;
        let handle = mmu.allocate(name, bytes, CacheContext::VICTIM, false)?;
        let lines = bytes.div_ceil(CACHE_LINE_SIZE) as usize;
        Ok(ShadowArray {
            values: vec![0; limbs],
            handle,
            read_lines: vec![false; lines],
            write_lines: vec![false; lines],
        })
    }

    #[inline]
    fn line_of(index: usize) -> usize {
        index * 2 / CACHE_LINE_SIZE as usize
    }

    #[inline]
    fn get(&mut self, index: usize) -> u16 {
        self.read_lines[Self::line_of(index)] = true;
        self.values[index]
    }

    #[inline]
    fn set(&mut self, index: usize, value: u16) {
        self.write_lines[Self::line_of(index)] = true;
        self.values[index] = value;
    }

    /// Replays one read and/or write per touched line, then forgets.
    fn flush(&mut self, mmu: &mut Mmu) {
        for (line, touched) in self.read_lines.iter_mut().enumerate() {
            if *touched {
                mmu.read(self.handle, line as Address * CACHE_LINE_SIZE);
                *touched = false;
            }
        }
        for (line, touched) in self.write_lines.iter_mut().enumerate() {
            if *touched {
                mmu.write(self.handle, line as Address * CACHE_LINE_SIZE);
                *touched = false;
            }
        }
    }
}

/// Square-and-multiply victim.
#[derive(Debug)]
pub struct SquareMultVictim {
    size: usize,
    key_limbs: usize,
    secret_bit: u32,
    key: ShadowArray,
    modulus: ShadowArray,
    base: ShadowArray,
    acc: ShadowArray,
    scratch: ShadowArray,
    secret: u8,
}

impl SquareMultVictim {
    /// Builds the victim for `size`-limb operands and a `key_limbs`-limb
    /// exponent whose `secret_bit` (counted from the top) is the secret.
    ///
    /// The modulus must cover the full operand width (top bit set).
    pub fn new(
        mmu: &mut Mmu,
        key_limbs: usize,
        size: usize,
        modulus: &[u16],
        secret_bit: u32,
        filter: AccessFilter,
    ) -> Result<SquareMultVictim, Error> {
        assert_eq!(modulus.len(), size, "modulus must be full width");
        assert!(
            modulus[size - 1] & 0x8000 != 0,
            "modulus must cover the full bit size"
        );
        assert!(
            secret_bit > 0 && (secret_bit as usize) < key_limbs * 16,
            "secret bit outside the key"
        );

        let key = ShadowArray::new(mmu, "SquareMultKey", key_limbs)?;
        let mut modulus_arr = ShadowArray::new(mmu, "SquareMultModulus", size)?;
        let base = ShadowArray::new(mmu, "SquareMultBase", size)?;
        let acc = ShadowArray::new(mmu, "SquareMultAcc", size * 2 + 1)?;
        let scratch = ShadowArray::new(mmu, "SquareMultScratch", size * 2 + 1)?;

        for (i, &limb) in modulus.iter().enumerate() {
            modulus_arr.set(i, limb);
        }
        for handle in [
            key.handle,
            modulus_arr.handle,
            base.handle,
            acc.handle,
            scratch.handle,
        ] {
            mmu.set_access_filter(handle, filter);
        }
        mmu.set_victim_target(base.handle, 0);

        Ok(SquareMultVictim {
            size,
            key_limbs,
            secret_bit,
            key,
            modulus: modulus_arr,
            base,
            acc,
            scratch,
            secret: 0,
        })
    }

    fn flush_all(&mut self, mmu: &mut Mmu) {
        self.key.flush(mmu);
        self.modulus.flush(mmu);
        self.base.flush(mmu);
        self.acc.flush(mmu);
        self.scratch.flush(mmu);
    }

    /// Squares `acc` into `scratch` (double length).
    fn square(&mut self) {
        let size = self.size;
        for i in 0..size * 2 + 1 {
            self.scratch.set(i, 0);
        }
        for i in 0..size {
            let a = u64::from(self.acc.get(i));
            let mut carry = u64::from(self.scratch.get(2 * i)) + a * a;
            self.scratch.set(2 * i, (carry & 0xFFFF) as u16);
            carry >>= 16;
            for j in i + 1..size {
                carry += 2 * a * u64::from(self.acc.get(j)) + u64::from(self.scratch.get(i + j));
                self.scratch.set(i + j, (carry & 0xFFFF) as u16);
                carry >>= 16;
            }
            carry += u64::from(self.scratch.get(i + size));
            self.scratch.set(i + size, (carry & 0xFFFF) as u16);
        }
    }

    /// Multiplies `acc` by `base` into `scratch` (double length).
    fn multiply(&mut self) {
        let size = self.size;
        for i in 0..size * 2 + 1 {
            self.scratch.set(i, 0);
        }
        for i in 0..size {
            let b = u64::from(self.base.get(i));
            let mut carry = 0u64;
            for j in 0..size {
                carry += u64::from(self.acc.get(j)) * b + u64::from(self.scratch.get(i + j));
                self.scratch.set(i + j, (carry & 0xFFFF) as u16);
                carry >>= 16;
            }
            self.scratch.set(i + size, carry as u16);
        }
    }

    /// Reduces `scratch` modulo `modulus`, leaving the remainder in `acc`.
    ///
    /// Knuth Algorithm D without normalisation; the constructor guarantees
    /// the divisor's top bit is set.
    fn reduce(&mut self) {
        let size = self.size;
        for i in 0..size {
            self.acc.set(i, 0);
        }

        for j in (0..=size).rev() {
            // Estimate the quotient limb from the top of the window.
            let m1 = u64::from(self.modulus.get(size - 1));
            let hat = (u64::from(self.scratch.get(j + size)) << 16)
                + u64::from(self.scratch.get(j + size - 1));
            let mut qhat = hat / m1;
            let mut rhat = hat % m1;
            while qhat >= 0x10000
                || (size > 1
                    && qhat * u64::from(self.modulus.get(size - 2))
                        > (rhat << 16) + u64::from(self.scratch.get(j + size - 2)))
            {
                qhat -= 1;
                rhat += m1;
                if rhat >= 0x10000 {
                    break;
                }
            }

            // Subtract qhat * modulus from the window.
            let mut borrow: i64 = 0;
            for i in 0..size {
                let diff = i64::from(self.scratch.get(j + i)) + borrow
                    - qhat as i64 * i64::from(self.modulus.get(i));
                self.scratch.set(j + i, (diff & 0xFFFF) as u16);
                borrow = diff >> 16;
            }
            let top = i64::from(self.scratch.get(j + size)) + borrow;
            self.scratch.set(j + size, (top & 0xFFFF) as u16);

            // Underflow: add the modulus back and drop the quotient by one.
            if top < 0 {
                let mut carry = 0u64;
                for i in 0..size {
                    let sum = u64::from(self.scratch.get(j + i))
                        + u64::from(self.modulus.get(i))
                        + carry;
                    self.scratch.set(j + i, (sum & 0xFFFF) as u16);
                    carry = sum >> 16;
                }
                let t = u64::from(self.scratch.get(j + size)) + carry;
                self.scratch.set(j + size, (t & 0xFFFF) as u16);
                qhat -= 1;
            }
            self.acc.set(j, qhat as u16);
        }

        for i in 0..size {
            let limb = self.scratch.get(i);
            self.acc.set(i, limb);
        }
    }

    fn modexp(&mut self, mmu: &mut Mmu) {
        for i in 0..self.size * 2 + 1 {
            self.scratch.set(i, 0);
        }
        for i in 1..self.size {
            self.acc.set(i, 0);
        }
        self.acc.set(0, 1);

        for i in (0..self.key_limbs).rev() {
            let k = self.key.get(i);
            for bit in (0..16).rev() {
                self.square();
                self.reduce();
                if k & (1 << bit) != 0 {
                    self.multiply();
                    self.reduce();
                }
                self.flush_all(mmu);
            }
        }
    }
}

impl Victim for SquareMultVictim {
    fn key_size(&self) -> usize {
        self.key_limbs * 2
    }

    fn input_size(&self) -> usize {
        self.size * 2
    }

    fn output_size(&self) -> usize {
        self.size * 2
    }

    fn generate_key_pair(&mut self, rng: &mut Rng) -> KeyPair {
        keygen::square_mult_key_pair(rng, self.key_limbs * 2, self.secret_bit)
    }

    fn random_plaintext(&mut self, rng: &mut Rng) -> Vec<u8> {
        keygen::square_mult_plaintext(rng, self.size * 2)
    }

    fn set_key(&mut self, key: &[u8]) {
        for i in 0..self.key_limbs {
            let limb = u16::from_le_bytes([key[2 * i], key[2 * i + 1]]);
            self.key.set(i, limb);
        }
        let bit = self.key_limbs as u32 * 16 - self.secret_bit;
        self.secret = (key[(bit / 8) as usize] >> (bit % 8)) & 1;
    }

    fn secret(&self) -> u8 {
        self.secret
    }

    fn cipher(&mut self, mmu: &mut Mmu, input: &[u8], output: &mut [u8]) {
        for i in 0..self.size {
            let limb = if input.len() >= 2 * i + 2 {
                u16::from_le_bytes([input[2 * i], input[2 * i + 1]])
            } else {
                0
            };
            self.base.set(i, limb);
        }

        self.modexp(mmu);

        for i in 0..self.size {
            if output.len() >= 2 * i + 2 {
                let limb = self.acc.get(i);
                output[2 * i..2 * i + 2].copy_from_slice(&limb.to_le_bytes());
            }
        }
    }

    fn access_address(&mut self, mmu: &mut Mmu) -> bool {
        mmu.read(self.base.handle, 0)
    }

    fn access_address_with(&mut self, mmu: &mut Mmu, responses: &mut Vec<CacheResponse>) -> bool {
        mmu.read_with(self.base.handle, 0, responses)
    }

    fn invalidate_address(&mut self, mmu: &mut Mmu) {
        mmu.flush(self.base.handle, 0);
    }

    fn has_collision(&self, mmu: &Mmu, handle: MemHandle, offset: Address) -> bool {
        mmu.has_collision(handle, offset, self.base.handle, 0)
    }

    fn handles(&self) -> Vec<MemHandle> {
        vec![
            self.key.handle,
            self.modulus.handle,
            self.base.handle,
            self.acc.handle,
            self.scratch.handle,
        ]
    }
}
