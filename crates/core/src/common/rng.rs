//! Deterministic pseudo-random number generation.
//!
//! Every source of randomness in the simulator — replacement-policy choices,
//! index salts, plaintext generation, noise address selection — draws from a
//! seeded xorshift64 generator, so a run is bit-reproducible given its
//! configuration and seed. Components that need private randomness receive a
//! generator forked from the master seed at construction time; nothing ever
//! reads entropy from the environment.

/// Seeded xorshift64 generator.
#[derive(Clone, Debug)]
pub struct Rng {
    state: u64,
}

impl Rng {
    /// Creates a generator from a seed. A zero seed is remapped, as the
    /// all-zero state is a fixed point of the xorshift step.
    pub fn new(seed: u64) -> Rng {
        let mut rng = Rng {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        };
        // Scramble away from low-entropy seeds.
        for _ in 0..16 {
            rng.next_u64();
        }
        rng
    }

    /// Next raw 64-bit value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform value in `0..bound`. `bound` must be non-zero.
    #[inline]
    pub fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }

    /// Uniform `usize` in `0..bound`. `bound` must be non-zero.
    #[inline]
    pub fn index(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }

    /// Bernoulli draw with probability `p`.
    #[inline]
    pub fn chance(&mut self, p: f64) -> bool {
        // Same shape as the reference throttles: uniform percentile in (0, 1].
        let u = (1 + self.below(100)) as f64 / 100.0;
        u <= p
    }

    /// Next random byte.
    #[inline]
    pub fn next_u8(&mut self) -> u8 {
        (self.next_u64() & 0xFF) as u8
    }

    /// Random boolean.
    #[inline]
    pub fn next_bool(&mut self) -> bool {
        self.next_u64() & 1 == 1
    }

    /// Derives an independent generator for a sub-component.
    pub fn fork(&mut self) -> Rng {
        Rng::new(self.next_u64() ^ 0xD1B5_4A32_D192_ED03)
    }
}
