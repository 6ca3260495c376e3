//! Common types shared by every component of the simulator.
//!
//! This module provides the fundamental building blocks of the simulation:
//! 1. **Tags and addresses:** line tags with their sentinel values, the flat
//!    simulated address space, and the cache-line constant.
//! 2. **Contexts:** security-domain identifiers used to route and attribute
//!    cache accesses.
//! 3. **PRNG:** the seeded xorshift generator behind every source of
//!    simulated randomness.
//! 4. **Errors:** the crate-wide error type.

/// Security-domain / core identifiers.
pub mod context;

/// Crate-wide error type.
pub mod error;

/// Deterministic pseudo-random number generation.
pub mod rng;

/// Line tags, addresses, and related constants.
pub mod types;

pub use context::CacheContext;
pub use error::Error;
pub use rng::Rng;
pub use types::{Address, Tag, CACHE_LINE_SIZE};
