//! CacheFX core: a simulation framework for evaluating the side-channel
//! resistance of CPU data caches.
//!
//! Given a cache organisation — geometry, indexing function, replacement
//! policy, partitioning — the framework runs victim workloads alongside an
//! attacker and measures how precisely the attacker can infer the victim's
//! secret-dependent accesses. The crate provides:
//! 1. **Cache models:** the variant catalogue behind one uniform
//!    access/eviction contract (`cache`).
//! 2. **MMU layer:** named allocations, tag translation, access filters,
//!    and per-handle eviction telemetry (`mmu`).
//! 3. **Victims:** secret-dependent workloads behind a fixed contract
//!    (`victim`).
//! 4. **Profilers:** eviction-set construction algorithms (`profiling`).
//! 5. **Attack driver:** prime/probe training with a confidence-interval
//!    distinguisher (`attack`).
//! 6. **Measurements:** the attacker, profiling, efficiency, and entropy
//!    experiment controllers (`sim`) with CSV reporting (`report`).
//!
//! Timing is abstract (hit/miss/eviction events only) and every run is
//! bit-reproducible given its configuration document and seed.

/// Prime/probe attack driver and attacker strategies.
pub mod attack;

/// Cache models and replacement policies.
pub mod cache;

/// Tags, contexts, PRNG, and errors.
pub mod common;

/// Configuration documents and the hierarchy builder.
pub mod config;

/// Keyed index permutations.
pub mod crypto;

/// MMU and memory handles.
pub mod mmu;

/// Eviction-set construction engine.
pub mod profiling;

/// CSV result writing.
pub mod report;

/// Measurement controllers.
pub mod sim;

/// Streaming aggregates and batch statistics.
pub mod stats;

/// Victim workloads.
pub mod victim;

pub use crate::cache::{Cache, CacheResponse, ReplacementPolicy};
pub use crate::common::{CacheContext, Error, Rng, Tag};
pub use crate::config::Config;
pub use crate::mmu::{AccessFilter, MemHandle, Mmu};
