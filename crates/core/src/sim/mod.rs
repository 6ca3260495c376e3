//! Measurement controllers.
//!
//! One experiment = one configuration document + one measurement:
//! 1. **attacker** — repeated warmup + train runs against a chosen victim,
//!    reporting whether (and how fast) the keys were distinguished.
//! 2. **profiling** — every eviction-set profiler against a single-access
//!    victim, reduced to min/max/mean/median result rows.
//! 3. **efficiency** — sweeps of attack cost against eviction probability,
//!    eviction-set size, or noise, plus a two-axis heatmap mode.
//! 4. **entropy** — information flow from victim accesses to the eviction
//!    pattern an attacker can observe, in bits.
//!
//! Controllers rebuild the cache and MMU from the configuration for every
//! outer iteration, so no state leaks between statistical runs.

/// The attacker measurement.
pub mod attack_run;

/// The efficiency sweeps.
pub mod efficiency;

/// The entropy measurement.
pub mod entropy;

/// The profiling evaluation.
pub mod profiling_run;

use std::path::PathBuf;

use crate::attack::{Attacker, AttackConfig, EvictionAttacker, OccupancyAttacker};
use crate::common::{Error, Rng};
use crate::config::Config;
use crate::mmu::{AccessFilter, Mmu};
use crate::victim::{AesVictim, BinaryVictim, SingleAccessVictim, SquareMultVictim, Victim};

pub use attack_run::run_attack_measurement;
pub use efficiency::{run_efficiency_measurement, EfficacyMode, SweepRange};
pub use entropy::run_entropy_measurement;
pub use profiling_run::run_profiling_measurement;

/// Victim selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VictimKind {
    /// AES T-table victim.
    Aes,
    /// Square-and-multiply modular exponentiation.
    SquareMult,
    /// Single-access victim.
    Single,
    /// Binary two-address victim.
    Binary,
}

/// Attacker selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttackerKind {
    /// Whole-cache occupancy attacker.
    Occupancy,
    /// Eviction-set attacker.
    Eviction,
}

/// Everything an experiment needs besides its sweep parameters.
#[derive(Clone, Debug)]
pub struct ExperimentOptions {
    /// Cache-hierarchy description.
    pub config: Config,
    /// CSV output path; `None` logs to the console only.
    pub output: Option<PathBuf>,
    /// Victim under attack.
    pub victim: VictimKind,
    /// Attacker strategy.
    pub attacker: AttackerKind,
    /// Outer repeat count.
    pub repeats: u32,
    /// Driver parameters.
    pub attack: AttackConfig,
    /// Victim access-type filter (constant-time simulation).
    pub access_filter: AccessFilter,
    /// Master PRNG seed.
    pub seed: u64,
}

/// Square-and-multiply victim geometry used by the measurements.
const SQUARE_MULT_LIMBS: usize = 32;
const SQUARE_MULT_KEY_LIMBS: usize = 2;
const SQUARE_MULT_SECRET_BIT: u32 = 7;

/// Builds the selected victim against `mmu`.
pub(crate) fn build_victim(
    kind: VictimKind,
    mmu: &mut Mmu,
    filter: AccessFilter,
    rng: &mut Rng,
) -> Result<Box<dyn Victim>, Error> {
    Ok(match kind {
        VictimKind::Aes => Box::new(AesVictim::new(mmu, filter)?),
        VictimKind::SquareMult => {
            let modulus: Vec<u16> = (0..SQUARE_MULT_LIMBS)
                .map(|i| 0xFFFF - i as u16)
                .collect();
            Box::new(SquareMultVictim::new(
                mmu,
                SQUARE_MULT_KEY_LIMBS,
                SQUARE_MULT_LIMBS,
                &modulus,
                SQUARE_MULT_SECRET_BIT,
                filter,
            )?)
        }
        VictimKind::Single => {
            let bytes = mmu.cache().lines() as u64 * crate::common::CACHE_LINE_SIZE;
            Box::new(SingleAccessVictim::with_random_address(mmu, bytes, rng)?)
        }
        VictimKind::Binary => Box::new(BinaryVictim::new(mmu, filter, rng)?),
    })
}

/// Builds the selected attacker against `mmu`.
pub(crate) fn build_attacker(
    kind: AttackerKind,
    mmu: &mut Mmu,
    attack: &AttackConfig,
) -> Result<Box<dyn Attacker>, Error> {
    Ok(match kind {
        AttackerKind::Occupancy => Box::new(OccupancyAttacker::new(mmu)?),
        AttackerKind::Eviction => Box::new(EvictionAttacker::new(
            mmu,
            attack.probe_mode,
            attack.noise_mode,
            attack.noise_size,
            attack.noise_in_lines,
        )?),
    })
}

impl VictimKind {
    /// Report name.
    pub fn name(self) -> &'static str {
        match self {
            VictimKind::Aes => "AES",
            VictimKind::SquareMult => "SquareMult",
            VictimKind::Single => "single",
            VictimKind::Binary => "binary",
        }
    }
}

impl AttackerKind {
    /// Report name.
    pub fn name(self) -> &'static str {
        match self {
            AttackerKind::Occupancy => "occupancy",
            AttackerKind::Eviction => "eviction",
        }
    }
}
