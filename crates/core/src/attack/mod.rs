//! The prime/probe attack driver.
//!
//! The driver decides, with quantified confidence, whether a victim's two
//! keys produce statistically distinguishable cache observations. Each
//! iteration primes the cache, lets the victim encrypt under key A,
//! probes, repeats for key B, optionally injects noise to dislodge stuck
//! victim lines, and feeds the streaming accumulators. The distinguisher
//! is a per-key 99% confidence-interval test: success requires disjoint
//! intervals and a minimum separation of the means, evaluated only once a
//! minimum number of sample pairs exists.

/// Eviction-set attacker strategy.
pub mod eviction;

/// Cache-occupancy attacker strategy.
pub mod occupancy;

use crate::common::Rng;
use crate::mmu::Mmu;
use crate::stats::{Running, Z_99};
use crate::victim::{self, KeyPair, Victim};

pub use eviction::EvictionAttacker;
pub use occupancy::OccupancyAttacker;

/// Sample pairs required before the distinguisher may fire.
const MIN_SAMPLES: u64 = 8;

/// How the attacker derives its per-round observation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProbeMode {
    /// The attacker counts its own probe misses (self-eviction adds noise).
    #[default]
    Attacker,
    /// Only the last probe access counts; the tightest signal under LRU.
    Last,
    /// No probe; trust the victim-side count of attacker-line evictions.
    Victim,
}

/// Where noise accesses come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NoiseMode {
    /// A separate stride of attacker lines, injected when probes go quiet.
    #[default]
    Separate,
    /// Noise folded into the prime/probe window as a fraction of the set.
    Same,
    /// A fixed number of probe slots sacrificed to noise.
    ProbeSize,
}

/// Driver parameters for one attack.
#[derive(Clone, Debug)]
pub struct AttackConfig {
    /// Iteration bound before giving up.
    pub give_up: u32,
    /// Observation source.
    pub probe_mode: ProbeMode,
    /// Noise placement.
    pub noise_mode: NoiseMode,
    /// Noise amount; a cache fraction, set fraction, or slot count
    /// depending on the mode.
    pub noise_size: f64,
    /// When true, noise is injected every iteration instead of only on
    /// all-zero observations.
    pub always_noise: bool,
    /// When true, `noise_size` counts lines rather than cache fractions.
    pub noise_in_lines: bool,
    /// Minimum separation of the means for the distinguisher.
    pub margin: f64,
}

impl Default for AttackConfig {
    fn default() -> AttackConfig {
        AttackConfig {
            give_up: 10_000,
            probe_mode: ProbeMode::default(),
            noise_mode: NoiseMode::default(),
            noise_size: 0.1,
            always_noise: false,
            noise_in_lines: false,
            margin: 0.1,
        }
    }
}

/// One probe's observation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProbeOutcome {
    /// Probe misses.
    pub misses: u32,
    /// Whether the first-probed (most recently primed) line missed.
    pub last_miss: bool,
    /// Probe-caused displacements of the attacker's own lines.
    pub self_evictions: u32,
    /// Probe-caused displacements of previously unseen lines.
    pub new_victim_lines: u32,
}

/// An attacker strategy: how to warm up, prime, probe, and make noise.
pub trait Attacker {
    /// Prepares the attacker against the victim (e.g. constructs the
    /// eviction set and installs the victim-side watch). Returns false
    /// when preparation failed; the driver continues and records it.
    fn warmup(&mut self, mmu: &mut Mmu, victim: &mut dyn Victim) -> bool;

    /// Fills the cache with the attacker's lines.
    fn prime(&mut self, mmu: &mut Mmu);

    /// Re-reads the attacker's lines and reports the observation.
    fn probe(&mut self, mmu: &mut Mmu) -> ProbeOutcome;

    /// Injects noise accesses; strategies without a noise stream do
    /// nothing.
    fn make_noise(&mut self, _mmu: &mut Mmu) {}

    /// Prime/probe accesses so far.
    fn mem_accesses(&self) -> u64;

    /// Noise accesses so far.
    fn noise_accesses(&self) -> u64;

    /// Zeroes the access counters.
    fn reset_counters(&mut self);

    /// Size of the constructed eviction set (0 for occupancy attacks).
    fn eviction_set_size(&self) -> usize {
        0
    }
}

/// Everything one training run produced.
#[derive(Clone, Debug, Default)]
pub struct TrainOutcome {
    /// Whether the distinguisher fired before the give-up bound.
    pub success: bool,
    /// Sample pairs accumulated.
    pub iterations: u32,
    /// Victim cipher invocations.
    pub victim_calls: u64,
    /// Attacker prime/probe accesses.
    pub mem_accesses: u64,
    /// Attacker noise accesses.
    pub noise_accesses: u64,
    /// Key-A observations.
    pub a: Running,
    /// Key-B observations.
    pub b: Running,
    /// Victim-reported attacker evictions under key A.
    pub a_real: Running,
    /// Victim-reported attacker evictions under key B.
    pub b_real: Running,
    /// Self-eviction residuals (`a - a_real`).
    pub a_self: Running,
    /// Self-eviction residuals (`b - b_real`).
    pub b_self: Running,
    /// |sum(a) - sum(b)| at exit.
    pub ab_diff: f64,
    /// Probe self-eviction rate accumulated over all probes.
    pub self_eviction_rate: f64,
    /// Absolute self-eviction count over all probes.
    pub self_evictions: f64,
    /// Distinct victim lines observed displacing probe lines.
    pub unique_victim_lines: u64,
    /// Watched displacements attributed to the victim target.
    pub correct_evictions: u64,
    /// Watched displacements attributed elsewhere.
    pub incorrect_evictions: u64,
}

impl TrainOutcome {
    /// Fraction of attributed displacements that hit the target line.
    pub fn correct_eviction_rate(&self) -> f64 {
        let total = self.correct_evictions + self.incorrect_evictions;
        if total == 0 {
            0.0
        } else {
            self.correct_evictions as f64 / total as f64
        }
    }
}

/// Confidence intervals are disjoint and the means separated by `margin`.
fn distinguished(a: &Running, b: &Running, margin: f64) -> bool {
    if a.count() < MIN_SAMPLES || b.count() < MIN_SAMPLES {
        return false;
    }
    let half_a = a.ci_half_width(Z_99);
    let half_b = b.ci_half_width(Z_99);
    let disjoint =
        a.mean() + half_a < b.mean() - half_b || b.mean() + half_b < a.mean() - half_a;
    disjoint && (a.mean() - b.mean()).abs() >= margin
}

/// One victim call: reset telemetry, encrypt, harvest.
fn victim_call(
    mmu: &mut Mmu,
    victim: &mut dyn Victim,
    key: &[u8],
    input: &[u8],
    output: &mut [u8],
    outcome: &mut TrainOutcome,
) -> u64 {
    victim.set_key(key);
    victim::reset_attacker_addresses_evicted(victim, mmu);
    victim::reset_eviction_split(victim, mmu);

    victim.cipher(mmu, input, output);
    outcome.victim_calls += 1;

    let real = victim::attacker_addresses_evicted(victim, mmu);
    outcome.correct_evictions += victim::correct_evictions(victim, mmu);
    outcome.incorrect_evictions += victim::incorrect_evictions(victim, mmu);
    real
}

/// Runs the full training loop against one key pair.
pub fn train(
    attacker: &mut dyn Attacker,
    mmu: &mut Mmu,
    victim: &mut dyn Victim,
    keys: &KeyPair,
    config: &AttackConfig,
    rng: &mut Rng,
) -> TrainOutcome {
    let mut outcome = TrainOutcome::default();
    let mut output = vec![0u8; victim.output_size()];

    for _ in 0..config.give_up {
        // Key A round.
        attacker.prime(mmu);
        let input = victim.random_plaintext(rng);
        let a_real = victim_call(mmu, victim, &keys.key_a, &input, &mut output, &mut outcome);
        let probe_a = attacker.probe(mmu);

        // Key B round.
        attacker.prime(mmu);
        let input = victim.random_plaintext(rng);
        let b_real = victim_call(mmu, victim, &keys.key_b, &input, &mut output, &mut outcome);
        let probe_b = attacker.probe(mmu);

        let (mut a, mut b) = (f64::from(probe_a.misses), f64::from(probe_b.misses));
        match config.probe_mode {
            ProbeMode::Attacker => {}
            ProbeMode::Last => {
                a = f64::from(u8::from(probe_a.last_miss));
                b = f64::from(u8::from(probe_b.last_miss));
            }
            ProbeMode::Victim => {
                a = a_real as f64;
                b = b_real as f64;
            }
        }

        // When nothing moved (or unconditionally, if asked), dislodge
        // stuck victim lines with a separate noise stride and re-prime.
        if config.noise_mode == NoiseMode::Separate
            && (config.always_noise || (a == 0.0 && b == 0.0))
        {
            attacker.make_noise(mmu);
            attacker.prime(mmu);
        }

        outcome.a.push(a);
        outcome.b.push(b);
        outcome.a_real.push(a_real as f64);
        outcome.b_real.push(b_real as f64);
        outcome.a_self.push(a - a_real as f64);
        outcome.b_self.push(b - b_real as f64);

        let evset = attacker.eviction_set_size();
        if evset > 0 {
            let per_probe = f64::from(probe_a.self_evictions + probe_b.self_evictions);
            outcome.self_eviction_rate += per_probe / evset as f64;
            outcome.self_evictions += per_probe;
        }
        outcome.unique_victim_lines +=
            u64::from(probe_a.new_victim_lines + probe_b.new_victim_lines);
        outcome.iterations += 1;

        if distinguished(&outcome.a, &outcome.b, config.margin) {
            outcome.success = true;
            tracing::debug!(
                iterations = outcome.iterations,
                a_mean = outcome.a.mean(),
                b_mean = outcome.b.mean(),
                "distinguisher fired"
            );
            break;
        }
    }

    outcome.ab_diff = (outcome.a.sum() - outcome.b.sum()).abs();
    outcome.mem_accesses = attacker.mem_accesses();
    outcome.noise_accesses = attacker.noise_accesses();
    outcome
}
