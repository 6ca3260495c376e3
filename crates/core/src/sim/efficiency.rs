//! The efficiency sweeps: attack cost against eviction-set quality.
//!
//! Each sweep point rebuilds the attacker with modified warmup targets —
//! a target eviction probability, a target set size, or a noise budget —
//! and measures, over several eviction-set generations and attacks each,
//! what the distinguisher costs. One CSV row is appended per point, plus a
//! decile summary of the per-attack victim-call counts.

use std::path::PathBuf;

use crate::attack::{self, Attacker, EvictionAttacker, NoiseMode};
use crate::common::{Error, Rng};
use crate::mmu::Mmu;
use crate::report::{fmt_f64, CsvAppender};
use crate::sim::ExperimentOptions;
use crate::victim::{self, Victim};

/// Eviction-set generations per sweep point.
const SET_GENERATION_TIMES: u32 = 10;

/// Attacks per eviction-set generation.
const ATTACKS_PER_SET: u32 = 20;

/// Which quantity the sweep varies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EfficacyMode {
    /// Target eviction probability of the constructed set.
    Probability,
    /// Target eviction-set size.
    Size,
    /// Noise budget at a fixed half-cache eviction set.
    Noise,
    /// Set size x noise two-axis heatmap.
    Heatmap,
}

impl EfficacyMode {
    /// Output-file suffix; every mode gets its own, so sweeps never
    /// overwrite each other.
    fn suffix(self, set_size: u64) -> String {
        match self {
            EfficacyMode::Probability => "_probability".to_owned(),
            EfficacyMode::Size => "_size".to_owned(),
            EfficacyMode::Noise => format!("_noise_{set_size}"),
            EfficacyMode::Heatmap => "_heatmap".to_owned(),
        }
    }

    /// Default sweep range.
    fn default_range(self, cache_lines: u64) -> SweepRange {
        match self {
            EfficacyMode::Probability => SweepRange {
                start: 0.05,
                end: 1.0,
                step: 0.05,
            },
            EfficacyMode::Size => SweepRange {
                start: 1.0,
                end: (cache_lines * 100) as f64,
                step: 25.0,
            },
            EfficacyMode::Noise => SweepRange {
                start: 0.0,
                end: 5.0,
                step: 25.0,
            },
            EfficacyMode::Heatmap => SweepRange {
                start: 1.0,
                end: 10.0,
                step: 1.0,
            },
        }
    }
}

/// One linear sweep.
#[derive(Clone, Copy, Debug)]
pub struct SweepRange {
    /// First value.
    pub start: f64,
    /// Last value (inclusive).
    pub end: f64,
    /// Increment.
    pub step: f64,
}

impl SweepRange {
    fn values(&self) -> Vec<f64> {
        let mut values = Vec::new();
        let mut v = self.start;
        while v <= self.end + f64::EPSILON {
            values.push(v);
            v += self.step;
        }
        values
    }
}

/// Accumulated totals for one sweep point.
#[derive(Debug, Default)]
struct PointTotals {
    constructed_set_size: u64,
    constructed_probability: f64,
    accesses: u64,
    encryptions: u64,
    noise_accesses: u64,
    self_eviction_rate: f64,
    unique_victim_lines: u64,
    real_evictions: f64,
    correct_eviction_rate: f64,
    successes: u64,
    victim_calls: Vec<u64>,
}

const HEADER: [&str; 11] = [
    "EvictionProbability",
    "EvictionSetSize",
    "NoiseSize",
    "Accesses",
    "Encryptions",
    "NoiseAccesses",
    "SelfEvictionRate",
    "UniqueVictimLines",
    "RealEvictions",
    "CorrectEvictionRate",
    "SuccessRate",
];

/// Runs the selected efficiency sweep.
pub fn run_efficiency_measurement(
    options: &ExperimentOptions,
    mode: EfficacyMode,
    range: Option<SweepRange>,
    noise_range: Option<SweepRange>,
) -> Result<(), Error> {
    let mut rng = Rng::new(options.seed);
    let cache = options.config.build_hierarchy(&mut rng)?;
    let cache_lines = cache.lines() as u64;
    let mut mmu = Mmu::with_random_base(cache, &mut rng);

    let range = range.unwrap_or_else(|| mode.default_range(cache_lines));

    match mode {
        EfficacyMode::Heatmap => {
            let noise_range = noise_range.unwrap_or(SweepRange {
                start: 0.0,
                end: 10.0,
                step: 1.0,
            });
            for set_size in range.values() {
                sweep(
                    options,
                    &mut mmu,
                    &mut rng,
                    mode,
                    set_size as u64,
                    &noise_range,
                )?;
            }
        }
        EfficacyMode::Noise => {
            sweep(options, &mut mmu, &mut rng, mode, cache_lines / 2, &range)?;
        }
        _ => {
            sweep(options, &mut mmu, &mut rng, mode, 0, &range)?;
        }
    }
    Ok(())
}

fn output_path(options: &ExperimentOptions, mode: EfficacyMode, set_size: u64) -> Option<PathBuf> {
    options.output.as_ref().map(|base| {
        let mut name = base.as_os_str().to_owned();
        name.push(mode.suffix(set_size));
        name.push(".csv");
        PathBuf::from(name)
    })
}

fn sweep(
    options: &ExperimentOptions,
    mmu: &mut Mmu,
    rng: &mut Rng,
    mode: EfficacyMode,
    noise_set_size: u64,
    range: &SweepRange,
) -> Result<(), Error> {
    let mut writer = match output_path(options, mode, noise_set_size) {
        Some(path) => Some(CsvAppender::open(&path, ',', &HEADER)?),
        None => None,
    };
    let mut decile_writer = match &options.output {
        Some(base) => {
            let mut name = base.as_os_str().to_owned();
            name.push("_decile.csv");
            let header: Vec<&str> = vec![
                "SweepValue", "D0", "D1", "D2", "D3", "D4", "D5", "D6", "D7", "D8", "D9", "D10",
            ];
            Some(CsvAppender::open(&PathBuf::from(name), ',', &header)?)
        }
        None => None,
    };

    for value in range.values() {
        tracing::info!(mode = ?mode, value, "sweep point");
        let totals = run_point(options, mmu, rng, mode, noise_set_size, value)?;

        let runs = u64::from(SET_GENERATION_TIMES * ATTACKS_PER_SET);
        let generations = f64::from(SET_GENERATION_TIMES);
        let noise_size = match mode {
            EfficacyMode::Noise | EfficacyMode::Heatmap => value,
            _ => options.attack.noise_size,
        };
        if let Some(writer) = writer.as_mut() {
            writer.write_row(&[
                fmt_f64(totals.constructed_probability / generations),
                (totals.constructed_set_size / u64::from(SET_GENERATION_TIMES)).to_string(),
                fmt_f64(noise_size),
                (totals.accesses / runs).to_string(),
                (totals.encryptions / runs).to_string(),
                (totals.noise_accesses / runs).to_string(),
                fmt_f64(totals.self_eviction_rate / runs as f64),
                (totals.unique_victim_lines / runs).to_string(),
                fmt_f64(totals.real_evictions / runs as f64),
                fmt_f64(totals.correct_eviction_rate / runs as f64),
                fmt_f64(totals.successes as f64 / runs as f64),
            ])?;
            writer.flush()?;
        }

        if let Some(decile_writer) = decile_writer.as_mut() {
            let mut calls = totals.victim_calls;
            calls.sort_unstable();
            let mut row = vec![fmt_f64(value)];
            for decile in 0..=10u32 {
                let index = ((decile as usize * (calls.len() - 1)) + 5) / 10;
                row.push(calls[index.min(calls.len() - 1)].to_string());
            }
            decile_writer.write_row(&row)?;
            decile_writer.flush()?;
        }
    }
    Ok(())
}

fn run_point(
    options: &ExperimentOptions,
    mmu: &mut Mmu,
    rng: &mut Rng,
    mode: EfficacyMode,
    noise_set_size: u64,
    value: f64,
) -> Result<PointTotals, Error> {
    let mut totals = PointTotals::default();
    let mut attack_config = options.attack.clone();
    if matches!(mode, EfficacyMode::Noise | EfficacyMode::Heatmap) {
        attack_config.noise_size = value;
        attack_config.noise_in_lines = mode == EfficacyMode::Heatmap;
    }

    for _ in 0..SET_GENERATION_TIMES {
        let mut victim =
            crate::sim::build_victim(options.victim, mmu, options.access_filter, rng)?;
        let mut attacker = EvictionAttacker::new(
            mmu,
            attack_config.probe_mode,
            attack_config.noise_mode,
            attack_config.noise_size,
            attack_config.noise_in_lines,
        )?;

        match mode {
            EfficacyMode::Probability => attacker.set_warmup_targets(None, value),
            EfficacyMode::Size => attacker.set_warmup_targets(Some(value as u64), 2.0),
            EfficacyMode::Noise | EfficacyMode::Heatmap => {
                let mut target = noise_set_size;
                if attack_config.noise_mode == NoiseMode::ProbeSize {
                    target += attack_config.noise_size as u64;
                }
                attacker.set_warmup_targets(Some(target), 2.0);
            }
        }

        let keys = victim.generate_key_pair(rng);
        attacker.reset_counters();
        if !attacker.warmup(mmu, victim.as_mut()) {
            tracing::warn!("warmup failed");
        }
        totals.constructed_set_size += attacker.eviction_set_size() as u64;
        totals.constructed_probability += attacker.constructed_probability();

        for _ in 0..ATTACKS_PER_SET {
            victim::clear_unique_victim_tags(victim.as_ref(), mmu);
            attacker.reset_counters();
            let outcome = attack::train(
                &mut attacker,
                mmu,
                victim.as_mut(),
                &keys,
                &attack_config,
                rng,
            );

            totals.accesses += outcome.mem_accesses;
            totals.encryptions += outcome.victim_calls;
            totals.noise_accesses += outcome.noise_accesses;
            totals.self_eviction_rate += outcome.self_eviction_rate;
            totals.unique_victim_lines += victim::unique_victim_tags(victim.as_ref(), mmu);
            let samples = (outcome.a_real.count() + outcome.b_real.count()).max(1);
            totals.real_evictions +=
                (outcome.a_real.sum() + outcome.b_real.sum()) / samples as f64;
            totals.correct_eviction_rate += outcome.correct_eviction_rate();
            if outcome.success {
                totals.successes += 1;
            }
            totals.victim_calls.push(outcome.victim_calls);
        }

        // The MMU persists across generations; release this generation's
        // allocations so the next one can re-allocate its names.
        victim::clear_watch(victim.as_ref(), mmu);
        for handle in victim.handles() {
            mmu.free(handle);
        }
        attacker.release(mmu);
    }
    Ok(totals)
}
