//! CacheFX driver harness.
//!
//! One binary triggers every measurement: point it at a cache-hierarchy
//! configuration document, pick a measurement and (where needed) a victim
//! and attacker, and it appends CSV result rows to the output file.
//!
//! Examples:
//!
//! ```text
//! cachefx --config configs/setassoc_lru.json --measure attacker \
//!     --victim binary --attacker eviction --output results.csv
//! cachefx --config configs/ceasers.json --measure profiling --repeats 10
//! cachefx --config configs/setassoc_lru.json --measure efficiency \
//!     --victim single --efficacy-mode size --start 1 --end 64 --step 1
//! ```

use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};

use cachefx_core::attack::{AttackConfig, NoiseMode, ProbeMode};
use cachefx_core::config::Config;
use cachefx_core::mmu::AccessFilter;
use cachefx_core::sim::{
    self, AttackerKind, EfficacyMode, ExperimentOptions, SweepRange, VictimKind,
};

/// Fixed default seed; runs are reproducible unless reseeded.
const DEFAULT_SEED: u64 = 0x0BAD_5EED;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum MeasureArg {
    /// Information-flow (entropy) measurement.
    Entropy,
    /// Eviction-set profiler evaluation.
    Profiling,
    /// Full attack runs against a victim.
    Attacker,
    /// Attack-efficiency sweeps.
    Efficiency,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum VictimArg {
    /// AES T-table victim.
    #[value(name = "AES", alias = "aes")]
    Aes,
    /// Square-and-multiply modular exponentiation.
    #[value(name = "SquareMult", alias = "square-mult")]
    SquareMult,
    /// Single-access victim.
    Single,
    /// Binary two-address victim.
    Binary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AttackerArg {
    /// Whole-cache occupancy attacker.
    Occupancy,
    /// Eviction-set attacker.
    Eviction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EfficacyArg {
    /// Sweep the target eviction probability.
    Probability,
    /// Sweep the target eviction-set size.
    Size,
    /// Sweep the noise budget.
    Noise,
    /// Two-axis set-size x noise heatmap.
    Heatmap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ProbeArg {
    /// Attacker probes itself; self-eviction allowed.
    Allow,
    /// Only the last probe access counts.
    Last,
    /// No probe; victim-side reporting.
    Disallow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AccessArg {
    /// Victim accesses all of its lines.
    All,
    /// Only the target line.
    Target,
    /// Only the first five lines.
    Five,
    /// Only the first ten lines.
    Ten,
    /// Only the first fifteen lines.
    Fifteen,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum NoiseArg {
    /// Separate noise stride when probes go quiet.
    Separate,
    /// Noise folded into the prime/probe window.
    Same,
    /// Probe slots sacrificed to noise.
    Probe,
}

#[derive(Debug, Parser)]
#[command(
    name = "cachefx",
    version,
    about = "Evaluate the side-channel resistance of cache designs",
    long_about = "Runs victim workloads alongside an attacker on a simulated cache \
                  hierarchy and measures how precisely the attacker can infer the \
                  victim's secret-dependent accesses."
)]
struct Cli {
    /// Path to the cache-hierarchy configuration document.
    #[arg(short, long)]
    config: PathBuf,

    /// CSV results file (append mode).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Measurement to perform.
    #[arg(short, long)]
    measure: MeasureArg,

    /// Victim workload (required for attacker and efficiency runs).
    #[arg(short, long)]
    victim: Option<VictimArg>,

    /// Attacker strategy.
    #[arg(short, long, default_value = "occupancy")]
    attacker: AttackerArg,

    /// Outer repeat count.
    #[arg(short, long, default_value_t = 1)]
    repeats: u32,

    /// Per-attack give-up iteration bound.
    #[arg(short, long, default_value_t = 10_000)]
    giveup: u32,

    /// Efficiency sweep mode.
    #[arg(long, default_value = "probability")]
    efficacy_mode: EfficacyArg,

    /// Sweep start point.
    #[arg(long)]
    start: Option<f64>,

    /// Sweep end point (inclusive).
    #[arg(long)]
    end: Option<f64>,

    /// Sweep increment.
    #[arg(long)]
    step: Option<f64>,

    /// Heatmap noise-axis start point.
    #[arg(long)]
    noise_start: Option<f64>,

    /// Heatmap noise-axis end point (inclusive).
    #[arg(long)]
    noise_end: Option<f64>,

    /// Heatmap noise-axis increment.
    #[arg(long)]
    noise_step: Option<f64>,

    /// Probe behaviour.
    #[arg(short, long, default_value = "allow")]
    probe: ProbeArg,

    /// Victim access-type filter (constant-time simulation).
    #[arg(long, default_value = "all")]
    access: AccessArg,

    /// Noise placement.
    #[arg(long, default_value = "separate")]
    noise: NoiseArg,

    /// Noise amount (cache fraction, set fraction, or slots by mode).
    #[arg(long, default_value_t = 0.1)]
    noise_size: f64,

    /// Inject noise every iteration instead of only on quiet probes.
    #[arg(long)]
    always_noise: bool,

    /// PRNG seed; overrides the configuration document.
    #[arg(long)]
    seed: Option<u64>,
}

fn sweep_range(start: Option<f64>, end: Option<f64>, step: Option<f64>) -> Option<SweepRange> {
    match (start, end, step) {
        (None, None, None) => None,
        (start, end, step) => Some(SweepRange {
            start: start.unwrap_or(0.0),
            end: end.unwrap_or(start.unwrap_or(0.0)),
            step: step.unwrap_or(1.0),
        }),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = match Config::from_path(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    };

    let needs_victim = matches!(cli.measure, MeasureArg::Attacker | MeasureArg::Efficiency);
    let victim = match (cli.victim, needs_victim) {
        (Some(victim), _) => victim,
        (None, false) => VictimArg::Single,
        (None, true) => {
            eprintln!("error: --measure {:?} requires --victim", cli.measure);
            process::exit(1);
        }
    };

    let seed = cli.seed.or(config.seed).unwrap_or(DEFAULT_SEED);
    let options = ExperimentOptions {
        config,
        output: cli.output.clone(),
        victim: match victim {
            VictimArg::Aes => VictimKind::Aes,
            VictimArg::SquareMult => VictimKind::SquareMult,
            VictimArg::Single => VictimKind::Single,
            VictimArg::Binary => VictimKind::Binary,
        },
        attacker: match cli.attacker {
            AttackerArg::Occupancy => AttackerKind::Occupancy,
            AttackerArg::Eviction => AttackerKind::Eviction,
        },
        repeats: cli.repeats,
        attack: AttackConfig {
            give_up: cli.giveup,
            probe_mode: match cli.probe {
                ProbeArg::Allow => ProbeMode::Attacker,
                ProbeArg::Last => ProbeMode::Last,
                ProbeArg::Disallow => ProbeMode::Victim,
            },
            noise_mode: match cli.noise {
                NoiseArg::Separate => NoiseMode::Separate,
                NoiseArg::Same => NoiseMode::Same,
                NoiseArg::Probe => NoiseMode::ProbeSize,
            },
            noise_size: cli.noise_size,
            always_noise: cli.always_noise,
            ..AttackConfig::default()
        },
        access_filter: match cli.access {
            AccessArg::All => AccessFilter::All,
            AccessArg::Target => AccessFilter::TargetOnly,
            AccessArg::Five => AccessFilter::FirstFive,
            AccessArg::Ten => AccessFilter::FirstTen,
            AccessArg::Fifteen => AccessFilter::FirstFifteen,
        },
        seed,
    };

    let result = match cli.measure {
        MeasureArg::Entropy => sim::run_entropy_measurement(&options),
        MeasureArg::Profiling => sim::run_profiling_measurement(&options),
        MeasureArg::Attacker => sim::run_attack_measurement(&options),
        MeasureArg::Efficiency => sim::run_efficiency_measurement(
            &options,
            match cli.efficacy_mode {
                EfficacyArg::Probability => EfficacyMode::Probability,
                EfficacyArg::Size => EfficacyMode::Size,
                EfficacyArg::Noise => EfficacyMode::Noise,
                EfficacyArg::Heatmap => EfficacyMode::Heatmap,
            },
            sweep_range(cli.start, cli.end, cli.step),
            sweep_range(cli.noise_start, cli.noise_end, cli.noise_step),
        ),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        process::exit(1);
    }
}
