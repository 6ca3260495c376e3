//! The attacker measurement: repeated warmup + train runs.

use tracing::info;

use crate::attack::{self, Attacker};
use crate::common::{Error, Rng};
use crate::mmu::Mmu;
use crate::report::{fmt_f64, CsvAppender};
use crate::sim::ExperimentOptions;
use crate::victim::{self, Victim};

/// Columns of the attacker-measurement CSV.
const HEADER: [&str; 16] = [
    "Attack",
    "CacheType",
    "Success",
    "FailedWarmup",
    "Iterations",
    "Encryptions",
    "Accesses",
    "NoiseAccesses",
    "AMean",
    "ACiHalf",
    "BMean",
    "BCiHalf",
    "ABDiff",
    "SelfEvictionRate",
    "UniqueVictimLines",
    "CorrectEvictionRate",
];

/// Runs `repeats` independent attacks, each on a freshly built cache.
pub fn run_attack_measurement(options: &ExperimentOptions) -> Result<(), Error> {
    let mut writer = match &options.output {
        Some(path) => Some(CsvAppender::open(path, ',', &HEADER)?),
        None => None,
    };
    let mut rng = Rng::new(options.seed);

    for attack_index in 0..options.repeats {
        let cache = options.config.build_hierarchy(&mut rng)?;
        let mut mmu = Mmu::with_random_base(cache, &mut rng);
        let mut victim = crate::sim::build_victim(
            options.victim,
            &mut mmu,
            options.access_filter,
            &mut rng,
        )?;
        let mut attacker = crate::sim::build_attacker(options.attacker, &mut mmu, &options.attack)?;

        let keys = victim.generate_key_pair(&mut rng);

        info!(attack = attack_index + 1, "attack starting");
        attacker.reset_counters();
        let warmed_up = attacker.warmup(&mut mmu, victim.as_mut());
        if !warmed_up {
            info!(attack = attack_index + 1, "warmup failed");
        }
        info!(
            warmup_accesses = attacker.mem_accesses(),
            eviction_set = attacker.eviction_set_size(),
            "warmup complete"
        );

        attacker.reset_counters();
        victim::clear_unique_victim_tags(victim.as_ref(), &mut mmu);
        let outcome = attack::train(
            attacker.as_mut(),
            &mut mmu,
            victim.as_mut(),
            &keys,
            &options.attack,
            &mut rng,
        );

        info!(
            success = outcome.success,
            iterations = outcome.iterations,
            encryptions = outcome.victim_calls,
            accesses = outcome.mem_accesses,
            "attack finished"
        );

        if let Some(writer) = writer.as_mut() {
            let description = mmu.cache().describe();
            writer.write_row(&[
                (attack_index + 1).to_string(),
                description.cache_type,
                outcome.success.to_string(),
                (!warmed_up).to_string(),
                outcome.iterations.to_string(),
                outcome.victim_calls.to_string(),
                outcome.mem_accesses.to_string(),
                outcome.noise_accesses.to_string(),
                fmt_f64(outcome.a.mean()),
                fmt_f64(outcome.a.ci_half_width(crate::stats::Z_99)),
                fmt_f64(outcome.b.mean()),
                fmt_f64(outcome.b.ci_half_width(crate::stats::Z_99)),
                fmt_f64(outcome.ab_diff),
                fmt_f64(outcome.self_eviction_rate),
                victim::unique_victim_tags(victim.as_ref(), &mmu).to_string(),
                fmt_f64(outcome.correct_eviction_rate()),
            ])?;
            writer.flush()?;
        }
    }
    Ok(())
}
