//! The profiling evaluation: every eviction-set profiler, statistically
//! reduced.
//!
//! Each profiler variant runs against a single-access victim on a freshly
//! built cache, `repeats` times. Per-run results — eviction-set size,
//! true-positive rate, eviction success rates with and without explicit
//! displacement, attack memory, and the per-context cache statistics —
//! reduce to min/max/mean/median rows per variant.

use crate::cache::CacheStatistics;
use crate::common::{CacheContext, Error, Rng, CACHE_LINE_SIZE};
use crate::mmu::Mmu;
use crate::profiling::{Profiler, ProfilerKind};
use crate::report::{fmt_f64, CsvAppender};
use crate::sim::ExperimentOptions;
use crate::stats::{Summary, SummaryField};
use crate::victim::SingleAccessVictim;

/// Construction iterations granted per ideal eviction-set address.
const PROFILINGS_PER_ADDRESS: u32 = 100;

/// Evaluation runs per experiment.
const EVALUATIONS_PER_EXPERIMENT: u32 = 100;

/// Per-run values for one profiler variant.
#[derive(Debug, Default)]
struct RunBatch {
    eviction_set_size: Vec<f64>,
    true_positive_rate: Vec<f64>,
    success_rate: Vec<f64>,
    success_rate_evict: Vec<f64>,
    success_rate_flush: Vec<f64>,
    attack_memory: Vec<f64>,
    attacker_stats: Vec<CacheStatistics>,
    victim_stats: Vec<CacheStatistics>,
}

fn stats_columns(batch: &[CacheStatistics], field: SummaryField) -> Vec<String> {
    let mut columns = Vec::with_capacity(11);
    for index in 0..11 {
        let values: Vec<f64> = batch.iter().map(|s| s.as_row()[index] as f64).collect();
        columns.push(fmt_f64(Summary::of(&values).field(field)));
    }
    columns
}

/// Runs the full profiling evaluation.
pub fn run_profiling_measurement(options: &ExperimentOptions) -> Result<(), Error> {
    let mut header: Vec<String> = [
        "Profiler",
        "CacheType",
        "NSets",
        "NWays",
        "ReplAlg",
        "Param0",
        "Param1",
        "Param2",
        "Param3",
        "NumExperiments",
        "ProfilingIterations",
        "EvaluationRuns",
        "EvictionSetSize",
        "TruePositiveRate",
        "EvictionSR",
        "EvictionSRWEvict",
        "EvictionSRWFlush",
        "AttackMemory",
    ]
    .iter()
    .map(|s| (*s).to_owned())
    .collect();
    header.extend(CacheStatistics::column_names("Attacker"));
    header.extend(CacheStatistics::column_names("Victim"));
    let header_refs: Vec<&str> = header.iter().map(String::as_str).collect();

    let mut writer = match &options.output {
        Some(path) => Some(CsvAppender::open(path, ';', &header_refs)?),
        None => None,
    };
    let mut rng = Rng::new(options.seed);

    for kind in ProfilerKind::ALL {
        let mut batch = RunBatch::default();
        let mut description = None;
        let mut profiling_iterations = 0;

        for _ in 0..options.repeats.max(1) {
            let cache = options.config.build_hierarchy(&mut rng)?;
            let mut mmu = Mmu::with_random_base(cache, &mut rng);
            let bytes = mmu.cache().lines() as u64 * CACHE_LINE_SIZE;
            let mut victim = SingleAccessVictim::with_random_address(&mut mmu, bytes, &mut rng)?;

            let ideal_size = mmu.cache().eviction_set_size();
            profiling_iterations = PROFILINGS_PER_ADDRESS * ideal_size as u32;

            let mut profiler = kind.build(&mmu, &mut rng);
            profiler.create_eviction_set(
                &mut mmu,
                &mut victim,
                ideal_size,
                profiling_iterations,
            );

            batch
                .attacker_stats
                .push(mmu.cache().statistics(CacheContext::ATTACKER));
            batch
                .victim_stats
                .push(mmu.cache().statistics(CacheContext::VICTIM));

            profiler.evaluate_eviction_set(&mut mmu, &mut victim, EVALUATIONS_PER_EXPERIMENT);

            let stats = profiler.statistics();
            let set_size = stats.eviction_set_size();
            let runs = f64::from(stats.evaluation_runs.max(1));
            batch.eviction_set_size.push(f64::from(set_size));
            batch.true_positive_rate.push(if set_size == 0 {
                0.0
            } else {
                f64::from(stats.true_positives) / f64::from(set_size)
            });
            batch
                .success_rate
                .push(f64::from(stats.misses_under_run) / runs);
            batch
                .success_rate_evict
                .push(f64::from(stats.misses_under_evict) / runs);
            batch
                .success_rate_flush
                .push(f64::from(stats.misses_under_flush) / runs);
            batch.attack_memory.push(stats.attack_memory_size as f64);

            description = Some(mmu.cache().describe());
        }

        let description = description.expect("at least one run");
        tracing::info!(
            profiler = kind.name(),
            set_size = Summary::of(&batch.eviction_set_size).mean,
            tpr = Summary::of(&batch.true_positive_rate).mean,
            success_rate = Summary::of(&batch.success_rate).mean,
            "profiling evaluation complete"
        );

        if let Some(writer) = writer.as_mut() {
            for field in SummaryField::REPORT_ROWS {
                let mut row = vec![
                    format!("{}-{}", kind.name(), field.label()),
                    description.cache_type.clone(),
                    description.sets.to_string(),
                    description.ways.to_string(),
                    description.algorithm.to_string(),
                    description.params[0].to_string(),
                    description.params[1].to_string(),
                    description.params[2].to_string(),
                    description.params[3].to_string(),
                    options.repeats.max(1).to_string(),
                    profiling_iterations.to_string(),
                    EVALUATIONS_PER_EXPERIMENT.to_string(),
                    fmt_f64(Summary::of(&batch.eviction_set_size).field(field)),
                    fmt_f64(Summary::of(&batch.true_positive_rate).field(field)),
                    fmt_f64(Summary::of(&batch.success_rate).field(field)),
                    fmt_f64(Summary::of(&batch.success_rate_evict).field(field)),
                    fmt_f64(Summary::of(&batch.success_rate_flush).field(field)),
                    fmt_f64(Summary::of(&batch.attack_memory).field(field)),
                ];
                row.extend(stats_columns(&batch.attacker_stats, field));
                row.extend(stats_columns(&batch.victim_stats, field));
                writer.write_row(&row)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}
