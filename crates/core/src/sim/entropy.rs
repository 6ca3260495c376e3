//! The entropy measurement: information flow from victim accesses to the
//! observable eviction pattern.
//!
//! The attacker fills the cache from a large buffer while a shadow record
//! tracks exactly which lines are resident. Each experiment perturbs the
//! cache contents, lets a single-access victim run once, and notes which
//! resident line (if any) the victim displaced. Over many experiments the
//! displacement histogram, weighted by how often each line was resident,
//! is compared against the uniform leak-free baseline; the KL divergence
//! is the information flow in bits per victim access.

use std::collections::HashSet;

use crate::cache::CacheResponse;
use crate::common::{CacheContext, Error, Rng, Tag, CACHE_LINE_SIZE};
use crate::mmu::{MemHandle, Mmu};
use crate::report::{fmt_f64, CsvAppender};
use crate::sim::ExperimentOptions;
use crate::victim::{SingleAccessVictim, Victim};

/// Address-space multiple of the attacker buffer.
const ADDRESS_SPACE_MULT: u64 = 16;

/// Experiment budget per cache line (scaled down by the divisor below).
const EXPERIMENTS_PER_LINE: u64 = 100_000;
const EXPERIMENT_DIVISOR: u64 = 256;

const HEADER: [&str; 9] = [
    "EvaluationType",
    "CacheType",
    "NSets",
    "NWays",
    "ReplAlg",
    "NExperiments",
    "ASMultiplier",
    "EvictionsObserved",
    "EntropyBits",
];

/// Shadow record of resident buffer lines plus the flow histograms.
#[derive(Debug)]
struct FlowTracker {
    resident: HashSet<Tag>,
    eviction_count: Vec<u64>,
    usage_count: Vec<u64>,
    buffer_lines: u64,
}

impl FlowTracker {
    fn new(buffer_lines: u64) -> FlowTracker {
        FlowTracker {
            resident: HashSet::new(),
            eviction_count: vec![0; buffer_lines as usize],
            usage_count: vec![0; buffer_lines as usize],
            buffer_lines,
        }
    }

    fn relative(&self, tag: Tag) -> usize {
        (tag.val() % self.buffer_lines) as usize
    }

    /// Reads `offset` and keeps the resident record in sync.
    fn access_tracked(
        &mut self,
        mmu: &mut Mmu,
        handle: MemHandle,
        offset: u64,
        responses: &mut Vec<CacheResponse>,
    ) {
        let tag = Tag::of(mmu.translate(handle, offset));
        responses.clear();
        mmu.read_with(handle, offset, responses);
        for resp in responses.iter() {
            if resp.hit {
                continue;
            }
            if resp.eviction && !self.resident.remove(&resp.evicted_tag) {
                tracing::warn!(evicted = %resp.evicted_tag, "evicted line was not tracked");
            }
            self.resident.insert(tag);
        }
    }

    /// KL divergence of the observed eviction distribution against the
    /// residency-weighted uniform baseline, in bits.
    fn information_flow(&self, cache_lines: usize) -> f64 {
        let mut evicted_addresses = 0u64;
        let mut usage_sum = 0.0;
        for index in 0..self.eviction_count.len() {
            if self.eviction_count[index] != 0 {
                evicted_addresses += 1;
                usage_sum += self.usage_count[index] as f64;
            }
        }
        if evicted_addresses == 0 {
            return 0.0;
        }
        let avg_usage = usage_sum / evicted_addresses as f64;

        let mut eviction_sum = 0.0;
        let mut weighted_sum = 0.0;
        let mut weighted = vec![0.0; self.eviction_count.len()];
        for index in 0..self.eviction_count.len() {
            weighted[index] =
                self.eviction_count[index] as f64 * self.usage_count[index] as f64 / avg_usage;
            weighted_sum += weighted[index];
            eviction_sum += self.eviction_count[index] as f64;
        }

        let mut flow = 0.0;
        for index in 0..self.eviction_count.len() {
            if self.eviction_count[index] == 0 {
                continue;
            }
            let p = self.usage_count[index] as f64 / (eviction_sum * cache_lines as f64);
            let q = weighted[index] / weighted_sum;
            if p > 0.0 && q > 0.0 {
                flow += q * (q / p).log2();
            }
        }
        flow
    }
}

/// Runs the information-flow measurement and appends one CSV row.
pub fn run_entropy_measurement(options: &ExperimentOptions) -> Result<(), Error> {
    let mut rng = Rng::new(options.seed);
    let cache = options.config.build_hierarchy(&mut rng)?;
    let cache_lines = cache.lines();
    let partitioned = cache.is_partitioned();
    let mut mmu = Mmu::with_random_base(cache, &mut rng);

    let buffer_lines = ADDRESS_SPACE_MULT * cache_lines as u64;
    let buffer_bytes = buffer_lines * CACHE_LINE_SIZE;
    let handle = mmu.allocate("FlowBuffer", buffer_bytes, CacheContext::ATTACKER, false)?;
    let mut victim = SingleAccessVictim::with_random_address(&mut mmu, buffer_bytes, &mut rng)?;

    let experiments = cache_lines as u64 * EXPERIMENTS_PER_LINE / EXPERIMENT_DIVISOR;
    let mut tracker = FlowTracker::new(buffer_lines);
    let mut responses = Vec::with_capacity(8);

    // Fill the cache completely (partitioned designs never expose every
    // line to one domain, so those fill as far as they can).
    let mut fill_accesses = 0u64;
    while tracker.resident.len() < cache_lines && fill_accesses < 50 * buffer_lines {
        let offset = rng.below(buffer_lines) * CACHE_LINE_SIZE;
        tracker.access_tracked(&mut mmu, handle, offset, &mut responses);
        fill_accesses += 1;
    }
    if !partitioned && tracker.resident.len() < cache_lines {
        tracing::warn!(
            resident = tracker.resident.len(),
            cache_lines,
            "cache did not fill completely"
        );
    }

    let mut evictions_observed = 0u64;
    for _ in 0..experiments {
        // Rotate a quarter of the cache's worth of fresh lines in.
        for _ in 0..cache_lines / 4 {
            let offset = rng.below(buffer_lines) * CACHE_LINE_SIZE;
            tracker.access_tracked(&mut mmu, handle, offset, &mut responses);
        }

        let snapshot: Vec<Tag> = tracker.resident.iter().copied().collect();
        let mut evictions_this_run = 0u64;

        responses.clear();
        victim.access_address_with(&mut mmu, &mut responses);
        for resp in responses.iter() {
            if resp.eviction && tracker.resident.remove(&resp.evicted_tag) {
                let relative = tracker.relative(resp.evicted_tag);
                tracker.eviction_count[relative] += 1;
                evictions_this_run += 1;
            }
        }
        evictions_observed += evictions_this_run;

        for tag in snapshot {
            let relative = tracker.relative(tag);
            tracker.usage_count[relative] += evictions_this_run;
        }

        victim.invalidate_address(&mut mmu);
    }

    let flow = tracker.information_flow(cache_lines);
    let description = mmu.cache().describe();
    tracing::info!(
        entropy_bits = flow,
        evictions = evictions_observed,
        "information-flow measurement complete"
    );

    if let Some(path) = &options.output {
        let mut writer = CsvAppender::open(path, ';', &HEADER)?;
        writer.write_row(&[
            "InformationFlow".to_owned(),
            description.cache_type,
            description.sets.to_string(),
            description.ways.to_string(),
            description.algorithm.to_string(),
            experiments.to_string(),
            ADDRESS_SPACE_MULT.to_string(),
            evictions_observed.to_string(),
            fmt_f64(flow),
        ])?;
        writer.flush()?;
    }
    Ok(())
}
