//! Eviction-set profiler tests.

use cachefx_core::cache::ReplacementPolicy;
use cachefx_core::common::{CacheContext, CACHE_LINE_SIZE};
use cachefx_core::mmu::Mmu;
use cachefx_core::profiling::{
    EvictionSetSizeProfiler, ProbabilisticProfiler, Profiler, SingleHoldProfiler,
};
use cachefx_core::victim::{SingleAccessVictim, Victim};

use crate::common::{assoc, mmu, rng, set_assoc_lru};

const ATT: CacheContext = CacheContext::ATTACKER;

fn victim_on(mmu: &mut Mmu) -> SingleAccessVictim {
    let bytes = mmu.cache().lines() as u64 * CACHE_LINE_SIZE;
    let mut rng = rng();
    SingleAccessVictim::with_random_address(mmu, bytes, &mut rng).expect("victim")
}

/// On an 8-way set-associative LRU cache, the baseline profiler finds an
/// eviction set of exactly the associativity, and that set evicts the
/// victim line in at least 95% of trials.
#[test]
fn baseline_profiler_finds_exact_set_on_lru() {
    let mut mmu = mmu(set_assoc_lru(8, 8));
    let mut victim = victim_on(&mut mmu);

    let search_bytes = 100 * mmu.cache().lines() as u64 * CACHE_LINE_SIZE;
    let handle = mmu
        .allocate("search", search_bytes, ATT, false)
        .expect("allocate");

    let mut eviction_set = Vec::new();
    let found = EvictionSetSizeProfiler::create_into(
        &mut mmu,
        &mut victim,
        handle,
        &mut eviction_set,
        None,
        0.9,
        false,
    );

    assert!(found, "address space was large enough");
    assert_eq!(eviction_set.len(), 8, "exactly the associativity");

    let rate =
        EvictionSetSizeProfiler::test_eviction_set(&mut mmu, &mut victim, handle, &eviction_set);
    assert!(rate >= 0.95, "miss rate {rate} below target");
}

/// Every baseline-emitted address passes the collision oracle.
#[test]
fn baseline_profiler_is_sound() {
    let mut mmu = mmu(set_assoc_lru(4, 4));
    let mut victim = victim_on(&mut mmu);
    let handle = mmu
        .allocate(
            "search",
            100 * mmu.cache().lines() as u64 * CACHE_LINE_SIZE,
            ATT,
            false,
        )
        .expect("allocate");

    let mut eviction_set = Vec::new();
    EvictionSetSizeProfiler::create_into(
        &mut mmu,
        &mut victim,
        handle,
        &mut eviction_set,
        None,
        0.9,
        false,
    );
    assert!(!eviction_set.is_empty());
    for &address in &eviction_set {
        assert!(victim.has_collision(&mmu, handle, address));
    }
}

/// Single-hold minimises down to the associativity on LRU, keeping only
/// genuinely colliding addresses.
#[test]
fn single_hold_minimises_to_associativity() {
    let mut mmu = mmu(set_assoc_lru(4, 4));
    let mut victim = victim_on(&mut mmu);

    let mut profiler = SingleHoldProfiler::new(
        mmu.cache().lines() as u64 * CACHE_LINE_SIZE,
        false,
        rng(),
    );
    profiler.create_eviction_set(&mut mmu, &mut victim, 4, 10_000);
    profiler.evaluate_eviction_set(&mut mmu, &mut victim, 100);

    let stats = profiler.statistics();
    assert_eq!(stats.eviction_set_size(), 4, "minimal conflicting set");
    assert_eq!(stats.false_positives, 0);
    assert!(
        stats.misses_under_flush >= 90,
        "the minimal set still evicts the victim"
    );
}

/// The probabilistic profiler emits candidates on a random-replacement
/// cache and stays within its iteration budget.
#[test]
fn probabilistic_profiler_emits_candidates_under_random_replacement() {
    let mut mmu = mmu(assoc(ReplacementPolicy::Random, 16));
    let mut victim = victim_on(&mut mmu);

    let mut profiler = ProbabilisticProfiler::new(
        mmu.cache().lines() as u64 * CACHE_LINE_SIZE,
        false,
        rng(),
    );
    profiler.create_eviction_set(&mut mmu, &mut victim, 16, 30);

    let stats = profiler.statistics();
    assert_eq!(stats.profiling_runs, 30, "runs the full budget");
    assert!(
        !profiler.eviction_set().is_empty(),
        "above-threshold candidates exist"
    );
    assert!(stats.eviction_set_size() as usize <= 16);
}

/// Profilers are deterministic under a fixed seed.
#[test]
fn profiling_is_deterministic() {
    let run = || {
        let mut mmu = mmu(set_assoc_lru(4, 4));
        let mut victim = victim_on(&mut mmu);
        let mut profiler = SingleHoldProfiler::new(
            mmu.cache().lines() as u64 * CACHE_LINE_SIZE,
            false,
            rng(),
        );
        profiler.create_eviction_set(&mut mmu, &mut victim, 4, 10_000);
        profiler.eviction_set().to_vec()
    };
    assert_eq!(run(), run());
}
