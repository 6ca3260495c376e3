//! Attack-driver tests.

use cachefx_core::attack::{
    self, AttackConfig, Attacker, EvictionAttacker, NoiseMode, OccupancyAttacker, ProbeMode,
};
use cachefx_core::cache::ReplacementPolicy;
use cachefx_core::common::Rng;
use cachefx_core::stats::Z_99;
use cachefx_core::victim::{BinaryVictim, Victim};

use crate::common::{assoc, mmu, set_assoc_lru};

/// Binary victim + eviction attacker on a set-associative LRU cache: the
/// driver must distinguish the two keys quickly, with non-overlapping 99%
/// confidence intervals.
#[test]
fn eviction_attack_distinguishes_binary_victim_on_lru() {
    // Draw victims until the two addresses live in different sets, so the
    // non-target address cannot pollute the measurement.
    let mut seed = 1u64;
    let (mut mmu, mut victim, mut rng) = loop {
        let mut rng = Rng::new(seed);
        let mut mmu = mmu(set_assoc_lru(8, 8));
        let victim = BinaryVictim::new(&mut mmu, Default::default(), &mut rng).expect("victim");
        let handle = victim.handles()[0];
        if !mmu.has_collision(handle, victim.address_a(), handle, victim.address_b()) {
            break (mmu, victim, rng);
        }
        seed += 1;
    };

    let mut attacker = EvictionAttacker::new(
        &mut mmu,
        ProbeMode::Attacker,
        NoiseMode::Separate,
        0.1,
        false,
    )
    .expect("attacker");

    assert!(attacker.warmup(&mut mmu, &mut victim), "warmup must succeed");
    assert_eq!(attacker.eviction_set_size(), 8);

    let keys = victim.generate_key_pair(&mut rng);
    let config = AttackConfig {
        give_up: 10_000,
        ..AttackConfig::default()
    };
    let outcome = attack::train(&mut attacker, &mut mmu, &mut victim, &keys, &config, &mut rng);

    assert!(outcome.success, "the keys are trivially distinguishable");
    assert!(
        outcome.iterations <= 200,
        "took {} iterations",
        outcome.iterations
    );

    let a_upper = outcome.a.mean() + outcome.a.ci_half_width(Z_99);
    let b_lower = outcome.b.mean() - outcome.b.ci_half_width(Z_99);
    let b_upper = outcome.b.mean() + outcome.b.ci_half_width(Z_99);
    let a_lower = outcome.a.mean() - outcome.a.ci_half_width(Z_99);
    assert!(
        a_upper < b_lower || b_upper < a_lower,
        "confidence intervals must be disjoint on success"
    );
}

/// The binary victim's two accesses look identical to an occupancy
/// attacker: the driver reaches the give-up bound and reports failure,
/// with the statistics still well-formed.
#[test]
fn occupancy_attack_gives_up_on_binary_victim() {
    let mut rng = Rng::new(3);
    let mut mmu = mmu(assoc(ReplacementPolicy::Lru, 16));
    let mut victim = BinaryVictim::new(&mut mmu, Default::default(), &mut rng).expect("victim");
    let mut attacker = OccupancyAttacker::new(&mut mmu).expect("attacker");

    attacker.warmup(&mut mmu, &mut victim);

    let keys = victim.generate_key_pair(&mut rng);
    let config = AttackConfig {
        give_up: 50,
        ..AttackConfig::default()
    };
    let outcome = attack::train(&mut attacker, &mut mmu, &mut victim, &keys, &config, &mut rng);

    assert!(!outcome.success, "single-line victims defeat occupancy");
    assert_eq!(outcome.iterations, 50, "ran to the give-up bound");
    assert!(outcome.a.variance() >= 0.0);
    assert!(outcome.b.variance() >= 0.0);
    assert_eq!(outcome.victim_calls, 100, "two calls per iteration");
}

/// Probe mode VICTIM replaces the attacker's observation with the
/// victim-side eviction count, which still distinguishes the keys.
#[test]
fn victim_probe_mode_uses_real_evictions() {
    let mut seed = 1u64;
    let (mut mmu, mut victim, mut rng) = loop {
        let mut rng = Rng::new(seed);
        let mut mmu = mmu(set_assoc_lru(8, 8));
        let victim = BinaryVictim::new(&mut mmu, Default::default(), &mut rng).expect("victim");
        let handle = victim.handles()[0];
        if !mmu.has_collision(handle, victim.address_a(), handle, victim.address_b()) {
            break (mmu, victim, rng);
        }
        seed += 1;
    };

    let mut attacker = EvictionAttacker::new(
        &mut mmu,
        ProbeMode::Victim,
        NoiseMode::Separate,
        0.1,
        false,
    )
    .expect("attacker");
    assert!(attacker.warmup(&mut mmu, &mut victim));

    let keys = victim.generate_key_pair(&mut rng);
    let config = AttackConfig {
        give_up: 10_000,
        probe_mode: ProbeMode::Victim,
        ..AttackConfig::default()
    };
    let outcome = attack::train(&mut attacker, &mut mmu, &mut victim, &keys, &config, &mut rng);

    assert!(outcome.success);
    assert!(
        outcome.b_real.mean() > outcome.a_real.mean(),
        "key B touches the watched set"
    );
}

/// The running confidence interval tightens with more samples on a fixed
/// stochastic source.
#[test]
fn confidence_interval_shrinks_with_samples() {
    let mut short = cachefx_core::stats::Running::new();
    let mut long = cachefx_core::stats::Running::new();
    for i in 0..10 {
        short.push(f64::from(i % 2));
    }
    for i in 0..1000 {
        long.push(f64::from(i % 2));
    }
    assert!(long.ci_half_width(Z_99) < short.ci_half_width(Z_99));
}
