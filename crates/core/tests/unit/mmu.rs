//! MMU and memory-handle tests.

use std::collections::HashSet;

use cachefx_core::cache::ReplacementPolicy;
use cachefx_core::common::{CacheContext, Error, Tag, CACHE_LINE_SIZE};
use cachefx_core::mmu::{AccessFilter, Mmu};

use crate::common::{assoc, mmu};

const ATT: CacheContext = CacheContext::ATTACKER;
const VIC: CacheContext = CacheContext::VICTIM;

fn small_mmu() -> Mmu {
    mmu(assoc(ReplacementPolicy::Lru, 8))
}

/// Translation is identity plus base, and bases are aligned.
#[test]
fn allocation_and_translation() {
    let mut mmu = small_mmu();
    let handle = mmu.allocate("buffer", 4096, ATT, false).expect("allocate");
    let base = mmu.translate(handle, 0);
    assert_eq!(base % 128, 0, "default alignment");
    assert_eq!(mmu.translate(handle, 100), base + 100);
    assert_eq!(mmu.size_of(handle), 4096);
    assert_eq!(mmu.context_of(handle), ATT);
}

/// Distinct names never overlap.
#[test]
fn allocations_do_not_overlap() {
    let mut mmu = small_mmu();
    let first = mmu.allocate("first", 256, ATT, false).expect("allocate");
    let second = mmu.allocate("second", 256, ATT, false).expect("allocate");
    let first_end = mmu.translate(first, 0) + 256;
    assert!(mmu.translate(second, 0) >= first_end);
}

/// Public names share a base across contexts; one handle per context.
#[test]
fn public_names_share_base() {
    let mut mmu = small_mmu();
    let attacker_side = mmu.allocate("shared", 512, ATT, true).expect("allocate");
    let victim_side = mmu.allocate("shared", 512, VIC, true).expect("allocate");
    assert_ne!(attacker_side, victim_side);
    assert_eq!(mmu.translate(attacker_side, 0), mmu.translate(victim_side, 0));

    let again = mmu.allocate("shared", 512, ATT, true).expect("allocate");
    assert_eq!(again, attacker_side, "same context reuses the handle");
}

/// Re-allocating a non-public name is an error.
#[test]
fn non_public_name_conflicts() {
    let mut mmu = small_mmu();
    mmu.allocate("private", 64, ATT, false).expect("allocate");
    assert!(matches!(
        mmu.allocate("private", 64, VIC, false),
        Err(Error::AllocationTaken(_))
    ));
}

/// Freed names can be allocated again.
#[test]
fn free_releases_the_name() {
    let mut mmu = small_mmu();
    let handle = mmu.allocate("tmp", 64, ATT, false).expect("allocate");
    mmu.free(handle);
    mmu.allocate("tmp", 64, ATT, false)
        .expect("name free after free()");
}

/// Out-of-range offsets abort.
#[test]
#[should_panic(expected = "outside allocation")]
fn out_of_range_offset_panics() {
    let mut mmu = small_mmu();
    let handle = mmu.allocate("tiny", 64, ATT, false).expect("allocate");
    mmu.read(handle, 64);
}

/// The target-only filter swallows accesses to other lines.
#[test]
fn target_filter_gates_accesses() {
    let mut mmu = small_mmu();
    let handle = mmu.allocate("filtered", 1024, VIC, false).expect("allocate");
    mmu.set_victim_target(handle, 2 * CACHE_LINE_SIZE);
    mmu.set_access_filter(handle, AccessFilter::TargetOnly);

    mmu.read(handle, 0);
    mmu.read(handle, 5 * CACHE_LINE_SIZE);
    assert_eq!(
        mmu.cache().statistics(VIC).read_misses
            + mmu.cache().statistics(VIC).read_hits,
        0,
        "non-target lines never reach the cache"
    );

    mmu.read(handle, 2 * CACHE_LINE_SIZE);
    assert_eq!(mmu.cache().statistics(VIC).read_misses, 1);
}

/// The first-N filters pass exactly the leading lines.
#[test]
fn first_n_filters() {
    let mut mmu = small_mmu();
    let handle = mmu.allocate("filtered", 4096, VIC, false).expect("allocate");
    mmu.set_access_filter(handle, AccessFilter::FirstFive);
    for line in 0..10 {
        mmu.read(handle, line * CACHE_LINE_SIZE);
    }
    let stats = mmu.cache().statistics(VIC);
    assert_eq!(stats.read_hits + stats.read_misses, 5);
}

/// The eviction watch counts displacements of watched tags and splits
/// them by target attribution.
#[test]
fn watch_counts_and_attributes_evictions() {
    // One-way cache: every insertion displaces the resident line.
    let mut mmu = mmu(assoc(ReplacementPolicy::Lru, 1));
    let attacker = mmu.allocate("attacker", 64, ATT, false).expect("allocate");
    let victim = mmu.allocate("victim", 256, VIC, false).expect("allocate");

    let watched = Tag::of(mmu.translate(attacker, 0));
    let mut watch = HashSet::new();
    watch.insert(watched);
    mmu.install_watch(victim, watch);
    mmu.set_victim_target(victim, 0);

    // Target-line displacement.
    mmu.read(attacker, 0);
    mmu.read(victim, 0);
    assert_eq!(mmu.attacker_addresses_evicted(victim), 1);
    assert_eq!(mmu.correct_evictions(victim), 1);
    assert_eq!(mmu.incorrect_evictions(victim), 0);

    // Non-target displacement.
    mmu.read(attacker, 0);
    mmu.read(victim, 3 * CACHE_LINE_SIZE);
    assert_eq!(mmu.attacker_addresses_evicted(victim), 2);
    assert_eq!(mmu.incorrect_evictions(victim), 1);
    assert_eq!(mmu.unique_tags(victim), 2, "two distinct victim lines");

    mmu.reset_attacker_addresses_evicted(victim);
    mmu.reset_eviction_split(victim);
    assert_eq!(mmu.attacker_addresses_evicted(victim), 0);
    assert_eq!(mmu.correct_evictions(victim), 0);
}

/// The collision oracle goes through handle contexts.
#[test]
fn collision_uses_handle_contexts() {
    let mut mmu = small_mmu();
    let a = mmu.allocate("a", 256, ATT, false).expect("allocate");
    let b = mmu.allocate("b", 256, VIC, false).expect("allocate");
    // Fully-associative: everything collides.
    assert!(mmu.has_collision(a, 0, b, 0));
}
