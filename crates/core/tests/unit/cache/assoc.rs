//! Fully-associative cache tests: the replacement-policy catalogue.

use cachefx_core::cache::{AssocCache, Cache, CacheModelKind, CacheResponse, ReplacementPolicy};
use cachefx_core::common::{CacheContext, Rng, Tag};
use rstest::rstest;

use crate::common::{assoc, tag};

const ATT: CacheContext = CacheContext::ATTACKER;

fn read_resp(cache: &mut Cache, t: Tag) -> CacheResponse {
    let mut responses = Vec::new();
    cache.read_with(t, ATT, &mut responses);
    *responses.last().expect("one response per access")
}

// ──────────────────────────────────────────────────────────
// LRU
// ──────────────────────────────────────────────────────────

/// Access sequence A B C D A E on 4 ways: four misses, a hit on A, then a
/// miss on E that evicts B (the least recently used line).
#[test]
fn lru_four_way_evicts_least_recently_used() {
    let mut cache = assoc(ReplacementPolicy::Lru, 4);
    let (a, b, c, d, e) = (tag(10), tag(11), tag(12), tag(13), tag(14));

    for t in [a, b, c, d] {
        let resp = read_resp(&mut cache, t);
        assert!(!resp.hit, "cold fill of {t} must miss");
        assert!(!resp.eviction, "cold fill of {t} displaced nothing real");
    }

    let resp = read_resp(&mut cache, a);
    assert!(resp.hit, "A is resident");
    assert!(!resp.eviction, "a hit never evicts");

    let resp = read_resp(&mut cache, e);
    assert!(!resp.hit);
    assert!(resp.eviction);
    assert_eq!(resp.evicted_tag, b, "B became LRU after A's promotion");
}

/// After filling S ways and inserting one more tag, the first-inserted tag
/// is the victim; re-reading it then displaces the second-inserted.
#[test]
fn lru_replacement_fidelity() {
    const S: u64 = 8;
    let mut cache = assoc(ReplacementPolicy::Lru, S as usize);
    for v in 0..S {
        cache.read(tag(v), ATT);
    }

    let resp = read_resp(&mut cache, tag(S));
    assert_eq!(resp.evicted_tag, tag(0));

    let resp = read_resp(&mut cache, tag(0));
    assert!(!resp.hit);
    assert_eq!(resp.evicted_tag, tag(1));
}

// ──────────────────────────────────────────────────────────
// Invariants across policies
// ──────────────────────────────────────────────────────────

/// Evict-then-miss: after an explicit eviction the next read must miss.
#[rstest]
#[case(ReplacementPolicy::Lru)]
#[case(ReplacementPolicy::Random)]
#[case(ReplacementPolicy::BitPlru)]
#[case(ReplacementPolicy::TreePlru)]
#[case(ReplacementPolicy::Srrip)]
#[case(ReplacementPolicy::Brrip)]
#[case(ReplacementPolicy::Lip)]
#[case(ReplacementPolicy::Bip)]
fn evict_then_miss(#[case] policy: ReplacementPolicy) {
    let mut cache = assoc(policy, 8);
    for v in 0..8 {
        cache.read(tag(v), ATT);
    }
    // The read leaves tag 3 resident under every policy, whether it hits
    // or (after a cold-insertion displacement) re-inserts.
    cache.read(tag(3), ATT);
    assert!(cache.evict(tag(3), ATT), "tag 3 was resident");
    let resp = read_resp(&mut cache, tag(3));
    assert!(!resp.hit, "evicted tag must miss under {policy}");
}

/// A tag is held by at most one way: evicting twice cannot hit twice.
#[rstest]
#[case(ReplacementPolicy::Lru)]
#[case(ReplacementPolicy::Random)]
#[case(ReplacementPolicy::Srrip)]
fn at_most_one_copy(#[case] policy: ReplacementPolicy) {
    let mut cache = assoc(policy, 8);
    for round in 0..4 {
        for v in 0..12 {
            cache.read(tag(v + round), ATT);
        }
    }
    for v in 0..16 {
        if cache.evict(tag(v), ATT) {
            assert!(!cache.evict(tag(v), ATT), "duplicate copy of tag {v}");
        }
    }
}

// ──────────────────────────────────────────────────────────
// Bit-PLRU
// ──────────────────────────────────────────────────────────

/// Setting the last MRU bit resets the vector to just the touched way, so
/// the next victim is the second-filled way.
#[test]
fn bit_plru_reset_selects_second_way() {
    let mut cache = assoc(ReplacementPolicy::BitPlru, 4);
    for v in 0..4 {
        cache.read(tag(v), ATT);
    }
    // Filling way 3 reset all bits; re-reading tag 0 marks way 0 again.
    cache.read(tag(0), ATT);

    let resp = read_resp(&mut cache, tag(4));
    assert!(resp.eviction);
    assert_eq!(resp.evicted_tag, tag(1), "way 1 holds the first clear bit");
}

// ──────────────────────────────────────────────────────────
// Tree-PLRU
// ──────────────────────────────────────────────────────────

/// Constructing tree-PLRU with a non-power-of-two way count falls back to
/// bit-PLRU.
#[test]
fn tree_plru_fallback_on_non_power_of_two() {
    let cache = assoc(ReplacementPolicy::TreePlru, 6);
    assert_eq!(cache.algorithm(), ReplacementPolicy::BitPlru);

    let cache = assoc(ReplacementPolicy::TreePlru, 8);
    assert_eq!(cache.algorithm(), ReplacementPolicy::TreePlru);
}

/// Access order 0 1 2 3 0 leaves the tree pointing at way 2, unlike true
/// LRU (which would pick way 1).
#[test]
fn tree_plru_victim_follows_direction_bits() {
    let mut cache = assoc(ReplacementPolicy::TreePlru, 4);
    for v in 0..4 {
        cache.read(tag(v), ATT);
    }
    cache.read(tag(0), ATT);

    let resp = read_resp(&mut cache, tag(4));
    assert!(resp.eviction);
    assert_eq!(resp.evicted_tag, tag(2));
}

// ──────────────────────────────────────────────────────────
// RRIP
// ──────────────────────────────────────────────────────────

/// SRRIP inserts at long re-reference, so a full cache ages uniformly and
/// replaces the first way.
#[test]
fn srrip_ages_and_replaces_first_way() {
    let mut cache = assoc(ReplacementPolicy::Srrip, 4);
    for v in 0..4 {
        cache.read(tag(v), ATT);
    }
    let resp = read_resp(&mut cache, tag(4));
    assert!(resp.eviction);
    assert_eq!(resp.evicted_tag, tag(0));

    // Hits age toward near-immediate and keep the line.
    assert!(cache.read(tag(1), ATT));
}

// ──────────────────────────────────────────────────────────
// LIP
// ──────────────────────────────────────────────────────────

/// New lines insert at the LRU position: without an intervening hit the
/// next insert displaces the newcomer itself, while a hit promotes the
/// line into the protected working set.
#[test]
fn lip_inserts_cold() {
    let mut cache = assoc(ReplacementPolicy::Lip, 4);
    cache.read(tag(0), ATT);

    let resp = read_resp(&mut cache, tag(1));
    assert_eq!(resp.evicted_tag, tag(0), "cold newcomer displaced first");

    // Promote tag 1, then insert: the promoted line survives.
    cache.read(tag(1), ATT);
    let resp = read_resp(&mut cache, tag(2));
    assert!(!resp.hit);
    assert!(cache.read(tag(1), ATT), "promoted line survived");
}

// ──────────────────────────────────────────────────────────
// Determinism
// ──────────────────────────────────────────────────────────

/// Random replacement is reproducible for a fixed seed.
#[test]
fn random_policy_is_deterministic_under_seed() {
    let run = || {
        let mut cache = Cache::new(CacheModelKind::Assoc(AssocCache::new(
            ReplacementPolicy::Random,
            8,
            true,
            Rng::new(7),
        )));
        let mut evictions = Vec::new();
        for v in 0..64 {
            let mut responses = Vec::new();
            cache.read_with(tag(v), ATT, &mut responses);
            evictions.extend(responses.iter().filter(|r| r.eviction).map(|r| r.evicted_tag));
        }
        evictions
    };
    assert_eq!(run(), run());
}

// ──────────────────────────────────────────────────────────
// Invalid-first
// ──────────────────────────────────────────────────────────

/// An explicitly evicted way is refilled before the policy picks a victim.
#[test]
fn invalid_first_fills_freed_way() {
    let mut cache = assoc(ReplacementPolicy::Lru, 2);
    cache.read(tag(0), ATT);
    cache.read(tag(1), ATT);
    assert!(cache.evict(tag(0), ATT));

    let resp = read_resp(&mut cache, tag(2));
    assert!(!resp.hit);
    assert!(!resp.eviction, "the freed way absorbs the fill");
    assert!(cache.read(tag(1), ATT), "tag 1 was left alone");
}

// ──────────────────────────────────────────────────────────
// Statistics
// ──────────────────────────────────────────────────────────

/// Counters are partitioned by context and monotone.
#[test]
fn statistics_split_by_context() {
    let mut cache = assoc(ReplacementPolicy::Lru, 4);
    cache.read(tag(0), CacheContext::ATTACKER);
    cache.read(tag(0), CacheContext::ATTACKER);
    cache.read(tag(1), CacheContext::VICTIM);

    let attacker = cache.statistics(CacheContext::ATTACKER);
    assert_eq!(attacker.read_misses, 1);
    assert_eq!(attacker.read_hits, 1);

    let victim = cache.statistics(CacheContext::VICTIM);
    assert_eq!(victim.read_misses, 1);
    assert_eq!(victim.read_hits, 0);
}
