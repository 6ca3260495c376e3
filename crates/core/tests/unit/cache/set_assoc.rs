//! Set-associative cache tests.

use cachefx_core::cache::{Cache, CacheResponse};
use cachefx_core::common::{CacheContext, Tag};

use crate::common::{set_assoc_lru, tag};

const ATT: CacheContext = CacheContext::ATTACKER;

fn read_resp(cache: &mut Cache, t: Tag) -> CacheResponse {
    let mut responses = Vec::new();
    cache.read_with(t, ATT, &mut responses);
    *responses.last().expect("one response per access")
}

/// Tags 0, 4, 8 all land in set 0 of a 4x2 cache; the third insert evicts
/// the set's LRU line and re-reading the first evicts the second.
#[test]
fn conflicting_tags_share_one_set() {
    let mut cache = set_assoc_lru(4, 2);

    assert!(!read_resp(&mut cache, tag(0)).hit);
    assert!(!read_resp(&mut cache, tag(4)).hit);

    let resp = read_resp(&mut cache, tag(8));
    assert!(!resp.hit);
    assert!(resp.eviction);
    assert_eq!(resp.evicted_tag, tag(0), "LRU of set 0");

    let resp = read_resp(&mut cache, tag(0));
    assert!(!resp.hit);
    assert_eq!(resp.evicted_tag, tag(4));
}

/// Other sets are untouched by conflicts in set 0.
#[test]
fn sets_are_independent() {
    let mut cache = set_assoc_lru(4, 2);
    cache.read(tag(1), ATT);
    for t in [0, 4, 8, 12, 16] {
        cache.read(tag(t), ATT);
    }
    assert!(cache.read(tag(1), ATT), "set 1 never overflowed");
}

/// The collision oracle is exactly index equality.
#[test]
fn collision_oracle_matches_indexing() {
    let cache = set_assoc_lru(4, 2);
    assert!(cache.has_collision(tag(0), ATT, tag(8), ATT));
    assert!(!cache.has_collision(tag(0), ATT, tag(9), ATT));
}

/// Geometry queries.
#[test]
fn geometry() {
    let cache = set_assoc_lru(16, 4);
    assert_eq!(cache.lines(), 64);
    assert_eq!(cache.sets(), 16);
    assert_eq!(cache.ways(), 4);
    assert_eq!(cache.eviction_set_size(), 4);
    assert_eq!(cache.ghm_group_size(), 4);
}
