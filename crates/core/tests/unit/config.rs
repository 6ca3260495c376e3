//! Configuration loading and hierarchy-builder tests.

use cachefx_core::cache::ReplacementPolicy;
use cachefx_core::common::{Error, Rng};
use cachefx_core::config::{CacheKind, Config};
use pretty_assertions::assert_eq;

fn build(json: &str) -> Result<cachefx_core::cache::Cache, Error> {
    let config = Config::from_json(json).expect("valid JSON");
    let mut rng = Rng::new(1);
    config.build_hierarchy(&mut rng)
}

/// A minimal document parses with defaults applied.
#[test]
fn parses_minimal_document() {
    let config = Config::from_json(
        r#"{ "caches": [ { "type": "set-associative", "lines": 512, "ways": 8 } ] }"#,
    )
    .expect("parse");
    assert_eq!(config.caches.len(), 1);
    let level = &config.caches[0];
    assert_eq!(level.level, 1);
    assert_eq!(level.kind, CacheKind::SetAssociative);
    assert_eq!(level.policy, ReplacementPolicy::Lru);
    assert_eq!(level.partitions, 1);
}

/// Unknown cache types are parse errors.
#[test]
fn unknown_type_is_rejected() {
    assert!(Config::from_json(r#"{ "caches": [ { "type": "mystery", "lines": 64 } ] }"#).is_err());
}

/// An empty hierarchy cannot be built.
#[test]
fn empty_hierarchy_is_rejected() {
    assert!(matches!(
        build(r#"{ "caches": [] }"#),
        Err(Error::EmptyHierarchy)
    ));
}

/// Duplicate or out-of-range levels are rejected.
#[test]
fn bad_levels_are_rejected() {
    let json = r#"{ "caches": [
        { "level": 1, "type": "associative", "lines": 16 },
        { "level": 1, "type": "associative", "lines": 16 }
    ] }"#;
    assert!(matches!(build(json), Err(Error::InvalidLevel { .. })));

    let json = r#"{ "caches": [ { "level": 3, "type": "associative", "lines": 16 } ] }"#;
    assert!(matches!(build(json), Err(Error::InvalidLevel { .. })));
}

/// Levels reassemble in ascending order regardless of listing order.
#[test]
fn levels_reassemble_in_order() {
    let json = r#"{ "caches": [
        { "level": 2, "type": "set-associative", "lines": 256, "ways": 8 },
        { "level": 1, "type": "associative", "lines": 16 }
    ] }"#;
    let cache = build(json).expect("build");
    assert_eq!(cache.describe().cache_type, "associative");
    assert_eq!(cache.lines(), 272);
}

/// Tree-PLRU on a non-power-of-two way count reports bit-PLRU.
#[test]
fn tree_plru_fallback_is_visible() {
    let json = r#"{ "caches": [
        { "type": "set-associative", "lines": 36, "ways": 6, "policy": "tree-plru" }
    ] }"#;
    let cache = build(json).expect("build");
    assert_eq!(cache.algorithm(), ReplacementPolicy::BitPlru);
}

/// Non-divisible CEASER-S partitioning degrades to one partition.
#[test]
fn ceaser_s_partition_fallback_is_visible() {
    let json = r#"{ "caches": [
        { "type": "ceaser-s", "lines": 96, "ways": 6, "partitions": 4 }
    ] }"#;
    let cache = build(json).expect("build");
    assert_eq!(cache.describe().params[0], 1);
}

/// Indivisible geometry is rejected.
#[test]
fn indivisible_ways_are_rejected() {
    let json = r#"{ "caches": [ { "type": "set-associative", "lines": 100, "ways": 8 } ] }"#;
    assert!(matches!(build(json), Err(Error::IndivisibleWays { .. })));
}

/// DIP cannot drive the purely random skewed organisations.
#[test]
fn dip_rejects_incompatible_types() {
    let json = r#"{ "caches": [
        { "type": "scatter-cache", "lines": 64, "ways": 4, "policy": "dip" }
    ] }"#;
    assert!(matches!(build(json), Err(Error::IncompatiblePolicy { .. })));
}

/// DIP over a set-associative cache builds and reports itself.
#[test]
fn dip_builds_for_set_associative() {
    let json = r#"{ "caches": [
        { "type": "set-associative", "lines": 64, "ways": 4, "policy": "dip" }
    ] }"#;
    let cache = build(json).expect("build");
    assert_eq!(cache.algorithm(), ReplacementPolicy::Dip);
    assert_eq!(cache.describe().cache_type, "set-associative");
}

/// The type-specific parameters flow through to the built cache.
#[test]
fn type_specific_parameters_apply() {
    let json = r#"{ "caches": [
        { "type": "phantom", "lines": 64, "ways": 4, "random_sets": 3 }
    ] }"#;
    let cache = build(json).expect("build");
    assert_eq!(cache.describe().params[0], 3);
    assert_eq!(cache.eviction_set_size(), 12);

    let json = r#"{ "caches": [
        { "type": "newcache", "lines": 64, "k_bits": 3 }
    ] }"#;
    let cache = build(json).expect("build");
    assert_eq!(cache.describe().params[0], 3);
    assert_eq!(cache.lines(), 64);
}

/// A missing file surfaces a configuration-read error.
#[test]
fn missing_file_is_an_error() {
    let err = Config::from_path(std::path::Path::new("/nonexistent/config.json")).unwrap_err();
    assert!(matches!(err, Error::ConfigRead { .. }));
}
