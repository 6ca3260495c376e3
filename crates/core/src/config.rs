//! Configuration documents and the cache-hierarchy builder.
//!
//! An experiment is described by a JSON document listing cache levels:
//!
//! ```json
//! {
//!     "caches": [
//!         { "level": 1, "type": "set-associative", "lines": 512,
//!           "ways": 8, "policy": "lru" },
//!         { "level": 2, "type": "ceaser-s", "lines": 4096, "ways": 16,
//!           "partitions": 2 }
//!     ]
//! }
//! ```
//!
//! Levels are numbered from 1 and reassembled in ascending order. The
//! builder applies the documented fallbacks: tree-PLRU on a non-power-of-
//! two way count degrades to bit-PLRU, and a CEASER-S partition count that
//! does not divide the ways degrades to a single partition. Both are
//! logged once per construction.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::cache::{
    AssocCache, Cache, CacheHierarchy, CacheModelKind, CeaserCache, CeaserSCache, DuelingCache,
    NewCache, PhantomCache, PlCache, ReplacementPolicy, ScatterCache, SetAssocCache,
    WayPartitionCache,
};
use crate::common::{Error, Rng};

/// Root configuration document.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Cache levels, in any order; `level` fields decide the hierarchy.
    pub caches: Vec<CacheLevelConfig>,

    /// Optional PRNG seed; the command line takes precedence.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// The cache organisations a level can instantiate.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CacheKind {
    /// Fully-associative.
    Associative,
    /// Fully-associative with per-line locking.
    AssociativePl,
    /// Set-associative.
    SetAssociative,
    /// Set-associative with per-line locking.
    PlCache,
    /// Encrypted-index set-associative.
    Ceaser,
    /// Skewed encrypted-index.
    CeaserS,
    /// Per-way skewed.
    #[serde(alias = "scatter")]
    ScatterCache,
    /// Salted candidate sets.
    Phantom,
    /// Line-number-register indirection.
    #[serde(alias = "new-cache")]
    Newcache,
    /// Per-domain way partitioning.
    WayPartition,
}

impl CacheKind {
    /// Configuration name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            CacheKind::Associative => "associative",
            CacheKind::AssociativePl => "associative-pl",
            CacheKind::SetAssociative => "set-associative",
            CacheKind::PlCache => "pl-cache",
            CacheKind::Ceaser => "ceaser",
            CacheKind::CeaserS => "ceaser-s",
            CacheKind::ScatterCache => "scatter-cache",
            CacheKind::Phantom => "phantom",
            CacheKind::Newcache => "newcache",
            CacheKind::WayPartition => "way-partition",
        }
    }
}

/// One cache level of the hierarchy.
#[derive(Clone, Debug, Deserialize)]
pub struct CacheLevelConfig {
    /// 1-based position in the hierarchy.
    #[serde(default = "defaults::level")]
    pub level: u32,

    /// Cache organisation.
    #[serde(rename = "type")]
    pub kind: CacheKind,

    /// Total number of lines.
    pub lines: usize,

    /// Associativity, where the organisation has one.
    #[serde(default = "defaults::ways")]
    pub ways: usize,

    /// Replacement policy, where the organisation uses one.
    #[serde(default)]
    pub policy: ReplacementPolicy,

    /// Whether unset ways are filled before the replacement policy runs.
    /// Defaults to the organisation's historical behaviour: on for the
    /// associative families (including their keyed, locked, and
    /// partitioned derivatives), off for the purely random skewed ones
    /// (`ceaser-s`, `scatter-cache`). `newcache` has no replacement policy
    /// to bypass — its random fill always claims unset lines first — and
    /// ignores the field.
    #[serde(default)]
    pub invalid_first: Option<bool>,

    /// NewCache: index bits of the physical cache. Defaults to
    /// `log2(lines)`.
    #[serde(default)]
    pub n_bits: Option<u32>,

    /// NewCache: extra logical-direct-mapped index bits.
    #[serde(default = "defaults::k_bits")]
    pub k_bits: u32,

    /// CEASER-S: number of skewed partitions.
    #[serde(default = "defaults::partitions")]
    pub partitions: usize,

    /// Phantom: number of salted candidate sets per address.
    #[serde(default = "defaults::random_sets")]
    pub random_sets: usize,

    /// Way-partition: ways reserved for the victim domain.
    #[serde(default = "defaults::secure_ways")]
    pub secure_ways: usize,
}

mod defaults {
    pub fn level() -> u32 {
        1
    }

    pub fn ways() -> usize {
        1
    }

    pub fn k_bits() -> u32 {
        2
    }

    pub fn partitions() -> usize {
        1
    }

    pub fn random_sets() -> usize {
        2
    }

    pub fn secure_ways() -> usize {
        1
    }
}

impl Config {
    /// Loads and parses a configuration file.
    pub fn from_path(path: &Path) -> Result<Config, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_owned(),
            source,
        })
    }

    /// Parses a configuration from a JSON string.
    pub fn from_json(text: &str) -> Result<Config, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Builds the configured cache hierarchy.
    ///
    /// The result is always a [`CacheHierarchy`]-wrapped [`Cache`], even
    /// for a single level; geometry queries delegate to the only level in
    /// that case.
    pub fn build_hierarchy(&self, rng: &mut Rng) -> Result<Cache, Error> {
        if self.caches.is_empty() {
            return Err(Error::EmptyHierarchy);
        }

        let count = self.caches.len();
        let mut slots: Vec<Option<Cache>> = (0..count).map(|_| None).collect();
        for level_cfg in &self.caches {
            let level = level_cfg.level;
            let index = level
                .checked_sub(1)
                .map(|i| i as usize)
                .filter(|&i| i < count && slots[i].is_none())
                .ok_or(Error::InvalidLevel { level, count })?;
            slots[index] = Some(Cache::new(build_level(level_cfg, rng)?));
        }

        let levels = slots.into_iter().map(|s| s.expect("level filled")).collect();
        Ok(Cache::new(CacheModelKind::Hierarchy(CacheHierarchy::new(
            levels,
        ))))
    }
}

fn validated_geometry(cfg: &CacheLevelConfig) -> Result<(usize, usize), Error> {
    if cfg.lines == 0 {
        return Err(Error::ZeroGeometry {
            level: cfg.level,
            field: "lines",
        });
    }
    if cfg.ways == 0 {
        return Err(Error::ZeroGeometry {
            level: cfg.level,
            field: "ways",
        });
    }
    if cfg.lines % cfg.ways != 0 {
        return Err(Error::IndivisibleWays {
            level: cfg.level,
            lines: cfg.lines,
            ways: cfg.ways,
        });
    }
    Ok((cfg.lines / cfg.ways, cfg.ways))
}

fn warn_tree_plru_fallback(cfg: &CacheLevelConfig, ways: usize) {
    if cfg.policy == ReplacementPolicy::TreePlru && !ways.is_power_of_two() {
        warn!(
            level = cfg.level,
            ways, "tree-plru needs a power-of-two way count; falling back to bit-plru"
        );
    }
}

/// Builds one level's model under one concrete replacement policy.
fn build_plain(
    cfg: &CacheLevelConfig,
    policy: ReplacementPolicy,
    rng: &mut Rng,
) -> Result<CacheModelKind, Error> {
    let invalid_first = cfg.invalid_first.unwrap_or(true);
    Ok(match cfg.kind {
        CacheKind::Associative => {
            if cfg.lines == 0 {
                return Err(Error::ZeroGeometry {
                    level: cfg.level,
                    field: "lines",
                });
            }
            warn_tree_plru_fallback(cfg, cfg.lines);
            CacheModelKind::Assoc(AssocCache::new(policy, cfg.lines, invalid_first, rng.fork()))
        }
        CacheKind::AssociativePl => {
            if cfg.lines == 0 {
                return Err(Error::ZeroGeometry {
                    level: cfg.level,
                    field: "lines",
                });
            }
            warn_tree_plru_fallback(cfg, cfg.lines);
            let mut cache = AssocCache::with_locking(policy, cfg.lines, rng.fork());
            cache.set_invalid_first(invalid_first);
            CacheModelKind::Assoc(cache)
        }
        CacheKind::SetAssociative => {
            let (nsets, nways) = validated_geometry(cfg)?;
            warn_tree_plru_fallback(cfg, nways);
            let mut cache = SetAssocCache::new(policy, nsets, nways, rng);
            cache.set_invalid_first(invalid_first);
            CacheModelKind::SetAssoc(cache)
        }
        CacheKind::PlCache => {
            let (nsets, nways) = validated_geometry(cfg)?;
            warn_tree_plru_fallback(cfg, nways);
            let mut cache = PlCache::new(policy, nsets, nways, rng);
            cache.set_invalid_first(invalid_first);
            CacheModelKind::Pl(cache)
        }
        CacheKind::Ceaser => {
            let (nsets, nways) = validated_geometry(cfg)?;
            warn_tree_plru_fallback(cfg, nways);
            let mut cache = CeaserCache::new(policy, nsets, nways, rng);
            cache.set_invalid_first(invalid_first);
            CacheModelKind::Ceaser(cache)
        }
        CacheKind::CeaserS => {
            let (nsets, nways) = validated_geometry(cfg)?;
            if cfg.partitions == 0 || nways % cfg.partitions != 0 {
                warn!(
                    level = cfg.level,
                    partitions = cfg.partitions,
                    nways,
                    "partitions do not divide the ways; using a single partition"
                );
            }
            let mut cache = CeaserSCache::new(nsets, nways, cfg.partitions, rng.fork());
            cache.set_invalid_first(cfg.invalid_first.unwrap_or(false));
            CacheModelKind::CeaserS(cache)
        }
        CacheKind::ScatterCache => {
            let (nsets, nways) = validated_geometry(cfg)?;
            let mut cache = ScatterCache::new(nsets, nways, rng.fork());
            cache.set_invalid_first(cfg.invalid_first.unwrap_or(false));
            CacheModelKind::Scatter(cache)
        }
        CacheKind::Phantom => {
            let (nsets, nways) = validated_geometry(cfg)?;
            warn_tree_plru_fallback(cfg, nways);
            if cfg.random_sets == 0 {
                return Err(Error::ZeroGeometry {
                    level: cfg.level,
                    field: "random_sets",
                });
            }
            let mut cache = PhantomCache::new(policy, nsets, nways, cfg.random_sets, rng);
            cache.set_invalid_first(invalid_first);
            CacheModelKind::Phantom(cache)
        }
        CacheKind::Newcache => {
            if cfg.lines == 0 {
                return Err(Error::ZeroGeometry {
                    level: cfg.level,
                    field: "lines",
                });
            }
            let n_bits = cfg
                .n_bits
                .unwrap_or_else(|| cfg.lines.next_power_of_two().trailing_zeros());
            CacheModelKind::New(NewCache::new(n_bits, cfg.k_bits, rng.fork()))
        }
        CacheKind::WayPartition => {
            let (nsets, nways) = validated_geometry(cfg)?;
            warn_tree_plru_fallback(cfg, nways);
            if cfg.secure_ways == 0 || cfg.secure_ways >= nways {
                return Err(Error::ZeroGeometry {
                    level: cfg.level,
                    field: "secure_ways",
                });
            }
            let mut cache = WayPartitionCache::new(policy, nsets, nways, cfg.secure_ways, rng);
            cache.set_invalid_first(invalid_first);
            CacheModelKind::WayPartition(cache)
        }
    })
}

fn build_level(cfg: &CacheLevelConfig, rng: &mut Rng) -> Result<CacheModelKind, Error> {
    match cfg.policy {
        ReplacementPolicy::Dip | ReplacementPolicy::Drrip => {
            let incompatible = matches!(
                cfg.kind,
                CacheKind::ScatterCache | CacheKind::CeaserS | CacheKind::Newcache
            );
            if incompatible {
                return Err(Error::IncompatiblePolicy {
                    level: cfg.level,
                    policy: cfg.policy.name().to_owned(),
                    cache_type: cfg.kind.name().to_owned(),
                });
            }
            let (primary_policy, alternate_policy) = if cfg.policy == ReplacementPolicy::Dip {
                (ReplacementPolicy::Lru, ReplacementPolicy::Bip)
            } else {
                (ReplacementPolicy::Srrip, ReplacementPolicy::Brrip)
            };
            let primary = build_plain(cfg, primary_policy, rng)?;
            let alternate = build_plain(cfg, alternate_policy, rng)?;
            Ok(CacheModelKind::Dueling(DuelingCache::new(
                cfg.policy, primary, alternate,
            )))
        }
        policy => build_plain(cfg, policy, rng),
    }
}
