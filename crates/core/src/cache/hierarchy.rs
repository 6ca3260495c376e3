//! Multi-level cache hierarchy.
//!
//! Levels are consulted in order; a miss forwards to the next level and
//! every response is stamped with the 1-based level that produced it.
//! Invalidation broadcasts to all levels. Each level is a full [`Cache`]
//! and keeps its own per-context statistics.

use crate::cache::{Cache, CacheModel, CacheResponse, ReplacementPolicy};
use crate::common::{CacheContext, Tag};

/// Ordered list of cache levels, L1 first.
#[derive(Debug)]
pub struct CacheHierarchy {
    levels: Vec<Cache>,
}

impl CacheHierarchy {
    /// Builds a hierarchy from its levels in ascending order.
    pub fn new(levels: Vec<Cache>) -> Self {
        CacheHierarchy { levels }
    }

    /// Number of levels.
    pub fn levels(&self) -> usize {
        self.levels.len()
    }

    /// One level, 0-based.
    pub fn level(&self, index: usize) -> &Cache {
        &self.levels[index]
    }

    /// One level, 0-based, mutable.
    pub fn level_mut(&mut self, index: usize) -> &mut Cache {
        &mut self.levels[index]
    }

    fn walk(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
        op: fn(&mut Cache, Tag, CacheContext, &mut Vec<CacheResponse>) -> bool,
    ) -> bool {
        let mut hit = false;
        for (index, level) in self.levels.iter_mut().enumerate() {
            let start = responses.len();
            hit = op(level, tag, ctx, responses);
            for resp in &mut responses[start..] {
                resp.level = (index + 1) as u8;
            }
            if hit {
                break;
            }
        }
        hit
    }
}

impl CacheModel for CacheHierarchy {
    fn cache_type(&self) -> &'static str {
        "cache-hierarchy"
    }

    fn lines(&self) -> usize {
        self.levels.iter().map(Cache::lines).sum()
    }

    fn sets(&self) -> usize {
        self.levels.iter().map(Cache::sets).max().unwrap_or(0)
    }

    fn ways(&self) -> usize {
        let sets = self.sets();
        if sets == 0 {
            0
        } else {
            self.lines() / sets
        }
    }

    fn eviction_set_size(&self) -> usize {
        if self.levels.len() == 1 {
            self.levels[0].eviction_set_size()
        } else {
            0
        }
    }

    fn ghm_group_size(&self) -> usize {
        if self.levels.len() == 1 {
            self.levels[0].ghm_group_size()
        } else {
            0
        }
    }

    fn algorithm(&self) -> ReplacementPolicy {
        if self.levels.len() == 1 {
            self.levels[0].algorithm()
        } else {
            ReplacementPolicy::Random
        }
    }

    fn params(&self) -> Vec<u32> {
        if self.levels.len() == 1 {
            self.levels[0].model().as_model().params()
        } else {
            Vec::new()
        }
    }

    fn read_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        self.walk(tag, ctx, responses, |c, t, x, r| c.read_with(t, x, r))
    }

    fn write_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        self.walk(tag, ctx, responses, |c, t, x, r| c.write_with(t, x, r))
    }

    fn exec_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        self.walk(tag, ctx, responses, |c, t, x, r| c.exec_with(t, x, r))
    }

    fn evict_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let mut any_hit = false;
        for (index, level) in self.levels.iter_mut().enumerate() {
            let start = responses.len();
            any_hit |= level.evict_with(tag, ctx, responses);
            for resp in &mut responses[start..] {
                resp.level = (index + 1) as u8;
            }
        }
        any_hit
    }

    fn has_collision(&self, a: Tag, ctx_a: CacheContext, b: Tag, ctx_b: CacheContext) -> bool {
        self.levels
            .iter()
            .any(|level| level.has_collision(a, ctx_a, b, ctx_b))
    }
}
