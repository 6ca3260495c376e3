//! NewCache: fully-associative physical lines behind a logical-direct-mapped
//! indirection.
//!
//! A tag splits into a line-number register (`lnreg`, the low
//! `nbits + kbits` bits) and the remaining tag bits. Lookups go through a
//! `(context, lnreg)` mapping onto physical lines; an lnreg hit with a tag
//! mismatch replaces the line in place, while an lnreg miss claims a random
//! physical line and retires that line's previous mapping.

use std::collections::HashMap;

use crate::cache::{CacheModel, CacheResponse};
use crate::common::{CacheContext, Rng, Tag};

#[derive(Clone, Copy, Debug)]
struct Line {
    tag: Tag,
    context: CacheContext,
    lnreg: Tag,
}

/// NewCache model.
#[derive(Debug)]
pub struct NewCache {
    lines: Vec<Line>,
    map: HashMap<(u32, u64), usize>,
    nbits: u32,
    kbits: u32,
    nlines: usize,
    ldm_size: u64,
    rng: Rng,
}

impl NewCache {
    /// Builds a cache of `2^nbits` physical lines with a `2^(nbits+kbits)`
    /// logical-direct-mapped space.
    pub fn new(nbits: u32, kbits: u32, rng: Rng) -> Self {
        let nlines = 1usize << nbits;
        NewCache {
            lines: vec![
                Line {
                    tag: Tag::INIT,
                    context: CacheContext::ATTACKER,
                    lnreg: Tag::INIT,
                };
                nlines
            ],
            map: HashMap::new(),
            nbits,
            kbits,
            nlines,
            ldm_size: 1u64 << (nbits + kbits),
            rng,
        }
    }

    /// Index bits of the physical cache.
    pub fn nbits(&self) -> u32 {
        self.nbits
    }

    /// Extra logical-direct-mapped index bits.
    pub fn kbits(&self) -> u32 {
        self.kbits
    }

    fn split(&self, tag: Tag) -> (u64, u64) {
        (tag.val() % self.ldm_size, tag.val() / self.ldm_size)
    }

    fn rebuild_tag(&self, upper: Tag, lnreg: Tag) -> Tag {
        if upper.is_sentinel() || lnreg.is_sentinel() {
            Tag::NONE
        } else {
            Tag(upper.val() * self.ldm_size + lnreg.val())
        }
    }
}

impl CacheModel for NewCache {
    fn cache_type(&self) -> &'static str {
        "newcache"
    }

    fn lines(&self) -> usize {
        self.nlines
    }

    fn sets(&self) -> usize {
        1
    }

    fn ways(&self) -> usize {
        self.nlines
    }

    fn eviction_set_size(&self) -> usize {
        self.nlines
    }

    fn ghm_group_size(&self) -> usize {
        1
    }

    fn params(&self) -> Vec<u32> {
        vec![self.kbits]
    }

    fn read_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let (lnreg, upper) = self.split(tag);
        let key = (ctx.core_id(), lnreg);

        if let Some(&slot) = self.map.get(&key) {
            let resident = self.lines[slot];
            if resident.tag == Tag(upper) {
                responses.push(CacheResponse::hit());
                return true;
            }
            // lnreg hit, tag miss: replace in place.
            let displaced = self.rebuild_tag(resident.tag, Tag(lnreg));
            responses.push(CacheResponse::miss_evicting(displaced));
            self.lines[slot].tag = Tag(upper);
            return false;
        }

        // Index miss: claim a random physical line.
        let slot = self.rng.index(self.nlines);
        let resident = self.lines[slot];
        if !resident.tag.is_sentinel() {
            let old_key = (resident.context.core_id(), resident.lnreg.val());
            self.map.remove(&old_key);
        }
        let displaced = self.rebuild_tag(resident.tag, resident.lnreg);
        responses.push(CacheResponse::miss_evicting(displaced));
        self.lines[slot] = Line {
            tag: Tag(upper),
            context: ctx,
            lnreg: Tag(lnreg),
        };
        self.map.insert(key, slot);
        false
    }

    fn evict_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let (lnreg, upper) = self.split(tag);
        let key = (ctx.core_id(), lnreg);
        if let Some(&slot) = self.map.get(&key) {
            if self.lines[slot].tag == Tag(upper) {
                self.lines[slot] = Line {
                    tag: Tag::NONE,
                    context: ctx,
                    lnreg: Tag::NONE,
                };
                self.map.remove(&key);
                responses.push(CacheResponse::invalidated(tag));
                return true;
            }
        }
        responses.push(CacheResponse::miss());
        false
    }

    fn has_collision(&self, _a: Tag, _ctx_a: CacheContext, _b: Tag, _ctx_b: CacheContext) -> bool {
        // Random physical placement: any pair can compete.
        true
    }
}
