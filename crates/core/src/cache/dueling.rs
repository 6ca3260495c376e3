//! DIP / DRRIP set-duelling.
//!
//! Two shadow instances of the same geometry run under the competing
//! insertion policies (LRU vs BIP for DIP, SRRIP vs BRRIP for DRRIP).
//! Every access feeds both; a saturating selector counter tracks which
//! side misses less, and the winner's responses are the ones reported.

use crate::cache::{CacheModel, CacheModelKind, CacheResponse, ReplacementPolicy};
use crate::common::{CacheContext, Tag};

/// Width of the policy selector counter.
const PSEL_BITS: u32 = 4;

/// Set-duelling wrapper over two shadow caches.
#[derive(Debug)]
pub struct DuelingCache {
    primary: Box<CacheModelKind>,
    alternate: Box<CacheModelKind>,
    algorithm: ReplacementPolicy,
    psel: u32,
    scratch_primary: Vec<CacheResponse>,
    scratch_alternate: Vec<CacheResponse>,
}

impl DuelingCache {
    /// Wraps the two shadow instances. `primary` runs the baseline policy
    /// (LRU or SRRIP), `alternate` the bimodal one (BIP or BRRIP);
    /// `algorithm` is the duelling policy being reported (DIP or DRRIP).
    pub fn new(
        algorithm: ReplacementPolicy,
        primary: CacheModelKind,
        alternate: CacheModelKind,
    ) -> Self {
        debug_assert!(matches!(
            algorithm,
            ReplacementPolicy::Dip | ReplacementPolicy::Drrip
        ));
        DuelingCache {
            primary: Box::new(primary),
            alternate: Box::new(alternate),
            algorithm,
            psel: 0,
            scratch_primary: Vec::with_capacity(4),
            scratch_alternate: Vec::with_capacity(4),
        }
    }

    fn alternate_winning(&self) -> bool {
        self.psel & (1 << (PSEL_BITS - 1)) != 0
    }

    fn update_psel(&mut self, primary_hit: bool, alternate_hit: bool) {
        if !alternate_hit {
            self.psel = self.psel.saturating_sub(1);
        }
        if !primary_hit {
            self.psel = (self.psel + 1).min((1 << PSEL_BITS) - 1);
        }
    }

    fn primary_model(&self) -> &dyn CacheModel {
        self.primary.as_model()
    }

    /// Runs one operation against both shadows and reports the winner's
    /// responses.
    fn duel(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
        op: fn(&mut dyn CacheModel, Tag, CacheContext, &mut Vec<CacheResponse>) -> bool,
    ) -> bool {
        let mut primary_resp = std::mem::take(&mut self.scratch_primary);
        let mut alternate_resp = std::mem::take(&mut self.scratch_alternate);
        primary_resp.clear();
        alternate_resp.clear();

        let primary_hit = op(self.primary.as_model_mut(), tag, ctx, &mut primary_resp);
        let alternate_hit = op(self.alternate.as_model_mut(), tag, ctx, &mut alternate_resp);

        let winner_hit = if self.alternate_winning() {
            responses.extend_from_slice(&alternate_resp);
            alternate_hit
        } else {
            responses.extend_from_slice(&primary_resp);
            primary_hit
        };
        self.update_psel(primary_hit, alternate_hit);

        self.scratch_primary = primary_resp;
        self.scratch_alternate = alternate_resp;
        winner_hit
    }
}

impl CacheModel for DuelingCache {
    fn cache_type(&self) -> &'static str {
        self.primary_model().cache_type()
    }

    fn lines(&self) -> usize {
        self.primary_model().lines()
    }

    fn sets(&self) -> usize {
        self.primary_model().sets()
    }

    fn ways(&self) -> usize {
        self.primary_model().ways()
    }

    fn eviction_set_size(&self) -> usize {
        self.primary_model().eviction_set_size()
    }

    fn ghm_group_size(&self) -> usize {
        self.primary_model().ghm_group_size()
    }

    fn algorithm(&self) -> ReplacementPolicy {
        self.algorithm
    }

    fn params(&self) -> Vec<u32> {
        self.primary_model().params()
    }

    fn read_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        self.duel(tag, ctx, responses, |m, t, c, r| m.read_line(t, c, r))
    }

    fn write_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        self.duel(tag, ctx, responses, |m, t, c, r| m.write_line(t, c, r))
    }

    fn exec_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        self.duel(tag, ctx, responses, |m, t, c, r| m.exec_line(t, c, r))
    }

    fn evict_line(
        &mut self,
        tag: Tag,
        ctx: CacheContext,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        self.duel(tag, ctx, responses, |m, t, c, r| m.evict_line(t, c, r))
    }

    fn has_collision(&self, a: Tag, ctx_a: CacheContext, b: Tag, ctx_b: CacheContext) -> bool {
        self.primary_model().has_collision(a, ctx_a, b, ctx_b)
            || self.alternate.as_model().has_collision(a, ctx_a, b, ctx_b)
    }
}
