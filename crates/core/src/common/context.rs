//! Cache contexts.
//!
//! A context is a small integer naming the security domain (or core) an
//! access belongs to. Partitioned caches route requests by context, skewed
//! caches fold it into their index tweak, and the statistics layer keys its
//! per-domain counters on it.

/// Security domain / core identifier attached to every cache access.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheContext(u32);

impl CacheContext {
    /// The attacker's domain.
    pub const ATTACKER: CacheContext = CacheContext(0);

    /// The victim's domain.
    pub const VICTIM: CacheContext = CacheContext(1);

    /// Context for an arbitrary core id.
    #[inline]
    pub fn new(core_id: u32) -> CacheContext {
        CacheContext(core_id)
    }

    /// The core id this context names.
    #[inline]
    pub fn core_id(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for CacheContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            CacheContext::ATTACKER => write!(f, "attacker"),
            CacheContext::VICTIM => write!(f, "victim"),
            CacheContext(id) => write!(f, "core{id}"),
        }
    }
}
