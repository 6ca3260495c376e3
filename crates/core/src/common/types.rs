//! Line tags and the simulated address space.
//!
//! The simulator operates on a flat 64-bit address space. Caches never see
//! raw addresses; the memory-handle layer divides them by the line size and
//! hands the resulting *tag* to the cache model.

/// A byte address (or byte offset) in the flat simulated address space.
pub type Address = u64;

/// Size of a cache line in bytes. Fixed power of two.
pub const CACHE_LINE_SIZE: u64 = 64;

/// Identifies one cache-line-sized region of the simulated address space.
///
/// Two sentinel values exist alongside real tags: [`Tag::NONE`] marks a way
/// that holds nothing and never did (an explicitly evicted slot), while
/// [`Tag::INIT`] marks a way that is still in its post-reset state and may
/// be filled before any real line competes for it. Sentinels are never
/// reported as evicted lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub u64);

impl Tag {
    /// Unset sentinel: this way holds no line.
    pub const NONE: Tag = Tag(u64::MAX);

    /// Invalid sentinel: this way has never been filled since construction.
    pub const INIT: Tag = Tag(u64::MAX - 1);

    /// Tag covering the given byte address.
    #[inline]
    pub fn of(addr: Address) -> Tag {
        Tag(addr / CACHE_LINE_SIZE)
    }

    /// Raw 64-bit tag value.
    #[inline]
    pub fn val(self) -> u64 {
        self.0
    }

    /// True for the [`Tag::NONE`] and [`Tag::INIT`] sentinels.
    #[inline]
    pub fn is_sentinel(self) -> bool {
        self == Tag::NONE || self == Tag::INIT
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Tag::NONE => write!(f, "<none>"),
            Tag::INIT => write!(f, "<init>"),
            Tag(v) => write!(f, "{v:#x}"),
        }
    }
}
