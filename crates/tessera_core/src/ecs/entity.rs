//! # Entity Handles
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into the entity manager's slot tables (24 bits)
//! - A generation counter for safe reuse (8 bits)

use std::fmt;

/// Number of bits used for the slot index.
pub const INDEX_BITS: u32 = 24;

/// Number of bits used for the generation counter.
pub const GENERATION_BITS: u32 = 8;

/// Largest index an entity can carry.
pub const MAX_INDEX: u32 = (1 << INDEX_BITS) - 1;

const INDEX_MASK: u32 = MAX_INDEX;

/// Handle identifying an entity slot at a specific generation.
///
/// The handle is packed into a single `u32`:
/// - Lower 24 bits: Index into the entity tables
/// - Upper 8 bits: Generation counter for detecting stale references
///
/// A handle is only meaningful to the manager that created it. Once the
/// slot's generation moves on the handle is dead and every operation on
/// it fails safely.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Entity(u32);

impl Entity {
    /// Null/invalid entity handle. Never refers to a slot.
    pub const NULL: Self = Self(u32::MAX);

    /// Creates a handle from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - The slot index (0 to 2^24-2)
    /// * `generation` - The generation counter
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u8) -> Self {
        debug_assert!(index < MAX_INDEX, "Entity index out of range");
        Self(((generation as u32) << INDEX_BITS) | (index & INDEX_MASK))
    }

    /// Returns the index portion of the handle.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 & INDEX_MASK
    }

    /// Returns the generation portion of the handle.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn generation(self) -> u8 {
        (self.0 >> INDEX_BITS) as u8
    }

    /// Returns the packed representation.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Rebuilds a handle from its packed representation.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Checks if this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("Entity(null)")
        } else {
            write!(f, "Entity({}v{})", self.index(), self.generation())
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
