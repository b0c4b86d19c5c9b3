//! # Component Masks
//!
//! A fixed-width bitset recording which component types an entity carries,
//! or which ones a system requires.

use std::fmt;

use super::component::ComponentId;

/// Maximum number of distinct component types per component manager.
pub const MAX_COMPONENTS: usize = 64;

/// Bitset of component IDs (one bit per registered component type).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ComponentMask(u64);

impl ComponentMask {
    /// Mask with no bits set.
    pub const EMPTY: Self = Self(0);

    /// Creates a mask from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Sets the bit for a component.
    #[inline]
    pub fn set(&mut self, id: ComponentId) {
        self.0 |= 1 << id.index();
    }

    /// Clears the bit for a component.
    #[inline]
    pub fn clear(&mut self, id: ComponentId) {
        self.0 &= !(1 << id.index());
    }

    /// Clears every bit.
    #[inline]
    pub fn reset(&mut self) {
        self.0 = 0;
    }

    /// Returns a copy with the bit for `id` set.
    #[inline]
    #[must_use]
    pub const fn with(self, id: ComponentId) -> Self {
        Self(self.0 | (1 << id.index()))
    }

    /// Checks whether the bit for a component is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, id: ComponentId) -> bool {
        (self.0 >> id.index()) & 1 == 1
    }

    /// True if every bit of `required` is also set in `self`.
    ///
    /// An empty requirement is satisfied by every mask.
    #[inline]
    #[must_use]
    pub const fn is_superset_of(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    /// True if no bits are set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of bits set.
    #[inline]
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterates over the component IDs whose bits are set, lowest first.
    pub fn iter(self) -> impl Iterator<Item = ComponentId> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let next = bits.trailing_zeros();
            bits &= bits - 1;
            #[allow(clippy::cast_possible_truncation)]
            Some(ComponentId::from_index(next as u8))
        })
    }
}

impl std::ops::BitOr for ComponentMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ComponentMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentMask({:#b})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: u8) -> ComponentId {
        ComponentId::from_index(i)
    }

    #[test]
    fn test_set_clear() {
        let mut mask = ComponentMask::EMPTY;
        assert!(!mask.contains(id(5)));

        mask.set(id(5));
        assert!(mask.contains(id(5)));
        assert_eq!(mask.count(), 1);

        mask.clear(id(5));
        assert!(mask.is_empty());
    }

    #[test]
    fn test_superset() {
        let entity = ComponentMask::EMPTY.with(id(0)).with(id(3)).with(id(63));
        let system = ComponentMask::EMPTY.with(id(0)).with(id(63));

        assert!(entity.is_superset_of(system));
        assert!(!system.is_superset_of(entity));
        assert!(entity.is_superset_of(ComponentMask::EMPTY));
        assert!(ComponentMask::EMPTY.is_superset_of(ComponentMask::EMPTY));
    }

    #[test]
    fn test_iter_order() {
        let mask = ComponentMask::EMPTY.with(id(9)).with(id(1)).with(id(40));
        let ids: Vec<u8> = mask.iter().map(ComponentId::index).collect();
        assert_eq!(ids, vec![1, 9, 40]);
    }
}
