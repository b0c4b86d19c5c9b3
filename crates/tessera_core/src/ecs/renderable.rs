//! # Renderable Capability
//!
//! Systems that draw expose a [`Renderable`] through
//! [`System::as_renderable`](super::System::as_renderable). The scene calls
//! them in registration order each render pass.

use super::entity::Entity;
use super::world::World;

/// Bitmask used to filter what a renderable draws in a given pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct RenderFlags(pub u64);

impl RenderFlags {
    /// Every flag set.
    pub const ALL: Self = Self(u64::MAX);

    /// Highest bit: geometry drawn only into the final buffer.
    pub const REFLECTION_PLANE: Self = Self(1 << 63);

    /// True if any flag is shared.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::ops::Not for RenderFlags {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

/// Dimensions of whatever is being drawn into.
pub trait RenderTarget {
    /// Width and height in pixels.
    fn size(&self) -> (u32, u32);
}

/// Drawing half of a system.
pub trait Renderable: Send {
    /// Rebuilds the draw list visible from `camera`.
    fn update_draw_list(&mut self, world: &World, camera: Entity);

    /// Draws the current draw list into `target`.
    fn render(&mut self, world: &World, camera: Entity, target: &dyn RenderTarget);

    /// Forgets any cached reference to an entity about to be destroyed.
    fn flush_entity(&mut self, _entity: Entity) {}

    /// Flags filtering the next render operation.
    fn render_flags(&self) -> RenderFlags {
        RenderFlags::ALL
    }

    /// Replaces the render flags. Implementers that filter store them.
    fn set_render_flags(&mut self, _flags: RenderFlags) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        assert!(RenderFlags::ALL.intersects(RenderFlags::REFLECTION_PLANE));
        assert!(!(!RenderFlags::REFLECTION_PLANE).intersects(RenderFlags::REFLECTION_PLANE));
        assert_eq!(RenderFlags::default(), RenderFlags::ALL);
    }
}
