//! # Scene Components
//!
//! The two components the scene itself depends on. Everything else is
//! defined by applications.

use super::component::Component;
use super::entity::Entity;
use super::renderable::RenderFlags;
use super::world::World;

/// Parent chains deeper than this are treated as cycles.
const MAX_HIERARCHY_DEPTH: usize = 64;

/// Normalised rectangle, origin bottom-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloatRect {
    /// Left edge.
    pub left: f32,
    /// Bottom edge.
    pub bottom: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl FloatRect {
    /// Creates a rectangle.
    #[inline]
    #[must_use]
    pub const fn new(left: f32, bottom: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            bottom,
            width,
            height,
        }
    }
}

impl Default for FloatRect {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}

/// Position and scale, optionally relative to a parent entity.
///
/// The parent is a weak reference: a stale parent handle is ignored when
/// resolving world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Position relative to the parent.
    pub position: [f32; 3],
    /// Scale applied to children.
    pub scale: [f32; 3],
    /// Parent entity, if any.
    pub parent: Option<Entity>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            scale: [1.0; 3],
            parent: None,
        }
    }
}

impl Component for Transform {}

impl Transform {
    /// Creates a root transform at `position`.
    #[must_use]
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Resolves an entity's position in world space by walking its parents.
    ///
    /// # Returns
    ///
    /// `None` if the entity has no `Transform`.
    #[must_use]
    pub fn world_position(world: &World, entity: Entity) -> Option<[f32; 3]> {
        let mut current = world.component::<Self>(entity)?;
        let mut position = current.position;

        for depth in 0.. {
            let Some(parent) = current.parent else {
                break;
            };
            let Some(parent_transform) = world.component::<Self>(parent) else {
                break;
            };
            if depth >= MAX_HIERARCHY_DEPTH {
                tracing::warn!(%entity, "transform hierarchy too deep; truncated");
                break;
            }
            for (axis, value) in position.iter_mut().enumerate() {
                *value = parent_transform.position[axis] + parent_transform.scale[axis] * *value;
            }
            current = parent_transform;
        }
        Some(position)
    }
}

/// Viewpoint used by renderables.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Normalised area of the render target drawn into.
    pub viewport: FloatRect,
    /// Flags passed to renderables when drawing from this camera.
    pub render_flags: RenderFlags,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            viewport: FloatRect::default(),
            render_flags: RenderFlags::ALL,
        }
    }
}

impl Component for Camera {}

impl Camera {
    /// Fits a 16:9 viewport into a `width` x `height` target, letterboxing
    /// or pillarboxing as needed.
    pub fn update_view(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        #[allow(clippy::cast_precision_loss)]
        let (w, h) = (width as f32, height as f32);
        let ratio = ((w / 16.0) * 9.0) / h;
        self.viewport = if ratio <= 1.0 {
            FloatRect::new(0.0, (1.0 - ratio) / 2.0, 1.0, ratio)
        } else {
            let inverse = 1.0 / ratio;
            FloatRect::new((1.0 - inverse) / 2.0, 0.0, inverse, 1.0)
        };
    }
}
