//! Built-in message IDs and payloads.

use bytemuck::{Pod, Zeroable};

/// Window notifications, payload [`WindowEvent`].
pub const WINDOW_MESSAGE: i32 = 0;

/// Scene notifications, payload [`SceneEvent`].
pub const SCENE_MESSAGE: i32 = 1;

/// First ID free for application-defined messages.
pub const USER_MESSAGE_START: i32 = 64;

/// Payload of [`SCENE_MESSAGE`].
///
/// Total size: 8 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct SceneEvent {
    /// Index of the entity concerned.
    pub entity_id: u32,
    /// One of the `SceneEvent::*` event codes.
    pub event: u32,
}

impl SceneEvent {
    /// An entity was destroyed; its index may be recycled.
    pub const ENTITY_DESTROYED: u32 = 0;
}

/// Payload of [`WINDOW_MESSAGE`].
///
/// Total size: 12 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct WindowEvent {
    /// One of the `WindowEvent::*` event codes.
    pub event: u32,
    /// New width in pixels.
    pub width: u32,
    /// New height in pixels.
    pub height: u32,
}

impl WindowEvent {
    /// The window was resized.
    pub const RESIZED: u32 = 0;

    /// Creates a resize notification.
    #[inline]
    #[must_use]
    pub const fn resized(width: u32, height: u32) -> Self {
        Self {
            event: Self::RESIZED,
            width,
            height,
        }
    }
}
